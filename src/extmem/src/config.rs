//! Process-wide settings

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default upper bound, in characters, for decoded text fields
pub const DEFAULT_MAX_TEXT_LEN: usize = 64;

static MAX_TEXT_LEN: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_TEXT_LEN);

/// Maximum number of characters decoded from a text field
pub fn max_text_len() -> usize {
    MAX_TEXT_LEN.load(Ordering::Relaxed)
}

/// Change the maximum text length for every following refresh
pub fn set_max_text_len(len: usize) {
    MAX_TEXT_LEN.store(len, Ordering::Relaxed);
}
