//! Closure Byte Source
//!
//! Adapts a pair of read/write callbacks (for example a debugger API binding)
//! into a [`ByteSource`].

use super::ByteSource;
use crate::{Error, Result};

/// Byte source built from a read callback and a write callback
///
/// The read callback returns `None` when the region cannot be read; the write
/// callback returns `false` when the write did not go through.
pub struct FnSource<R, W> {
    read: R,
    write: W,
}

impl<R, W> FnSource<R, W>
where
    R: Fn(u64, usize) -> Option<Vec<u8>> + Send + Sync,
    W: Fn(u64, &[u8]) -> bool + Send + Sync,
{
    pub fn new(read: R, write: W) -> Self {
        Self { read, write }
    }
}

impl<R> FnSource<R, fn(u64, &[u8]) -> bool>
where
    R: Fn(u64, usize) -> Option<Vec<u8>> + Send + Sync,
{
    /// Byte source whose writes always fail
    pub fn read_only(read: R) -> Self {
        fn reject(_address: u64, _data: &[u8]) -> bool {
            false
        }

        Self {
            read,
            write: reject,
        }
    }
}

impl<R, W> ByteSource for FnSource<R, W>
where
    R: Fn(u64, usize) -> Option<Vec<u8>> + Send + Sync,
    W: Fn(u64, &[u8]) -> bool + Send + Sync,
{
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (self.read)(address, size).ok_or(Error::UnreadableRegion { address, size })
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        if (self.write)(address, data) {
            Ok(())
        } else {
            Err(Error::UnwritableRegion {
                address,
                size: data.len(),
            })
        }
    }
}
