//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting extmem CLI defaults.

use crate::config::Config;
use anyhow::Result;
use extmem::PointerWidth;
use std::path::Path;

/// Handle the configure command
///
/// # Arguments
/// * `max_text_len` - Optional text length bound to store
/// * `width` - Optional default pointer width to store
/// * `show` - If true, show current configuration
pub fn handle(max_text_len: Option<usize>, width: Option<PointerWidth>, show: bool) -> Result<()> {
    handle_at(&Config::config_path()?, max_text_len, width, show)
}

pub fn handle_at(
    path: &Path,
    max_text_len: Option<usize>,
    width: Option<PointerWidth>,
    show: bool,
) -> Result<()> {
    let mut config = Config::load_from(path)?;

    if show {
        show_config(&config, path);
        return Ok(());
    }

    if max_text_len.is_none() && width.is_none() {
        show_usage();
        return Ok(());
    }

    if let Some(len) = max_text_len {
        config.max_text_len = Some(len);
        println!("Max text length configured: {}", len);
    }
    if let Some(width) = width {
        config.pointer_width = Some(width);
        println!("Pointer width configured: {}", width);
    }

    config.save_to(path)?;
    println!("Config saved to: {}", path.display());

    Ok(())
}

/// Display current configuration
fn show_config(config: &Config, path: &Path) {
    match config.max_text_len {
        Some(len) => println!("Max text length: {}", len),
        None => println!(
            "Max text length: {} (default)",
            extmem::config::DEFAULT_MAX_TEXT_LEN
        ),
    }

    match config.pointer_width {
        Some(width) => println!("Pointer width: {}", width),
        None => println!("Pointer width: {} (default)", PointerWidth::default()),
    }

    let array = &config.array;
    println!(
        "Array: max carry {}, {:?} count, {:?} elements, padding {}, pause {} ms every {}",
        array.max_carry,
        array.count_source,
        array.element_mode,
        array.padding,
        array.throttle.delay_ms,
        array.throttle.every
    );

    println!("Config file: {}", path.display());
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: extmem configure --max-text-len N");
    println!("   or: extmem configure --width 32|64");
    println!("   or: extmem configure --show");
    println!();
    println!("Array defaults live in the [array] table of the config file.");
}
