//! Command handlers for the extmem CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod array;
pub mod configure;
pub mod layout;
pub mod read;

use crate::cli::Target;
use crate::config::Config;
use anyhow::{Context, Result};
use extmem::source::DumpFile;
use extmem::Remote;

/// Open the dump named by `target` as a byte source
pub fn open_remote(target: &Target, config: &Config) -> Result<Remote> {
    let dump = match &target.maps {
        Some(maps) => DumpFile::open_with_maps(&target.dump, maps),
        None => DumpFile::open(&target.dump),
    }
    .with_context(|| format!("Failed to open dump {}", target.dump.display()))?;

    tracing::debug!(
        "{}: {} regions",
        target.dump.display(),
        dump.regions().len()
    );

    Ok(Remote::new(dump, config.pointer_width(target.width)))
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::cli::Target;
    use std::fs;
    use std::path::Path;

    pub const LAYOUT: &str = r#"
[[struct]]
name = "Item"
fields = [
  { name = "id", offset = 0, kind = "u32" },
  { name = "weight", offset = 4, kind = "f32" },
]

[[struct]]
name = "Player"
fields = [
  { name = "level", offset = 0, kind = "i32" },
  { name = "stats", offset = 8, kind = "pointer" },
  { name = "health", offset = 4, kind = "f32", depends = "stats" },
  { name = "weapon", offset = 0x10, kind = "pointed", struct = "Item" },
]
"#;

    /// Raw linear dump: Player at 0x100, stats at 0x200, Item at 0x300,
    /// array header at 0x400 with three inline Items at 0x500
    pub fn write_dump(dir: &Path) -> Target {
        let mut image = vec![0u8; 0x600];
        let mut put = |at: usize, bytes: &[u8]| image[at..at + bytes.len()].copy_from_slice(bytes);

        put(0x100, &12i32.to_le_bytes());
        put(0x108, &0x200u64.to_le_bytes());
        put(0x110, &0x300u64.to_le_bytes());
        put(0x204, &87.5f32.to_le_bytes());
        put(0x300, &42u32.to_le_bytes());
        put(0x304, &1.25f32.to_le_bytes());

        put(0x400, &0x500u64.to_le_bytes());
        put(0x408, &3i32.to_le_bytes());
        put(0x40c, &4i32.to_le_bytes());
        for i in 0..3u32 {
            put(0x500 + 8 * i as usize, &(100 + i).to_le_bytes());
        }

        let dump = dir.join("game.bin");
        let layout = dir.join("game.toml");
        fs::write(&dump, image).unwrap();
        fs::write(&layout, LAYOUT).unwrap();

        Target {
            dump,
            layout,
            type_name: "Player".to_string(),
            address: 0x100,
            maps: None,
            width: None,
            json: false,
        }
    }
}
