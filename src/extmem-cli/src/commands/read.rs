//! Read command handler

use super::open_remote;
use crate::cli::Target;
use crate::config::Config;
use crate::layout_file::LayoutFile;
use crate::render;
use anyhow::{Context, Result};
use extmem::Structure;

/// Materialize one structure from the dump
pub fn materialize(target: &Target, config: &Config) -> Result<Structure> {
    let file = LayoutFile::load(&target.layout)?;
    let remote = open_remote(target, config)?;

    let mut structure = file
        .layout(&target.type_name)?
        .build(&remote)
        .with_context(|| format!("Invalid layout for '{}'", target.type_name))?;

    structure.set_address(target.address);
    structure.refresh().with_context(|| {
        format!(
            "Failed to read {} at {:#x}",
            target.type_name, target.address
        )
    })?;

    Ok(structure)
}

/// Handle the read command
pub fn handle(target: &Target, config: &Config) -> Result<()> {
    let structure = materialize(target, config)?;

    if target.json {
        println!("{}", serde_json::to_string_pretty(&render::json(&structure))?);
    } else {
        print!("{}", render::tree(&structure));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::write_dump;
    use tempfile::tempdir;

    #[test]
    fn test_materialize_player() {
        let dir = tempdir().unwrap();
        let target = write_dump(dir.path());
        let player = materialize(&target, &Config::default()).unwrap();

        let level = player.field_id("level").unwrap();
        let health = player.field_id("health").unwrap();
        let weapon = player.field_id("weapon").unwrap();
        assert_eq!(player.read::<i32>(level), 12);
        assert_eq!(player.read::<f32>(health), 87.5);

        let item = player.nested(weapon).unwrap();
        assert_eq!(item.address(), 0x300);
        assert_eq!(item.read::<u32>(item.field_id("id").unwrap()), 42);
    }

    #[test]
    fn test_handle_prints() {
        let dir = tempdir().unwrap();
        let mut target = write_dump(dir.path());
        assert!(handle(&target, &Config::default()).is_ok());

        target.json = true;
        assert!(handle(&target, &Config::default()).is_ok());
    }

    #[test]
    fn test_null_address_fails() {
        let dir = tempdir().unwrap();
        let mut target = write_dump(dir.path());
        target.address = 0;
        assert!(materialize(&target, &Config::default()).is_err());
    }

    #[test]
    fn test_unknown_type() {
        let dir = tempdir().unwrap();
        let mut target = write_dump(dir.path());
        target.type_name = "Vehicle".to_string();
        assert!(materialize(&target, &Config::default()).is_err());
    }
}
