//! Array command handler

use super::open_remote;
use crate::cli::Target;
use crate::config::Config;
use crate::layout_file::LayoutFile;
use crate::render;
use anyhow::{Context, Result};
use extmem::{ArrayOptions, CountSource, DynamicArray, ElementMode, Structure};

/// Command-line overrides of the configured array options
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub inline: bool,
    pub use_capacity: bool,
    pub max_carry: Option<usize>,
    pub padding: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, mut options: ArrayOptions) -> ArrayOptions {
        if self.inline {
            options.element_mode = ElementMode::Inline;
        }
        if self.use_capacity {
            options.count_source = CountSource::Capacity;
        }
        if let Some(max) = self.max_carry {
            options.max_carry = max;
        }
        if let Some(padding) = self.padding {
            options.padding = padding;
        }
        options
    }
}

/// Materialize a dynamic array of `target.type_name` elements
pub fn materialize(
    target: &Target,
    overrides: Overrides,
    config: &Config,
) -> Result<DynamicArray<Structure>> {
    let file = LayoutFile::load(&target.layout)?;
    let remote = open_remote(target, config)?;
    let options = overrides.apply(config.array);

    let mut array = DynamicArray::from_layout(
        &remote,
        target.address,
        file.layout(&target.type_name)?,
        options,
    )
    .with_context(|| format!("Invalid layout for '{}'", target.type_name))?;

    array.refresh().with_context(|| {
        format!(
            "Failed to read array of {} at {:#x}",
            target.type_name, target.address
        )
    })?;

    if array.is_stale() {
        eprintln!("Warning: element data at {:#x} is unreadable", array.data());
    }

    Ok(array)
}

/// Handle the array command
pub fn handle(
    target: &Target,
    overrides: Overrides,
    limit: Option<usize>,
    config: &Config,
) -> Result<()> {
    let array = materialize(target, overrides, config)?;
    let limit = limit.unwrap_or(usize::MAX);

    if target.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&render::array_json(&array, limit))?
        );
    } else {
        print!("{}", render::array_tree(&array, limit));
    }

    Ok(())
}
