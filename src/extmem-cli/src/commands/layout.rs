//! Layout command handler
//!
//! Prints what a layout file builds into without touching any dump.

use crate::layout_file::LayoutFile;
use anyhow::{Context, Result};
use extmem::source::FnSource;
use extmem::{PointerWidth, Remote, Structure};
use std::fmt::Write;
use std::path::Path;

/// Describe one built structure: size, then fields in resolution order
pub fn describe(structure: &Structure) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({:#x} bytes)", structure.name(), structure.size());

    for (step, id) in structure.order().iter().enumerate() {
        let Some(field) = structure.field(*id) else {
            continue;
        };

        let _ = write!(
            out,
            "  {:>2}. {} +{:#x} {} ({} bytes)",
            step + 1,
            field.name(),
            field.offset(),
            field.kind().name(),
            field.size()
        );
        if let Some(dep) = field.dependency().and_then(|d| structure.field(d)) {
            let _ = write!(out, " via {}", dep.name());
        }
        if field.pointed_size() > 0 {
            let _ = write!(out, " -> fetches {:#x} bytes", field.pointed_size());
        }
        out.push('\n');
    }

    out
}

/// Handle the layout command
pub fn handle(path: &Path, width: PointerWidth) -> Result<()> {
    let file = LayoutFile::load(path)?;
    // Building needs a source, never read from here
    let remote = Remote::new(FnSource::read_only(|_, _| None), width);

    println!("{} ({} pointers)", path.display(), width);
    for name in file.names() {
        let structure = file
            .layout(name)?
            .build(&remote)
            .with_context(|| format!("Invalid structure '{}'", name))?;
        print!("{}", describe(&structure));
    }

    Ok(())
}
