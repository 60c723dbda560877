//! Layout files
//!
//! Structures are declared in TOML:
//!
//! ```toml
//! [[struct]]
//! name = "Actor"
//! fields = [
//!   { name = "owner", offset = 0x0, kind = "pointer" },
//!   { name = "id", offset = 0x8, kind = "u32" },
//!   { name = "health", offset = 0x10, kind = "f32", depends = "owner" },
//!   { name = "pos", offset = 0x10, kind = "inline", struct = "Vector3" },
//! ]
//! ```
//!
//! Kinds are scalar names (`u8` .. `f64`, `bool`), `pointer`, `ansi` (or
//! `text`), `utf16`, `inline` and `pointed`; the last two name another
//! structure with `struct`.

use anyhow::{bail, Context, Result};
use extmem::{FieldSpec, Layout, PointerWidth, ScalarType, TextEncoding};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct LayoutFile {
    #[serde(rename = "struct", default)]
    pub structs: Vec<StructDef>,
}

#[derive(Debug, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    pub offset: usize,
    pub kind: String,
    /// Name of the pointer field this one is addressed through
    pub depends: Option<String>,
    /// Nested structure for `inline` and `pointed` fields
    #[serde(rename = "struct")]
    pub structure: Option<String>,
    #[serde(default)]
    pub padding: usize,
    /// Pointer width override in bits
    pub width: Option<u32>,
}

impl LayoutFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid layout file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let file: LayoutFile = toml::from_str(contents).context("Failed to parse layout TOML")?;

        let mut names = HashSet::new();
        for def in &file.structs {
            if !names.insert(def.name.as_str()) {
                bail!("structure '{}' is declared twice", def.name);
            }

            let mut fields = HashSet::new();
            for field in &def.fields {
                if !fields.insert(field.name.as_str()) {
                    bail!("field '{}.{}' is declared twice", def.name, field.name);
                }
            }
        }

        Ok(file)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.structs.iter().map(|s| s.name.as_str())
    }

    /// Layout of the structure called `name`, with nested structures expanded
    pub fn layout(&self, name: &str) -> Result<Layout> {
        self.resolve(name, &mut Vec::new())
    }

    fn resolve(&self, name: &str, stack: &mut Vec<String>) -> Result<Layout> {
        if stack.iter().any(|s| s == name) {
            bail!(
                "structure '{}' contains itself ({} -> {})",
                name,
                stack.join(" -> "),
                name
            );
        }

        let def = self
            .structs
            .iter()
            .find(|s| s.name == name)
            .with_context(|| format!("unknown structure '{}'", name))?;

        stack.push(name.to_string());
        let mut layout = Layout::new(name);
        for field in &def.fields {
            let spec = self
                .field_spec(field, stack)
                .with_context(|| format!("in field '{}.{}'", name, field.name))?;
            layout.field(field.name.as_str(), spec);
        }
        stack.pop();

        for field in &def.fields {
            let Some(depends) = &field.depends else {
                continue;
            };
            let id = layout
                .field_id(&field.name)
                .with_context(|| format!("unknown field '{}.{}'", name, field.name))?;
            let pointer = layout.field_id(depends).with_context(|| {
                format!(
                    "field '{}.{}' depends on unknown field '{}'",
                    name, field.name, depends
                )
            })?;
            layout.set_dependency(id, pointer)?;
        }

        Ok(layout)
    }

    fn field_spec(&self, field: &FieldDef, stack: &mut Vec<String>) -> Result<FieldSpec> {
        let offset = field.offset;
        let spec = match field.kind.as_str() {
            "pointer" => FieldSpec::pointer(offset),
            "ansi" | "text" => FieldSpec::text(offset, TextEncoding::Ansi),
            "utf16" => FieldSpec::text(offset, TextEncoding::Utf16),
            "inline" => FieldSpec::inline(offset, self.resolve(nested_name(field)?, stack)?),
            "pointed" => FieldSpec::pointed(offset, self.resolve(nested_name(field)?, stack)?),
            other => match ScalarType::from_name(other) {
                Some(ty) => FieldSpec::scalar(ty, offset),
                None => bail!("unknown kind '{}'", other),
            },
        };

        let mut spec = spec.padding(field.padding);
        if let Some(bits) = field.width {
            let width = PointerWidth::from_bits(bits)
                .with_context(|| format!("invalid pointer width {} (expected 32 or 64)", bits))?;
            spec = spec.pointer_width(width);
        }

        Ok(spec)
    }
}

fn nested_name(field: &FieldDef) -> Result<&str> {
    field
        .structure
        .as_deref()
        .with_context(|| format!("'{}' fields need a struct name", field.kind))
}
