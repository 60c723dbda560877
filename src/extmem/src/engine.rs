//! Materialization engine
//!
//! Resolves a [`Structure`] against its byte source in two steps: one fetch of
//! the structure's span at the base address, then a walk over the fields in
//! resolution order. Root fields decode from the fetched bytes, dependent
//! fields from the bytes their pointer fetched. Pointers are followed as they
//! resolve, so a dependent field always sees the current pointed-to region.
//!
//! A null or unreadable pointer never fails the walk: its dependents are
//! skipped and keep whatever they held before. Only a failure to read a
//! pointed-to nested structure aborts the walk, and that failure reaches every
//! ancestor as [`Error::NestedObject`].

use crate::config;
use crate::field::{Field, FieldKind};
use crate::source::Remote;
use crate::structure::Structure;
use crate::value::Value;
use crate::{ConfigError, Error, Result};

/// Fetch and resolve `structure` at `address`
///
/// A null address clears every field and returns [`Error::NullTarget`]
/// without touching the byte source. A failed fetch clears every field and
/// returns the source error.
pub fn resolve_at(structure: &mut Structure, address: u64) -> Result<()> {
    structure.set_address(address);

    if address == 0 {
        structure.clear();
        return Err(Error::NullTarget);
    }

    let bytes = match structure.remote.read(address, structure.size()) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(
                "Failed to fetch {} ({} bytes) at {:#x}: {}",
                structure.name(),
                structure.size(),
                address,
                err
            );
            structure.clear();
            return Err(err);
        }
    };

    structure.snapshot = bytes;
    resolve_fields(structure, address)
}

/// Resolve `structure` at `address` from bytes the caller already holds
pub fn resolve_bytes(structure: &mut Structure, address: u64, bytes: &[u8]) -> Result<()> {
    let size = structure.size();
    let Some(bytes) = bytes.get(..size) else {
        return Err(Error::ShortBuffer {
            needed: size,
            actual: bytes.len(),
        });
    };

    structure.set_address(address);
    structure.snapshot.clear();
    structure.snapshot.extend_from_slice(bytes);
    resolve_fields(structure, address)
}

fn resolve_fields(structure: &mut Structure, base: u64) -> Result<()> {
    let Structure {
        remote,
        fields,
        order,
        snapshot,
        ..
    } = structure;
    let max_text_len = config::max_text_len();

    for id in order.iter() {
        let i = id.index();

        let resolved = match fields[i].dependency {
            None => Some((
                fields[i].decode(&snapshot[..], max_text_len),
                base.wrapping_add(fields[i].offset as u64),
            )),
            Some(dep) => {
                let pointer = &fields[dep.index()];
                match pointer.pointed_buffer() {
                    Some(buffer) => Some((
                        fields[i].decode(buffer, max_text_len),
                        pointer.value.as_pointer().wrapping_add(fields[i].offset as u64),
                    )),
                    None if pointer.kind.is_pointer() => {
                        tracing::trace!(
                            "Skipping {}: {} has no pointed data",
                            fields[i].name,
                            pointer.name
                        );
                        None
                    }
                    None => {
                        return Err(ConfigError::NonPointerDependency {
                            field: fields[i].name.clone(),
                            dependency: pointer.name.clone(),
                        }
                        .into())
                    }
                }
            }
        };

        let field = &mut fields[i];
        let Some((value, address)) = resolved else {
            // Dependents of a skipped pointer skip as well
            field.pointed_ready = false;
            continue;
        };

        field.value = value;
        field.address = address;
        follow(field, remote)?;
    }

    Ok(())
}

/// Work done after a field's own bytes are decoded
fn follow(field: &mut Field, remote: &Remote) -> Result<()> {
    match &mut field.kind {
        FieldKind::Pointer => {
            field.pointed_ready = false;
            let target = field.value.as_pointer();
            if field.pointed_size == 0 || target == 0 {
                return Ok(());
            }

            match remote.read(target, field.pointed_size) {
                Ok(bytes) => {
                    field.pointed = bytes;
                    field.pointed_ready = true;
                }
                Err(err) => {
                    tracing::trace!("Pointer {} -> {:#x} unreadable: {}", field.name, target, err);
                }
            }
        }
        FieldKind::Pointed(nested) => {
            let target = field.value.as_pointer();
            if target == 0 {
                nested.set_address(0);
                nested.clear();
                return Ok(());
            }

            resolve_at(nested, target).map_err(|err| Error::NestedObject {
                field: field.name.clone(),
                source: Box::new(err),
            })?;
        }
        FieldKind::Inline(nested) => {
            if let Value::Inline(bytes) = &field.value {
                resolve_bytes(nested, field.address, bytes).map_err(|err| Error::NestedObject {
                    field: field.name.clone(),
                    source: Box::new(err),
                })?;
            }
        }
        FieldKind::Scalar(_) | FieldKind::Text(_) => {}
    }

    Ok(())
}
