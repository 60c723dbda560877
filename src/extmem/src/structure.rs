//! Materialized foreign structures

use crate::engine;
use crate::field::{Field, FieldId, FieldKind, LayoutTag};
use crate::source::Remote;
use crate::value::Primitive;
use crate::{ConfigError, Error, Result};

/// A foreign structure: built fields in resolution order plus the address and
/// bytes of the last refresh
#[derive(Debug)]
pub struct Structure {
    name: String,
    tag: LayoutTag,
    pub(crate) remote: Remote,
    pub(crate) fields: Vec<Field>,
    pub(crate) order: Vec<FieldId>,
    size: usize,
    address: u64,
    pub(crate) snapshot: Vec<u8>,
}

impl Structure {
    pub(crate) fn from_parts(
        name: String,
        tag: LayoutTag,
        remote: Remote,
        fields: Vec<Field>,
        order: Vec<FieldId>,
        size: usize,
    ) -> Self {
        Self {
            name,
            tag,
            remote,
            fields,
            order,
            size,
            address: 0,
            snapshot: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    /// Bytes fetched per refresh: the span of every dependency-free field
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// Move the structure without reading anything
    pub fn set_address(&mut self, address: u64) {
        self.address = address;
    }

    /// Bytes of the last successful fetch at the base address
    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field ids in resolution order
    pub fn order(&self) -> &[FieldId] {
        &self.order
    }

    /// Field behind `id`; `None` for ids issued by another layout
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(self.own_index(id)?)
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        let tag = self.tag;
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| FieldId::new(tag, i))
    }

    fn own_index(&self, id: FieldId) -> Option<usize> {
        (id.layout() == self.tag).then_some(id.index())
    }

    fn checked_index(&self, id: FieldId) -> Result<usize> {
        self.own_index(id)
            .filter(|&i| i < self.fields.len())
            .ok_or_else(|| ConfigError::UnknownField(id.index()).into())
    }

    /// Re-read the structure at its current address
    pub fn refresh(&mut self) -> Result<()> {
        engine::resolve_at(self, self.address)
    }

    /// Resolve the structure from bytes the caller already fetched
    ///
    /// Used for structures stored inline in a larger region so the same bytes
    /// are not transferred twice.
    pub fn refresh_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.address == 0 {
            return Err(Error::NullTarget);
        }

        if bytes.len() < self.size {
            return Err(Error::ShortBuffer {
                needed: self.size,
                actual: bytes.len(),
            });
        }

        engine::resolve_bytes(self, self.address, bytes)
    }

    /// Swap the byte source used by this structure and every nested one
    pub fn bind_source(&mut self, remote: Remote) {
        for field in &mut self.fields {
            if let Some(nested) = field.kind.nested_mut() {
                nested.bind_source(remote.clone());
            }
        }
        self.remote = remote;
    }

    /// Forget every resolved value
    pub fn clear(&mut self) {
        for field in &mut self.fields {
            field.clear();
        }
    }

    /// Last resolved value of a primitive field, `T::default()` if unresolved
    pub fn read<T: Primitive>(&self, id: FieldId) -> T {
        self.field(id)
            .and_then(|f| f.value.as_scalar())
            .and_then(T::from_scalar)
            .unwrap_or_default()
    }

    /// Last resolved pointer value (also for pointed structures), zero if
    /// unresolved
    pub fn pointer(&self, id: FieldId) -> u64 {
        self.field(id).map(|f| f.value.as_pointer()).unwrap_or(0)
    }

    /// Last resolved text, empty if unresolved
    pub fn text(&self, id: FieldId) -> &str {
        self.field(id).map(|f| f.value.as_text()).unwrap_or("")
    }

    /// Structure embedded in or pointed to by a field
    pub fn nested(&self, id: FieldId) -> Option<&Structure> {
        self.field(id)?.kind.nested()
    }

    pub fn nested_mut(&mut self, id: FieldId) -> Option<&mut Structure> {
        let index = self.own_index(id)?;
        self.fields.get_mut(index)?.kind.nested_mut()
    }

    /// Write a primitive field back to the foreign process
    ///
    /// The cached value is updated before the write is issued.
    pub fn write<T: Primitive>(&mut self, id: FieldId, value: T) -> Result<()> {
        let index = self.checked_index(id)?;
        let field = &mut self.fields[index];

        match field.kind {
            FieldKind::Scalar(ty) if ty == T::TYPE => {}
            _ => {
                return Err(ConfigError::KindMismatch {
                    field: field.name.clone(),
                    expected: T::TYPE.name(),
                    actual: field.kind.name(),
                }
                .into())
            }
        }

        if field.address == 0 {
            return Err(Error::UnresolvedAddress(field.name.clone()));
        }

        let scalar = value.into_scalar();
        field.value = scalar.into();
        self.remote.write(field.address, &scalar.to_le_bytes())
    }

    /// Write a pointer field back to the foreign process
    pub fn write_pointer(&mut self, id: FieldId, value: u64) -> Result<()> {
        let index = self.checked_index(id)?;
        let field = &mut self.fields[index];

        if !field.kind.is_pointer() {
            return Err(ConfigError::KindMismatch {
                field: field.name.clone(),
                expected: "pointer",
                actual: field.kind.name(),
            }
            .into());
        }

        if field.address == 0 {
            return Err(Error::UnresolvedAddress(field.name.clone()));
        }

        field.value = crate::Value::Pointer(value);
        self.remote.write(field.address, &field.width.encode(value))
    }
}

/// A typed view over a [`Structure`]
///
/// Implement this for hand-written wrappers that keep the [`FieldId`]s of their
/// layout next to the structure. Dynamic arrays use it to refresh their
/// elements, so wrappers can override the refresh methods when an element
/// needs more than its own fields (an array of arrays, for instance).
pub trait Record {
    fn structure(&self) -> &Structure;

    fn structure_mut(&mut self) -> &mut Structure;

    fn address(&self) -> u64 {
        self.structure().address()
    }

    fn set_address(&mut self, address: u64) {
        self.structure_mut().set_address(address);
    }

    fn refresh(&mut self) -> Result<()> {
        self.structure_mut().refresh()
    }

    fn refresh_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.structure_mut().refresh_from_bytes(bytes)
    }
}

impl Record for Structure {
    fn structure(&self) -> &Structure {
        self
    }

    fn structure_mut(&mut self) -> &mut Structure {
        self
    }
}
