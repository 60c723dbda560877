//! Fields of a foreign structure
//!
//! A field is declared with a [`FieldSpec`] (offset, kind, optional pointer
//! dependency) and lives inside a built [`Structure`] as a [`Field`], which
//! carries the last resolved value, the last known address and, for pointers,
//! the bytes fetched from the pointed-to region.

use crate::layout::Layout;
use crate::source::PointerWidth;
use crate::structure::Structure;
use crate::value::{decode_text, Primitive, ScalarType, TextEncoding, Value};

use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of the [`Layout`] that issued a [`FieldId`]
///
/// Clones of a layout, and every structure built from it, share its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct LayoutTag(u32);

impl LayoutTag {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a field, returned when the field is declared on a [`Layout`]
///
/// Ids only resolve against the layout that issued them and the structures
/// built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    layout: LayoutTag,
    index: usize,
}

impl FieldId {
    pub(crate) fn new(layout: LayoutTag, index: usize) -> Self {
        Self { layout, index }
    }

    /// Declaration index of the field
    pub fn index(self) -> usize {
        self.index
    }

    pub(crate) fn layout(self) -> LayoutTag {
        self.layout
    }
}

/// Declared kind of a field, before the layout is built
#[derive(Debug, Clone)]
pub enum KindSpec {
    Scalar(ScalarType),
    Pointer,
    Text(TextEncoding),
    Inline(Layout),
    Pointed(Layout),
}

/// Declaration of one field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub(crate) offset: usize,
    pub(crate) kind: KindSpec,
    pub(crate) dependency: Option<FieldId>,
    pub(crate) pointer_width: Option<PointerWidth>,
    pub(crate) padding: usize,
}

impl FieldSpec {
    fn new(offset: usize, kind: KindSpec) -> Self {
        Self {
            offset,
            kind,
            dependency: None,
            pointer_width: None,
            padding: 0,
        }
    }

    pub fn primitive<T: Primitive>(offset: usize) -> Self {
        Self::new(offset, KindSpec::Scalar(T::TYPE))
    }

    pub fn scalar(ty: ScalarType, offset: usize) -> Self {
        Self::new(offset, KindSpec::Scalar(ty))
    }

    pub fn pointer(offset: usize) -> Self {
        Self::new(offset, KindSpec::Pointer)
    }

    /// Text decoded in place, spanning a pointer-width slot plus any padding
    pub fn text(offset: usize, encoding: TextEncoding) -> Self {
        Self::new(offset, KindSpec::Text(encoding))
    }

    /// Structure embedded by value
    pub fn inline(offset: usize, layout: Layout) -> Self {
        Self::new(offset, KindSpec::Inline(layout))
    }

    /// Structure referenced through a pointer
    pub fn pointed(offset: usize, layout: Layout) -> Self {
        Self::new(offset, KindSpec::Pointed(layout))
    }

    /// Address this field relative to the region `pointer` points at
    pub fn depends_on(mut self, pointer: FieldId) -> Self {
        self.dependency = Some(pointer);
        self
    }

    /// Override the pointer width for this field only
    pub fn pointer_width(mut self, width: PointerWidth) -> Self {
        self.pointer_width = Some(width);
        self
    }

    /// Extra bytes covered by this field after its natural size
    pub fn padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> &KindSpec {
        &self.kind
    }

    pub fn dependency(&self) -> Option<FieldId> {
        self.dependency
    }
}

/// Kind of a built field
#[derive(Debug)]
pub enum FieldKind {
    Scalar(ScalarType),
    Pointer,
    Text(TextEncoding),
    Inline(Box<Structure>),
    Pointed(Box<Structure>),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Scalar(_) => "scalar",
            FieldKind::Pointer => "pointer",
            FieldKind::Text(_) => "text",
            FieldKind::Inline(_) => "inline",
            FieldKind::Pointed(_) => "pointed",
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, FieldKind::Pointer)
    }

    pub fn nested(&self) -> Option<&Structure> {
        match self {
            FieldKind::Inline(s) | FieldKind::Pointed(s) => Some(s),
            _ => None,
        }
    }

    pub fn nested_mut(&mut self) -> Option<&mut Structure> {
        match self {
            FieldKind::Inline(s) | FieldKind::Pointed(s) => Some(s),
            _ => None,
        }
    }
}

/// One member of a built structure
#[derive(Debug)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) width: PointerWidth,
    pub(crate) dependency: Option<FieldId>,
    pub(crate) kind: FieldKind,
    /// Span fetched behind this pointer, zero when nothing depends on it
    pub(crate) pointed_size: usize,
    pub(crate) value: Value,
    /// Last known address, zero until first resolved
    pub(crate) address: u64,
    pub(crate) pointed: Vec<u8>,
    pub(crate) pointed_ready: bool,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes covered by this field in its source buffer
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dependency(&self) -> Option<FieldId> {
        self.dependency
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn pointed_size(&self) -> usize {
        self.pointed_size
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_set()
    }

    /// Bytes fetched from the pointed-to region on the last refresh
    pub fn pointed_buffer(&self) -> Option<&[u8]> {
        self.pointed_ready.then_some(self.pointed.as_slice())
    }

    /// Decode this field out of its authoritative buffer
    ///
    /// Returns [`Value::Unset`] when the buffer does not cover the field.
    pub fn decode(&self, buffer: &[u8], max_text_len: usize) -> Value {
        let Some(bytes) = buffer.get(self.offset..self.offset + self.size) else {
            return Value::Unset;
        };

        match &self.kind {
            FieldKind::Scalar(ty) => Value::Scalar(ty.decode(bytes)),
            FieldKind::Pointer | FieldKind::Pointed(_) => {
                Value::Pointer(self.width.decode(bytes))
            }
            FieldKind::Text(encoding) => Value::Text(decode_text(
                &buffer[self.offset..],
                *encoding,
                max_text_len,
            )),
            FieldKind::Inline(_) => Value::Inline(bytes.to_vec()),
        }
    }

    /// Forget the resolved value and any pointed-to bytes
    pub fn clear(&mut self) {
        self.value = Value::Unset;
        self.pointed.fill(0);
        self.pointed_ready = false;

        if let Some(nested) = self.kind.nested_mut() {
            nested.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    fn field(offset: usize, size: usize, kind: FieldKind) -> Field {
        Field {
            name: "f".to_string(),
            offset,
            size,
            width: PointerWidth::Bits64,
            dependency: None,
            kind,
            pointed_size: 0,
            value: Value::Unset,
            address: 0,
            pointed: Vec::new(),
            pointed_ready: false,
        }
    }

    #[test]
    fn test_decode_scalar() {
        let f = field(4, 4, FieldKind::Scalar(ScalarType::I32));
        let mut buffer = vec![0u8; 8];
        buffer[4..8].copy_from_slice(&(-7i32).to_le_bytes());
        assert_eq!(f.decode(&buffer, 64), Value::Scalar(Scalar::I32(-7)));
    }

    #[test]
    fn test_decode_pointer_uses_field_width() {
        let mut f = field(0, 4, FieldKind::Pointer);
        f.width = PointerWidth::Bits32;
        let buffer = [0x00, 0x20, 0x00, 0x00, 0xFF, 0xFF];
        assert_eq!(f.decode(&buffer, 64), Value::Pointer(0x2000));
    }

    #[test]
    fn test_decode_text_reads_past_slot() {
        let f = field(2, 8, FieldKind::Text(TextEncoding::Ansi));
        let buffer = b"..abcdefghij\0";
        // Bounded by the remaining buffer, not by the slot size
        assert_eq!(f.decode(buffer, 64), Value::Text("abcdefghij".into()));
        assert_eq!(f.decode(buffer, 3), Value::Text("abc".into()));
    }

    #[test]
    fn test_decode_outside_buffer_is_unset() {
        let f = field(6, 4, FieldKind::Scalar(ScalarType::U32));
        assert_eq!(f.decode(&[0; 8], 64), Value::Unset);
    }

    #[test]
    fn test_clear_zeroes_pointed_buffer() {
        let mut f = field(0, 8, FieldKind::Pointer);
        f.value = Value::Pointer(0x1000);
        f.pointed = vec![1, 2, 3];
        f.pointed_ready = true;

        f.clear();
        assert!(!f.is_resolved());
        assert_eq!(f.pointed, vec![0, 0, 0]);
        assert!(f.pointed_buffer().is_none());
    }

    #[test]
    fn test_spec_builders() {
        let owner = FieldId::new(LayoutTag::next(), 2);
        let spec = FieldSpec::pointer(0x10)
            .pointer_width(PointerWidth::Bits32)
            .padding(4)
            .depends_on(owner);
        assert_eq!(spec.offset(), 0x10);
        assert_eq!(spec.dependency(), Some(owner));
        assert_eq!(spec.pointer_width, Some(PointerWidth::Bits32));
        assert_eq!(spec.padding, 4);
        assert!(matches!(
            FieldSpec::primitive::<u16>(0).kind(),
            KindSpec::Scalar(ScalarType::U16)
        ));
    }
}
