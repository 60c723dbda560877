//! # extmem
//!
//! Typed views over data structures that live inside another process's
//! address space.
//!
//! A structure is declared once as a [`Layout`] (an ordered list of fields with
//! offsets, kinds and optional pointer dependencies), built against a
//! [`Remote`] (a [`ByteSource`] bound to a pointer width), and then refreshed
//! as often as needed. Each refresh fetches the minimal byte span for the
//! structure, follows pointers in dependency order, recurses into nested
//! structures and degrades to "skipped" instead of failing when a pointer is
//! null or its target is unreadable.
//!
//! ## Example
//!
//! ```
//! use extmem::{FieldSpec, Layout, PointerWidth, Remote};
//! use extmem::source::MockSource;
//!
//! # fn main() -> extmem::Result<()> {
//! let mut bytes = Vec::new();
//! for v in [1.0f32, 2.0, 3.0] {
//!     bytes.extend_from_slice(&v.to_le_bytes());
//! }
//! let remote = Remote::new(MockSource::new().with_block(0x1000, bytes), PointerWidth::Bits64);
//!
//! let mut layout = Layout::new("Vector3");
//! let x = layout.field("x", FieldSpec::primitive::<f32>(0x0));
//! let y = layout.field("y", FieldSpec::primitive::<f32>(0x4));
//! let z = layout.field("z", FieldSpec::primitive::<f32>(0x8));
//!
//! let mut vector = layout.build(&remote)?;
//! vector.set_address(0x1000);
//! vector.refresh()?;
//!
//! assert_eq!(vector.size(), 12);
//! assert_eq!(vector.read::<f32>(x), 1.0);
//! assert_eq!(vector.read::<f32>(y), 2.0);
//! assert_eq!(vector.read::<f32>(z), 3.0);
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod config;
pub mod engine;
pub mod field;
pub mod layout;
pub mod source;
pub mod structure;
pub mod value;

#[doc(inline)]
pub use array::{ArrayOptions, CountSource, DynamicArray, ElementMode, HeaderFields, Throttle};
#[doc(inline)]
pub use field::{Field, FieldId, FieldKind, FieldSpec};
#[doc(inline)]
pub use layout::Layout;
#[doc(inline)]
pub use source::{ByteSource, PointerWidth, Remote};
#[doc(inline)]
pub use structure::{Record, Structure};
#[doc(inline)]
pub use value::{Primitive, Scalar, ScalarType, TextEncoding, Value};

/// Layout declaration faults, detected when a [`Layout`] is built
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field '{field}' depends on unknown field #{dependency}")]
    UnknownDependency { field: String, dependency: usize },

    #[error("field '{field}' depends on '{dependency}', which is not a pointer")]
    NonPointerDependency { field: String, dependency: String },

    #[error("dependency cycle between fields {0:?}")]
    DependencyCycle(Vec<String>),

    #[error("field '{field}' is a {actual} field, not {expected}")]
    KindMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("field #{0} does not belong to this structure")]
    UnknownField(usize),

    #[error("field #{index} was declared on a different layout than '{layout}'")]
    ForeignField { layout: String, index: usize },
}

/// Errors from reading and writing foreign structures
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unreadable region: {size} bytes at {address:#x}")]
    UnreadableRegion { address: u64, size: usize },

    #[error("Unwritable region: {size} bytes at {address:#x}")]
    UnwritableRegion { address: u64, size: usize },

    #[error("Null target address")]
    NullTarget,

    #[error("Array count {count} outside 0..={max}")]
    OversizedCount { count: i64, max: usize },

    #[error("Nested structure behind field '{field}' could not be read")]
    NestedObject {
        field: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Field '{0}' has no resolved address yet")]
    UnresolvedAddress(String),

    #[error("Buffer too short: need {needed} bytes, got {actual}")]
    ShortBuffer { needed: usize, actual: usize },

    #[error("Byte source is read-only")]
    ReadOnly,

    #[error("Invalid dump file: {0}")]
    InvalidDump(String),

    #[error("Invalid layout: {0}")]
    Configuration(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures that a later poll may not hit again (unreadable or
    /// null memory, corrupted array headers, nested read faults)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::UnreadableRegion { .. }
                | Error::NullTarget
                | Error::OversizedCount { .. }
                | Error::NestedObject { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
