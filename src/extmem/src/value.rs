//! Primitive values and their byte encodings
//!
//! Everything read from a foreign process is little-endian. Text is decoded
//! from a bounded window and cut at the first null unit.

use byteorder::{ByteOrder, LE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width primitive types a field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Bool,
}

impl ScalarType {
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Bool => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "u8" => Self::U8,
            "i8" => Self::I8,
            "u16" => Self::U16,
            "i16" => Self::I16,
            "u32" => Self::U32,
            "i32" => Self::I32,
            "u64" => Self::U64,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "bool" => Self::Bool,
            _ => return None,
        })
    }

    /// Decode a value from the start of `bytes`, which must hold at least
    /// `self.size()` bytes
    pub fn decode(self, bytes: &[u8]) -> Scalar {
        match self {
            Self::U8 => Scalar::U8(bytes[0]),
            Self::I8 => Scalar::I8(bytes[0] as i8),
            Self::U16 => Scalar::U16(LE::read_u16(bytes)),
            Self::I16 => Scalar::I16(LE::read_i16(bytes)),
            Self::U32 => Scalar::U32(LE::read_u32(bytes)),
            Self::I32 => Scalar::I32(LE::read_i32(bytes)),
            Self::U64 => Scalar::U64(LE::read_u64(bytes)),
            Self::I64 => Scalar::I64(LE::read_i64(bytes)),
            Self::F32 => Scalar::F32(LE::read_f32(bytes)),
            Self::F64 => Scalar::F64(LE::read_f64(bytes)),
            Self::Bool => Scalar::Bool(bytes[0] != 0),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded primitive value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
}

impl Scalar {
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Self::U8(_) => ScalarType::U8,
            Self::I8(_) => ScalarType::I8,
            Self::U16(_) => ScalarType::U16,
            Self::I16(_) => ScalarType::I16,
            Self::U32(_) => ScalarType::U32,
            Self::I32(_) => ScalarType::I32,
            Self::U64(_) => ScalarType::U64,
            Self::I64(_) => ScalarType::I64,
            Self::F32(_) => ScalarType::F32,
            Self::F64(_) => ScalarType::F64,
            Self::Bool(_) => ScalarType::Bool,
        }
    }

    pub fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Self::U8(v) => vec![v],
            Self::I8(v) => v.to_le_bytes().to_vec(),
            Self::U16(v) => v.to_le_bytes().to_vec(),
            Self::I16(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::I32(v) => v.to_le_bytes().to_vec(),
            Self::U64(v) => v.to_le_bytes().to_vec(),
            Self::I64(v) => v.to_le_bytes().to_vec(),
            Self::F32(v) => v.to_le_bytes().to_vec(),
            Self::F64(v) => v.to_le_bytes().to_vec(),
            Self::Bool(v) => vec![v as u8],
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{}", v),
            Self::I8(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::I16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Rust types that map onto a [`ScalarType`]
pub trait Primitive: Copy + Default {
    const TYPE: ScalarType;

    fn from_scalar(scalar: Scalar) -> Option<Self>;

    fn into_scalar(self) -> Scalar;
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const TYPE: ScalarType = ScalarType::$variant;

                fn from_scalar(scalar: Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }
            }
        )*
    };
}

impl_primitive! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
}

/// Character unit width of a text field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Single-byte units, decoded as lossy UTF-8
    Ansi,
    /// Little-endian UTF-16 units
    #[default]
    Utf16,
}

impl TextEncoding {
    pub fn unit(self) -> usize {
        match self {
            Self::Ansi => 1,
            Self::Utf16 => 2,
        }
    }
}

/// Decode at most `max_units` characters from `bytes`, stopping at the first
/// null unit
pub fn decode_text(bytes: &[u8], encoding: TextEncoding, max_units: usize) -> String {
    let units = max_units.min(bytes.len() / encoding.unit());
    let window = &bytes[..units * encoding.unit()];

    match encoding {
        TextEncoding::Ansi => {
            let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
            String::from_utf8_lossy(&window[..end]).into_owned()
        }
        TextEncoding::Utf16 => {
            let chars: Vec<u16> = window
                .chunks_exact(2)
                .map(LE::read_u16)
                .take_while(|&c| c != 0)
                .collect();
            String::from_utf16_lossy(&chars)
        }
    }
}

/// Last resolved value of a field
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Value {
    /// Never resolved, or cleared after a failed read
    #[default]
    Unset,
    Scalar(Scalar),
    Pointer(u64),
    Text(String),
    /// Raw bytes of a structure embedded by value
    Inline(Vec<u8>),
}

impl Value {
    pub fn is_set(&self) -> bool {
        !matches!(self, Value::Unset)
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Pointer value, zero when unset
    pub fn as_pointer(&self) -> u64 {
        match self {
            Value::Pointer(p) => *p,
            _ => 0,
        }
    }

    /// Text value, empty when unset
    pub fn as_text(&self) -> &str {
        match self {
            Value::Text(s) => s,
            _ => "",
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}
