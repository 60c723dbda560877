//! Byte Source Trait
//!
//! Core abstraction for moving bytes across the process boundary, plus the
//! session handle that binds a source to the target's pointer width.

use crate::{Error, Result};

use byteorder::{ByteOrder, LE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Trait for reading and writing bytes in a foreign address space
pub trait ByteSource: Send + Sync {
    /// Read `size` bytes at `address`
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Write `data` at `address`
    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()>;
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        (**self).write_bytes(address, data)
    }
}

/// Pointer width of the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerWidth {
    Bits32,
    #[default]
    Bits64,
}

impl PointerWidth {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::Bits32),
            64 => Some(Self::Bits64),
            _ => None,
        }
    }

    /// Size of a pointer in bytes
    pub fn bytes(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    /// Decode an unsigned pointer from the start of `bytes`
    pub fn decode(self, bytes: &[u8]) -> u64 {
        match self {
            Self::Bits32 => LE::read_u32(bytes) as u64,
            Self::Bits64 => LE::read_u64(bytes),
        }
    }

    /// Encode a pointer, truncating to 32 bits for 32-bit targets
    pub fn encode(self, value: u64) -> Vec<u8> {
        match self {
            Self::Bits32 => (value as u32).to_le_bytes().to_vec(),
            Self::Bits64 => value.to_le_bytes().to_vec(),
        }
    }
}

impl fmt::Display for PointerWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits32 => f.write_str("32-bit"),
            Self::Bits64 => f.write_str("64-bit"),
        }
    }
}

impl FromStr for PointerWidth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().trim_end_matches("-bit") {
            "32" | "bits32" => Ok(Self::Bits32),
            "64" | "bits64" => Ok(Self::Bits64),
            other => Err(format!("invalid pointer width '{}' (expected 32 or 64)", other)),
        }
    }
}

/// A byte source bound to a pointer width
///
/// Cloning is cheap; every structure holds its own clone so it can be
/// refreshed without any process-wide reader.
#[derive(Clone)]
pub struct Remote {
    source: Arc<dyn ByteSource>,
    width: PointerWidth,
}

impl Remote {
    pub fn new<S: ByteSource + 'static>(source: S, width: PointerWidth) -> Self {
        Self {
            source: Arc::new(source),
            width,
        }
    }

    /// Bind an already shared source
    pub fn from_arc(source: Arc<dyn ByteSource>, width: PointerWidth) -> Self {
        Self { source, width }
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    pub fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let bytes = self.source.read_bytes(address, size)?;
        if bytes.len() < size {
            return Err(Error::UnreadableRegion { address, size });
        }
        Ok(bytes)
    }

    pub fn write(&self, address: u64, data: &[u8]) -> Result<()> {
        self.source.write_bytes(address, data)
    }

    /// Read a pointer-width value at `address`
    pub fn read_pointer(&self, address: u64) -> Result<u64> {
        let bytes = self.read(address, self.width.bytes())?;
        Ok(self.width.decode(&bytes))
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockSource;

    #[test]
    fn test_pointer_width_bytes() {
        assert_eq!(PointerWidth::Bits32.bytes(), 4);
        assert_eq!(PointerWidth::Bits64.bytes(), 8);
        assert_eq!(PointerWidth::default(), PointerWidth::Bits64);
    }

    #[test]
    fn test_pointer_width_decode() {
        let bytes = [0x00, 0x10, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(PointerWidth::Bits64.decode(&bytes), 0x0000000100001000);
        assert_eq!(PointerWidth::Bits32.decode(&bytes), 0x1000);
    }

    #[test]
    fn test_pointer_width_encode_truncates() {
        assert_eq!(PointerWidth::Bits32.encode(0x1_2345_6789).len(), 4);
        assert_eq!(
            PointerWidth::Bits32.decode(&PointerWidth::Bits32.encode(0x1_2345_6789)),
            0x2345_6789
        );
        assert_eq!(PointerWidth::Bits64.encode(0x1000).len(), 8);
    }

    #[test]
    fn test_pointer_width_from_str() {
        assert_eq!("32".parse::<PointerWidth>(), Ok(PointerWidth::Bits32));
        assert_eq!("64-bit".parse::<PointerWidth>(), Ok(PointerWidth::Bits64));
        assert!("16".parse::<PointerWidth>().is_err());
        assert_eq!(PointerWidth::from_bits(32), Some(PointerWidth::Bits32));
        assert_eq!(PointerWidth::from_bits(128), None);
    }

    #[test]
    fn test_remote_read_pointer() {
        let source = MockSource::new().with_block(0x1000, 0x2000u64.to_le_bytes().to_vec());
        let remote = Remote::new(source, PointerWidth::Bits64);
        assert_eq!(remote.read_pointer(0x1000).unwrap(), 0x2000);
        assert!(remote.read_pointer(0x5000).is_err());
    }

    #[test]
    fn test_remote_rejects_short_reads() {
        struct Short;
        impl ByteSource for Short {
            fn read_bytes(&self, _address: u64, size: usize) -> Result<Vec<u8>> {
                Ok(vec![0; size / 2])
            }
            fn write_bytes(&self, _address: u64, _data: &[u8]) -> Result<()> {
                Ok(())
            }
        }

        let remote = Remote::new(Short, PointerWidth::Bits64);
        assert!(matches!(
            remote.read(0x1000, 8),
            Err(Error::UnreadableRegion {
                address: 0x1000,
                size: 8
            })
        ));
    }

    #[test]
    fn test_remote_shares_source() {
        let source = Arc::new(MockSource::new().with_block(0x1000, vec![0; 16]));
        let remote = Remote::from_arc(source.clone(), PointerWidth::Bits32);
        let copy = remote.clone();

        remote.read(0x1000, 4).unwrap();
        copy.read(0x1004, 4).unwrap();
        assert_eq!(source.reads(), 2);
        assert_eq!(copy.pointer_width(), PointerWidth::Bits32);
    }
}
