//! Byte Source Abstraction
//!
//! The boundary to the foreign process. Everything above this module only
//! sees [`Remote`], a [`ByteSource`] bound to a pointer width:
//! - Caller-supplied read/write closures via `FnSource`
//! - Live process handles via `ProcessSource`
//! - Memory dump files via `DumpFile` (MDMP and raw dumps)
//! - In-memory address spaces for tests via `MockSource`

mod closure;
#[cfg(feature = "dump")]
mod dump;
#[doc(hidden)]
pub mod mock;
#[cfg(feature = "process")]
mod process;
mod region;
mod traits;

pub use closure::FnSource;
#[cfg(feature = "dump")]
pub use dump::DumpFile;
#[doc(hidden)]
pub use mock::MockSource;
#[cfg(feature = "process")]
pub use process::ProcessSource;
pub use region::MemoryRegion;
pub use traits::{ByteSource, PointerWidth, Remote};
