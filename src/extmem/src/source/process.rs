//! Live Process Byte Source
//!
//! Adapter over a `process_memory` handle. Obtaining the handle (finding and
//! attaching to the process) stays with the caller.

use super::ByteSource;
use crate::{Error, Result};

use process_memory::{CopyAddress, PutAddress};

/// Byte source reading and writing a live process through a handle
///
/// ```no_run
/// use extmem::source::ProcessSource;
/// use extmem::{PointerWidth, Remote};
/// use process_memory::TryIntoProcessHandle;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handle = (4242 as process_memory::Pid).try_into_process_handle()?;
/// let remote = Remote::new(ProcessSource::new(handle), PointerWidth::Bits64);
/// # Ok(())
/// # }
/// ```
pub struct ProcessSource<H> {
    handle: H,
}

impl<H> ProcessSource<H> {
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }
}

impl<H> ByteSource for ProcessSource<H>
where
    H: CopyAddress + PutAddress + Send + Sync,
{
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let unreadable = || Error::UnreadableRegion { address, size };
        let addr = usize::try_from(address).map_err(|_| unreadable())?;

        let mut buffer = vec![0u8; size];
        self.handle.copy_address(addr, &mut buffer).map_err(|err| {
            tracing::trace!("Failed to read {} bytes at {:#x}: {}", size, address, err);
            unreadable()
        })?;
        Ok(buffer)
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let unwritable = || Error::UnwritableRegion {
            address,
            size: data.len(),
        };
        let addr = usize::try_from(address).map_err(|_| unwritable())?;

        self.handle.put_address(addr, data).map_err(|err| {
            tracing::debug!(
                "Failed to write {} bytes at {:#x}: {}",
                data.len(),
                address,
                err
            );
            unwritable()
        })
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use process_memory::{Pid, TryIntoProcessHandle};

    fn own_process() -> ProcessSource<process_memory::ProcessHandle> {
        let handle = (std::process::id() as Pid)
            .try_into_process_handle()
            .unwrap();
        ProcessSource::new(handle)
    }

    #[test]
    fn test_process_source_reads_own_memory() {
        let buffer = vec![0xAAu8, 0xBB, 0xCC, 0xDD];
        let address = buffer.as_ptr() as u64;

        // Sandboxes may forbid process_vm_readv even on ourselves
        let Ok(bytes) = own_process().read_bytes(address, 4) else {
            return;
        };
        assert_eq!(bytes, buffer);
    }

    #[test]
    fn test_process_source_maps_errors() {
        let source = own_process();
        assert!(matches!(
            source.read_bytes(0x10, 4),
            Err(Error::UnreadableRegion { address: 0x10, size: 4 })
        ));
        assert!(matches!(
            source.write_bytes(0x10, &[0; 8]),
            Err(Error::UnwritableRegion { size: 8, .. })
        ));
    }
}
