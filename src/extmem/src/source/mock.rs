//! Mock Byte Source
//!
//! A sparse in-memory address space for tests and examples.

use super::ByteSource;
use crate::{Error, Result};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory address space made of independent blocks
///
/// A read or write must fall entirely inside one block. Reads and writes are
/// counted, and every read can be forced to fail.
#[derive(Default)]
pub struct MockSource {
    /// Blocks keyed by start address
    blocks: RwLock<BTreeMap<u64, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block of memory at `address`
    pub fn with_block(self, address: u64, data: Vec<u8>) -> Self {
        self.insert(address, data);
        self
    }

    /// Add or replace a block of memory at `address`
    pub fn insert(&self, address: u64, data: Vec<u8>) {
        self.blocks_mut().insert(address, data);
    }

    /// Make every following read fail (or succeed again)
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of read calls so far, failed ones included
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls so far, failed ones included
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Inspect memory without counting a read
    pub fn peek(&self, address: u64, size: usize) -> Option<Vec<u8>> {
        let blocks = self.blocks();
        let (start, data) = blocks.range(..=address).next_back()?;
        let offset = (address - start) as usize;
        data.get(offset..offset.checked_add(size)?).map(|s| s.to_vec())
    }

    fn blocks(&self) -> RwLockReadGuard<'_, BTreeMap<u64, Vec<u8>>> {
        self.blocks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn blocks_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<u64, Vec<u8>>> {
        self.blocks.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ByteSource for MockSource {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::UnreadableRegion { address, size });
        }

        self.peek(address, size)
            .ok_or(Error::UnreadableRegion { address, size })
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let size = data.len();
        let mut blocks = self.blocks_mut();
        let (start, block) = blocks
            .range_mut(..=address)
            .next_back()
            .ok_or(Error::UnwritableRegion { address, size })?;

        let offset = (address - start) as usize;
        let target = block
            .get_mut(offset..offset + size)
            .ok_or(Error::UnwritableRegion { address, size })?;
        target.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_read_bytes() {
        let source = MockSource::new().with_block(0x1000, vec![0x41, 0x42, 0x43, 0x44]);

        assert_eq!(
            source.read_bytes(0x1000, 4).unwrap(),
            vec![0x41, 0x42, 0x43, 0x44]
        );
        assert_eq!(source.read_bytes(0x1001, 2).unwrap(), vec![0x42, 0x43]);
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn test_mock_source_read_out_of_bounds() {
        let source = MockSource::new().with_block(0x1000, vec![0; 4]);

        // Reading past end should fail
        assert!(source.read_bytes(0x1002, 10).is_err());

        // Reading before base should fail
        assert!(source.read_bytes(0x500, 4).is_err());
    }

    #[test]
    fn test_mock_source_reads_do_not_span_blocks() {
        let source = MockSource::new()
            .with_block(0x1000, vec![1; 4])
            .with_block(0x1004, vec![2; 4]);

        assert_eq!(source.read_bytes(0x1004, 4).unwrap(), vec![2; 4]);
        assert!(source.read_bytes(0x1002, 4).is_err());
    }

    #[test]
    fn test_mock_source_fail_reads() {
        let source = MockSource::new().with_block(0x1000, vec![0; 8]);
        source.fail_reads(true);
        assert!(source.read_bytes(0x1000, 4).is_err());
        source.fail_reads(false);
        assert!(source.read_bytes(0x1000, 4).is_ok());
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn test_mock_source_write_bytes() {
        let source = MockSource::new().with_block(0x1000, vec![0; 8]);

        source.write_bytes(0x1002, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            source.peek(0x1000, 4).unwrap(),
            vec![0x00, 0x00, 0xAA, 0xBB]
        );
        assert!(source.write_bytes(0x1007, &[1, 2]).is_err());
        assert!(source.write_bytes(0x10, &[1]).is_err());
        assert_eq!(source.writes(), 3);
        assert_eq!(source.reads(), 0);
    }
}
