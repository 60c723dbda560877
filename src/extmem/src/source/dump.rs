//! Dump File Byte Source
//!
//! Byte source backed by a memory dump on disk (Windows minidumps and raw
//! dumps with an optional maps sidecar).

use super::{ByteSource, MemoryRegion};
use crate::{Error, Result};

use byteorder::{ByteOrder, LE};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Memory dump file source
///
/// Raw dumps without a maps file are treated as a linear image where the file
/// offset equals the virtual address. Dumps are read-only.
pub struct DumpFile {
    /// Memory-mapped dump file
    mmap: Mmap,
    /// Virtual address regions parsed from the dump or its maps file
    regions: Vec<MemoryRegion>,
    /// Path to the dump file
    pub path: PathBuf,
}

impl DumpFile {
    /// MDMP signature "MDMP" in little-endian
    const MDMP_SIGNATURE: u32 = 0x504D444D;

    /// MDMP stream type holding full memory ranges
    const MEMORY_64_LIST_STREAM: u32 = 9;

    /// Open a memory dump file
    ///
    /// Supports:
    /// - Windows Minidump (MDMP) format - auto-detected by "MDMP" signature
    /// - Raw dumps, with `<dump>.maps` next to them when present
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mmap = Self::map(&path)?;

        if mmap.len() >= 4 && LE::read_u32(&mmap[0..4]) == Self::MDMP_SIGNATURE {
            tracing::debug!("{:?}: Windows Minidump (MDMP) format", path);
            let regions = Self::parse_mdmp(&mmap)?;
            return Ok(DumpFile {
                mmap,
                regions,
                path,
            });
        }

        let maps_path = path.with_extension("maps");
        let regions = if maps_path.exists() {
            Self::parse_maps_file(&maps_path)?
        } else {
            vec![MemoryRegion {
                start: 0,
                end: mmap.len() as u64,
                perms: "r--p".to_string(),
                offset: 0,
                path: None,
            }]
        };

        Ok(DumpFile {
            mmap,
            regions,
            path,
        })
    }

    /// Open a raw dump with an explicit maps file
    pub fn open_with_maps<P: AsRef<Path>, M: AsRef<Path>>(dump_path: P, maps_path: M) -> Result<Self> {
        let path = dump_path.as_ref().to_path_buf();
        let mmap = Self::map(&path)?;
        let regions = Self::parse_maps_file(maps_path.as_ref())?;

        Ok(DumpFile {
            mmap,
            regions,
            path,
        })
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn map(path: &Path) -> Result<Mmap> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only; a dump truncated underneath us is
        // the caller's problem, as with any mmap-backed reader.
        let mmap = unsafe { Mmap::map(&file) }?;

        tracing::info!(
            "Opened dump file: {:?} ({} MB)",
            path,
            mmap.len() / 1_000_000
        );

        Ok(mmap)
    }

    /// Parse the Memory64ListStream of a Windows Minidump
    fn parse_mdmp(mmap: &[u8]) -> Result<Vec<MemoryRegion>> {
        if mmap.len() < 32 {
            return Err(Error::InvalidDump("MDMP file too small for header".into()));
        }

        let num_streams = LE::read_u32(&mmap[0x08..0x0C]) as usize;
        let stream_dir_rva = LE::read_u32(&mmap[0x0C..0x10]) as usize;

        for i in 0..num_streams {
            let entry_offset = stream_dir_rva + i * 12;
            if entry_offset + 12 > mmap.len() {
                break;
            }

            let stream_type = LE::read_u32(&mmap[entry_offset..entry_offset + 4]);
            let rva = LE::read_u32(&mmap[entry_offset + 8..entry_offset + 12]) as usize;

            if stream_type != Self::MEMORY_64_LIST_STREAM {
                continue;
            }

            if rva + 16 > mmap.len() {
                return Err(Error::InvalidDump(
                    "Memory64ListStream header out of bounds".into(),
                ));
            }

            let num_ranges = LE::read_u64(&mmap[rva..rva + 8]) as usize;
            let mut file_offset = LE::read_u64(&mmap[rva + 8..rva + 16]);
            let mut regions = Vec::with_capacity(num_ranges.min(0x10000));

            for j in 0..num_ranges {
                let desc = rva + 16 + j * 16;
                if desc + 16 > mmap.len() {
                    break;
                }

                let start = LE::read_u64(&mmap[desc..desc + 8]);
                let size = LE::read_u64(&mmap[desc + 8..desc + 16]);
                let (Some(end), Some(next_offset)) =
                    (start.checked_add(size), file_offset.checked_add(size))
                else {
                    return Err(Error::InvalidDump(format!(
                        "memory range {} ({:#x} + {:#x}) overflows",
                        j, start, size
                    )));
                };

                regions.push(MemoryRegion {
                    start,
                    end,
                    perms: "rw-p".to_string(),
                    offset: file_offset,
                    path: None,
                });
                file_offset = next_offset;
            }

            tracing::debug!("Parsed {} memory ranges from MDMP", regions.len());
            return Ok(regions);
        }

        Err(Error::InvalidDump(
            "No Memory64ListStream found in MDMP - dump may be incomplete".into(),
        ))
    }

    /// Parse a maps file (supports both /proc/pid/maps and the range format)
    fn parse_maps_file(path: &Path) -> Result<Vec<MemoryRegion>> {
        let reader = BufReader::new(File::open(path)?);
        let mut regions = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let region = if line.starts_with("0x") {
                MemoryRegion::parse_range_line(line)
            } else {
                MemoryRegion::parse_maps_line(line)
            };

            if let Some(region) = region {
                regions.push(region);
            }
        }

        Ok(regions)
    }

    /// File span holding `size` bytes at virtual address `va`
    ///
    /// The whole span must fall inside the region that holds `va`; a read
    /// running off the end of one range never continues into the next one.
    fn va_to_offset(&self, va: u64, size: usize) -> Option<std::ops::Range<usize>> {
        let region = self.regions.iter().find(|r| r.contains(va))?;
        if !region.contains_range(va, size) {
            return None;
        }

        let offset = usize::try_from(region.file_offset(va)?).ok()?;
        let end = offset.checked_add(size)?;
        (end <= self.mmap.len()).then_some(offset..end)
    }
}

impl ByteSource for DumpFile {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let span = self
            .va_to_offset(address, size)
            .ok_or(Error::UnreadableRegion { address, size })?;

        Ok(self.mmap[span].to_vec())
    }

    fn write_bytes(&self, _address: u64, _data: &[u8]) -> Result<()> {
        Err(Error::ReadOnly)
    }
}
