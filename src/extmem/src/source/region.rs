//! Memory Region Types
//!
//! Address ranges of a foreign address space, as listed by `/proc/pid/maps`
//! or by a dump file's memory list.

/// A contiguous range of foreign memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    /// Offset of `start` inside the backing file
    pub offset: u64,
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    /// True when `[address, address + size)` lies entirely inside the region
    pub fn contains_range(&self, address: u64, size: usize) -> bool {
        self.contains(address)
            && address
                .checked_add(size as u64)
                .is_some_and(|end| end <= self.end)
    }

    /// Backing file offset of `address`, if it is inside the region
    pub fn file_offset(&self, address: u64) -> Option<u64> {
        if !self.contains(address) {
            return None;
        }
        self.offset.checked_add(address - self.start)
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    /// Parse one line of `/proc/pid/maps`
    /// (`start-end perms offset dev inode [path]`)
    pub fn parse_maps_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (start, end) = parts.first()?.split_once('-')?;
        let start = u64::from_str_radix(start, 16).ok()?;
        let end = u64::from_str_radix(end, 16).ok()?;
        if end < start {
            return None;
        }

        Some(MemoryRegion {
            start,
            end,
            perms: parts.get(1).unwrap_or(&"").to_string(),
            offset: parts
                .get(2)
                .and_then(|s| u64::from_str_radix(s, 16).ok())
                .unwrap_or(0),
            path: parts.get(5).map(|s| s.to_string()),
        })
    }

    /// Parse one line of the dump range format
    /// (`0xSTART 0xEND SIZE 0xFILE_OFFSET`)
    pub fn parse_range_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }

        let hex = |s: &str| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok();
        let start = hex(parts[0])?;
        let end = hex(parts[1])?;
        if end < start {
            return None;
        }

        Some(MemoryRegion {
            start,
            end,
            perms: "rw-p".to_string(),
            offset: hex(parts[3])?,
            path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_region_size() {
        let region = MemoryRegion {
            start: 0x1000,
            end: 0x2000,
            perms: "rw-p".to_string(),
            offset: 0,
            path: None,
        };
        assert_eq!(region.size(), 0x1000);
        assert!(region.contains(0x1fff));
        assert!(!region.contains(0x2000));
    }

    #[test]
    fn test_memory_region_perms() {
        let region = MemoryRegion {
            start: 0,
            end: 0x1000,
            perms: "r--p".to_string(),
            offset: 0,
            path: None,
        };
        assert!(region.is_readable());
        assert!(!region.is_writable());
    }

    #[test]
    fn test_parse_maps_line() {
        let region = MemoryRegion::parse_maps_line(
            "7f0000000000-7f0000001000 r-xp 00002000 08:01 1234 /usr/lib/libfoo.so",
        )
        .unwrap();
        assert_eq!(region.start, 0x7f0000000000);
        assert_eq!(region.end, 0x7f0000001000);
        assert_eq!(region.perms, "r-xp");
        assert_eq!(region.offset, 0x2000);
        assert_eq!(region.path.as_deref(), Some("/usr/lib/libfoo.so"));

        assert!(MemoryRegion::parse_maps_line("garbage").is_none());
    }

    #[test]
    fn test_parse_range_line() {
        let region = MemoryRegion::parse_range_line("0x140000000 0x140001000 4096 0x200").unwrap();
        assert_eq!(region.start, 0x140000000);
        assert_eq!(region.size(), 0x1000);
        assert_eq!(region.offset, 0x200);
        assert!(region.is_writable());

        assert!(MemoryRegion::parse_range_line("0x1 0x2").is_none());
        assert!(MemoryRegion::parse_range_line("0x2000 0x1000 0 0x0").is_none());
        assert!(MemoryRegion::parse_maps_line("2000-1000 rw-p 0 00:00 0").is_none());
    }

    #[test]
    fn test_inverted_region_has_no_size() {
        let region = MemoryRegion {
            start: 0x2000,
            end: 0x1000,
            perms: "rw-p".to_string(),
            offset: 0,
            path: None,
        };
        assert_eq!(region.size(), 0);
        assert!(!region.contains(0x1800));
        assert_eq!(region.file_offset(0x2000), None);
    }

    #[test]
    fn test_contains_range() {
        let region = MemoryRegion {
            start: 0x1000,
            end: 0x1010,
            perms: "rw-p".to_string(),
            offset: 0x40,
            path: None,
        };
        assert!(region.contains_range(0x1000, 0x10));
        assert!(region.contains_range(0x100C, 4));
        assert!(!region.contains_range(0x100C, 8));
        assert!(!region.contains_range(0x1008, usize::MAX));
        assert_eq!(region.file_offset(0x1004), Some(0x44));
        assert_eq!(region.file_offset(0x1010), None);
    }

    #[test]
    fn test_file_offset_overflow() {
        let region = MemoryRegion {
            start: 0x1000,
            end: 0x2000,
            perms: "rw-p".to_string(),
            offset: u64::MAX - 4,
            path: None,
        };
        assert_eq!(region.file_offset(0x1004), Some(u64::MAX));
        assert_eq!(region.file_offset(0x1005), None);
    }
}
