//! On-Disk Record Types
//!
//! The 32-byte short directory entry, the file/directory distinction, and
//! the packed FAT timestamp format. Long (VFAT) name entries are not
//! produced by this writer.

/// Directory attribute bit
pub const ATTR_DIRECTORY: u8 = 0x10;
/// Regular file attribute bit
pub const ATTR_ARCHIVE: u8 = 0x20;

/// What a path segment names on the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// FAT-packed creation/write stamp.
///
/// `time` is hours/minutes/2-second units, `date` is offset-1980
/// year/month/day. The writer never reads a clock itself; builders that
/// want real timestamps encode one with [`FatTimestamp::from_parts`] and
/// hand it in through `EspGeometry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatTimestamp {
    pub time: u16,
    pub date: u16,
}

impl FatTimestamp {
    /// All-zero stamp, used by default for reproducible images
    pub const ZERO: Self = Self { time: 0, date: 0 };

    /// Pack a civil date/time into FAT's 16-bit fields.
    ///
    /// Out-of-range components are masked to their field widths; years
    /// before 1980 clamp to 1980.
    pub const fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let years = if year < 1980 { 0 } else { year - 1980 };
        let date = ((years & 0x7F) << 9) | (((month as u16) & 0x0F) << 5) | ((day as u16) & 0x1F);
        let time = (((hour as u16) & 0x1F) << 11)
            | (((minute as u16) & 0x3F) << 5)
            | (((second as u16) / 2) & 0x1F);
        Self { time, date }
    }
}

/// FAT32 short directory entry (32 bytes)
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    pub name: [u8; 11], // 8.3 filename, space padded
    pub attr: u8,
    pub nt_reserved: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub cluster_high: u16, // High word of first cluster
    pub write_time: u16,
    pub write_date: u16,
    pub cluster_low: u16, // Low word of first cluster
    pub file_size: u32,   // Bytes; 0 for directories
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == 32);

impl DirEntry {
    pub const fn empty() -> Self {
        Self {
            name: [0; 11],
            attr: 0,
            nt_reserved: 0,
            create_time_tenth: 0,
            create_time: 0,
            create_date: 0,
            access_date: 0,
            cluster_high: 0,
            write_time: 0,
            write_date: 0,
            cluster_low: 0,
            file_size: 0,
        }
    }

    /// A zero first name byte terminates the directory scan; every entry
    /// before it is in use. This writer never produces 0xE5 tombstones.
    pub fn is_end_marker(&self) -> bool {
        self.name[0] == 0
    }

    pub fn is_directory(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }

    pub fn first_cluster(&self) -> u32 {
        let high = self.cluster_high;
        let low = self.cluster_low;
        ((high as u32) << 16) | (low as u32)
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.cluster_high = (cluster >> 16) as u16;
        self.cluster_low = (cluster & 0xFFFF) as u16;
    }

    pub fn set_timestamp(&mut self, ts: FatTimestamp) {
        self.create_time = ts.time;
        self.create_date = ts.date;
        self.write_time = ts.time;
        self.write_date = ts.date;
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        unsafe { core::mem::transmute_copy(self) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_split_roundtrip() {
        let mut entry = DirEntry::empty();
        entry.set_first_cluster(0x0012_3456);
        assert_eq!(entry.first_cluster(), 0x0012_3456);
        let high = entry.cluster_high;
        let low = entry.cluster_low;
        assert_eq!(high, 0x0012);
        assert_eq!(low, 0x3456);
    }

    #[test]
    fn test_end_marker() {
        let mut entry = DirEntry::empty();
        assert!(entry.is_end_marker());
        entry.name[0] = b'A';
        assert!(!entry.is_end_marker());
    }

    #[test]
    fn test_timestamp_packing() {
        // 2024-08-23 12:34:56
        let ts = FatTimestamp::from_parts(2024, 8, 23, 12, 34, 56);
        assert_eq!(ts.date, (44 << 9) | (8 << 5) | 23);
        assert_eq!(ts.time, (12 << 11) | (34 << 5) | 28);

        // Years before the FAT epoch clamp to 1980
        let old = FatTimestamp::from_parts(1970, 1, 1, 0, 0, 0);
        assert_eq!(old.date, (1 << 5) | 1);
    }

    #[test]
    fn test_entry_serialization() {
        let mut entry = DirEntry::empty();
        entry.name = *b"BOOTX64 EFI";
        entry.attr = ATTR_ARCHIVE;
        entry.set_first_cluster(5);
        entry.file_size = 5000;

        let bytes = entry.to_bytes();
        assert_eq!(&bytes[0..11], b"BOOTX64 EFI");
        assert_eq!(bytes[11], ATTR_ARCHIVE);
        assert_eq!(u16::from_le_bytes([bytes[26], bytes[27]]), 5);
        assert_eq!(u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]), 5000);
    }
}
