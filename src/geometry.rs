//! ESP Layout Constants and Geometry
//!
//! The partition's starting LBA, size, and FAT size are computed by the
//! partitioning stage and handed in here already validated. This module
//! only carries them; it performs no capacity check of its own.

use crate::types::FatTimestamp;

/// Sector size (standard)
pub const LBA_SIZE: usize = 512;

/// Reserved sectors before the first FAT copy
pub const RESERVED_SECTORS: u16 = 32;

/// Number of FAT copies
pub const NUM_FATS: u8 = 2;

/// Root directory cluster
pub const ROOT_CLUSTER: u32 = 2;

/// Seeded "/EFI" directory cluster
pub const EFI_CLUSTER: u32 = 3;

/// Seeded "/EFI/BOOT" directory cluster
pub const BOOT_CLUSTER: u32 = 4;

/// First cluster available for caller-inserted content
pub const FIRST_CONTENT_CLUSTER: u32 = 5;

/// End-of-chain marker written for the last cluster of every run
pub const FAT_EOC: u32 = 0xFFFF_FFFF;

/// FAT entry 0: reserved marker, lowest 8 bits are the media type (0xF8)
pub const FAT_MEDIA_ENTRY: u32 = 0xFFFF_FF00 | 0xF8;

/// Size of a short directory entry
pub const DIR_ENTRY_SIZE: usize = 32;

/// Directory capacity: directories occupy exactly one cluster here
pub const ENTRIES_PER_CLUSTER: usize = LBA_SIZE / DIR_ENTRY_SIZE;

/// Externally-computed placement of the ESP inside the disk image.
///
/// `start_lba` is the partition's first sector, `size_lbas` its length, and
/// `fat_size_lbas` the size of one FAT copy - all supplied by the partition
/// builder. `timestamp` is stamped into every directory entry the writer
/// creates; it defaults to zero so that image builds are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspGeometry {
    pub start_lba: u64,
    pub size_lbas: u32,
    pub fat_size_lbas: u32,
    pub timestamp: FatTimestamp,
}

impl EspGeometry {
    pub const fn new(start_lba: u64, size_lbas: u32, fat_size_lbas: u32) -> Self {
        Self {
            start_lba,
            size_lbas,
            fat_size_lbas,
            timestamp: FatTimestamp::ZERO,
        }
    }

    /// Stamp created entries with a fixed creation/write time
    pub const fn with_timestamp(mut self, timestamp: FatTimestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// First LBA of the first FAT copy
    pub const fn fat_lba(&self) -> u64 {
        self.start_lba + RESERVED_SECTORS as u64
    }

    /// First LBA of the data region (cluster 2)
    pub const fn data_lba(&self) -> u64 {
        self.fat_lba() + (NUM_FATS as u64) * (self.fat_size_lbas as u64)
    }
}
