//! Per-Call Volume Context
//!
//! Every top-level operation re-reads the VBR and FSInfo fields it needs
//! from the image instead of holding them in memory across calls. The
//! small I/O cost buys the guarantee that each call observes the latest
//! on-disk state of the shared allocation cursor.

use crate::error::Fat32Error;
use crate::geometry::LBA_SIZE;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

const FSINFO_LEAD_SIG: u32 = 0x41615252;
const FSINFO_STRUC_SIG: u32 = 0x61417272;
const FSINFO_TRAIL_SIG: u32 = 0xAA550000;
const FSINFO_NEXT_FREE_OFFSET: usize = 492;

/// Geometry of an initialized FAT32 volume, parsed fresh from its VBR
pub struct Fat32Context {
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub fat_size: u32,
    pub num_fats: u32,
    pub root_cluster: u32,
    /// Absolute LBA of the first FAT copy
    pub fat_start_lba: u64,
    /// Absolute LBA of cluster 2
    pub data_start_lba: u64,
    /// Absolute LBA of the primary FSInfo sector
    pub fsinfo_lba: u64,
}

impl Fat32Context {
    /// Parse the volume's VBR at `start_lba`.
    ///
    /// Validates the boot signature and the 512-byte sector size before
    /// trusting any derived offset.
    pub fn from_boot_sector<B: BlockIo>(
        block_io: &mut B,
        start_lba: u64,
    ) -> Result<Self, Fat32Error> {
        let mut boot_sector = [0u8; LBA_SIZE];
        block_io
            .read_blocks(Lba(start_lba), &mut boot_sector)
            .map_err(|_| Fat32Error::IoError)?;

        if boot_sector[510] != 0x55 || boot_sector[511] != 0xAA {
            return Err(Fat32Error::CorruptVolume);
        }

        let bytes_per_sector = u16::from_le_bytes([boot_sector[0x0B], boot_sector[0x0C]]);
        if bytes_per_sector as usize != LBA_SIZE {
            return Err(Fat32Error::CorruptVolume);
        }

        let sectors_per_cluster = boot_sector[0x0D] as u32;
        let reserved_sectors = u16::from_le_bytes([boot_sector[0x0E], boot_sector[0x0F]]) as u32;
        let num_fats = boot_sector[0x10] as u32;
        let fat_size = u32::from_le_bytes([
            boot_sector[0x24],
            boot_sector[0x25],
            boot_sector[0x26],
            boot_sector[0x27],
        ]);
        let root_cluster = u32::from_le_bytes([
            boot_sector[0x2C],
            boot_sector[0x2D],
            boot_sector[0x2E],
            boot_sector[0x2F],
        ]);
        let fsinfo_sector = u16::from_le_bytes([boot_sector[0x30], boot_sector[0x31]]);
        if sectors_per_cluster == 0 || num_fats == 0 || fat_size == 0 {
            return Err(Fat32Error::CorruptVolume);
        }

        let fat_start_lba = start_lba + reserved_sectors as u64;
        let data_start_lba = fat_start_lba + (num_fats as u64) * (fat_size as u64);

        Ok(Self {
            sectors_per_cluster,
            reserved_sectors,
            fat_size,
            num_fats,
            root_cluster,
            fat_start_lba,
            data_start_lba,
            fsinfo_lba: start_lba + fsinfo_sector as u64,
        })
    }

    /// Absolute LBA of a cluster's data
    pub fn cluster_to_lba(&self, cluster: u32) -> u64 {
        self.data_start_lba + ((cluster - 2) as u64) * (self.sectors_per_cluster as u64)
    }

    /// Read a chain-link entry from the first FAT copy
    pub fn read_fat_entry<B: BlockIo>(
        &self,
        block_io: &mut B,
        cluster: u32,
    ) -> Result<u32, Fat32Error> {
        let fat_offset = cluster as u64 * 4;
        let sector_lba = self.fat_start_lba + fat_offset / LBA_SIZE as u64;
        let entry_offset = (fat_offset % LBA_SIZE as u64) as usize;

        let mut sector = [0u8; LBA_SIZE];
        block_io
            .read_blocks(Lba(sector_lba), &mut sector)
            .map_err(|_| Fat32Error::IoError)?;

        Ok(u32::from_le_bytes([
            sector[entry_offset],
            sector[entry_offset + 1],
            sector[entry_offset + 2],
            sector[entry_offset + 3],
        ]))
    }

    /// Write one chain-link entry, identically into every FAT copy.
    ///
    /// The value is computed by the caller before any copy is touched, so
    /// the copies can never diverge.
    pub fn write_fat_entry<B: BlockIo>(
        &self,
        block_io: &mut B,
        cluster: u32,
        value: u32,
    ) -> Result<(), Fat32Error> {
        let fat_offset = cluster as u64 * 4;
        let sector_in_fat = fat_offset / LBA_SIZE as u64;
        let entry_offset = (fat_offset % LBA_SIZE as u64) as usize;

        for fat_num in 0..self.num_fats {
            let sector_lba = self.fat_start_lba + (fat_num as u64) * (self.fat_size as u64) + sector_in_fat;

            let mut sector = [0u8; LBA_SIZE];
            block_io
                .read_blocks(Lba(sector_lba), &mut sector)
                .map_err(|_| Fat32Error::IoError)?;

            sector[entry_offset..entry_offset + 4].copy_from_slice(&value.to_le_bytes());

            block_io
                .write_blocks(Lba(sector_lba), &sector)
                .map_err(|_| Fat32Error::IoError)?;
        }

        Ok(())
    }

    /// Read the allocation cursor from FSInfo, validating its signatures
    pub fn read_next_free<B: BlockIo>(&self, block_io: &mut B) -> Result<u32, Fat32Error> {
        let mut sector = [0u8; LBA_SIZE];
        block_io
            .read_blocks(Lba(self.fsinfo_lba), &mut sector)
            .map_err(|_| Fat32Error::IoError)?;

        let lead = u32::from_le_bytes([sector[0], sector[1], sector[2], sector[3]]);
        let struc = u32::from_le_bytes([sector[484], sector[485], sector[486], sector[487]]);
        let trail = u32::from_le_bytes([sector[508], sector[509], sector[510], sector[511]]);
        if lead != FSINFO_LEAD_SIG || struc != FSINFO_STRUC_SIG || trail != FSINFO_TRAIL_SIG {
            return Err(Fat32Error::InvalidFsInfo);
        }

        let next_free = u32::from_le_bytes([
            sector[FSINFO_NEXT_FREE_OFFSET],
            sector[FSINFO_NEXT_FREE_OFFSET + 1],
            sector[FSINFO_NEXT_FREE_OFFSET + 2],
            sector[FSINFO_NEXT_FREE_OFFSET + 3],
        ]);
        // Clusters 0 and 1 are reserved and 2 is the root; a cursor below
        // 3 can only come from a clobbered FSInfo sector.
        if next_free < 3 {
            return Err(Fat32Error::InvalidFsInfo);
        }

        Ok(next_free)
    }

    /// Persist the allocation cursor into the primary FSInfo sector
    pub fn write_next_free<B: BlockIo>(
        &self,
        block_io: &mut B,
        next_free: u32,
    ) -> Result<(), Fat32Error> {
        let mut sector = [0u8; LBA_SIZE];
        block_io
            .read_blocks(Lba(self.fsinfo_lba), &mut sector)
            .map_err(|_| Fat32Error::IoError)?;

        sector[FSINFO_NEXT_FREE_OFFSET..FSINFO_NEXT_FREE_OFFSET + 4]
            .copy_from_slice(&next_free.to_le_bytes());

        block_io
            .write_blocks(Lba(self.fsinfo_lba), &sector)
            .map_err(|_| Fat32Error::IoError)
    }
}
