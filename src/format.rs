//! Volume Initializer
//!
//! Lays down the VBR, FSInfo, backup copies, seeded FATs, and the fixed
//! "/EFI/BOOT" directory skeleton for a freshly-created ESP. Must run
//! exactly once per image, before any insertion. No capacity check is
//! performed; the partitioning stage guarantees the region is large
//! enough for the reserved sectors, both FAT copies, and the content the
//! caller intends to insert.

use crate::error::Fat32Error;
use crate::geometry::{
    EspGeometry, BOOT_CLUSTER, EFI_CLUSTER, FAT_EOC, FAT_MEDIA_ENTRY, FIRST_CONTENT_CLUSTER,
    LBA_SIZE, NUM_FATS, RESERVED_SECTORS, ROOT_CLUSTER,
};
use crate::types::{DirEntry, FatTimestamp, ATTR_DIRECTORY};
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

/// OEM name stamped into the VBR
pub const OEM_NAME: [u8; 8] = *b"ESPFAT  ";

/// Backup boot sector index inside the reserved region
pub const BACKUP_BOOT_SECTOR: u16 = 6;

/// FAT32 Volume Boot Record (first sector of the partition)
#[repr(C, packed)]
struct Vbr {
    jmp_boot: [u8; 3],       // Jump instruction
    oem_name: [u8; 8],       // OEM name
    bytes_per_sector: u16,   // Bytes per sector (512)
    sectors_per_cluster: u8, // Fixed at 1 for this writer
    reserved_sectors: u16,   // Reserved sectors (32)
    num_fats: u8,            // Number of FAT copies (2)
    root_entry_count: u16,   // Root entries (0 for FAT32)
    total_sectors_16: u16,   // Total sectors (0 for FAT32)
    media_type: u8,          // Media descriptor (0xF8 for fixed disk)
    fat_size_16: u16,        // FAT size (0 for FAT32)
    sectors_per_track: u16,
    num_heads: u16,
    hidden_sectors: u32,     // Sectors preceding the partition
    total_sectors_32: u32,   // Partition size in sectors
    fat_size_32: u32,        // One FAT copy, in sectors
    ext_flags: u16,
    fs_version: u16,
    root_cluster: u32,       // Root directory cluster (2)
    fs_info_sector: u16,     // FSInfo sector index (1)
    backup_boot_sector: u16, // Backup boot sector index (6)
    reserved: [u8; 12],
    drive_number: u8,        // 0x80 = hard disk
    reserved1: u8,
    boot_signature: u8,      // 0x29
    volume_id: u32,          // Zero for reproducible images
    volume_label: [u8; 11],
    fs_type: [u8; 8],        // "FAT32   "
    boot_code: [u8; 420],    // Unused; UEFI never executes VBR code
    boot_sector_sig: u16,    // 0xAA55
}

const _: () = assert!(core::mem::size_of::<Vbr>() == 512);

impl Vbr {
    fn new(geom: &EspGeometry) -> Self {
        Self {
            jmp_boot: [0xEB, 0x58, 0x90],
            oem_name: OEM_NAME,
            bytes_per_sector: LBA_SIZE as u16,
            sectors_per_cluster: 1,
            reserved_sectors: RESERVED_SECTORS,
            num_fats: NUM_FATS,
            root_entry_count: 0,
            total_sectors_16: 0,
            media_type: 0xF8,
            fat_size_16: 0,
            sectors_per_track: 0,
            num_heads: 0,
            hidden_sectors: geom.start_lba.saturating_sub(1) as u32,
            total_sectors_32: geom.size_lbas,
            fat_size_32: geom.fat_size_lbas,
            ext_flags: 0,
            fs_version: 0,
            root_cluster: ROOT_CLUSTER,
            fs_info_sector: 1,
            backup_boot_sector: BACKUP_BOOT_SECTOR,
            reserved: [0; 12],
            drive_number: 0x80,
            reserved1: 0,
            boot_signature: 0x29,
            volume_id: 0,
            volume_label: *b"NO NAME    ",
            fs_type: *b"FAT32   ",
            boot_code: [0; 420],
            boot_sector_sig: 0xAA55,
        }
    }

    fn to_bytes(&self) -> [u8; 512] {
        unsafe { core::mem::transmute_copy(self) }
    }
}

/// FSInfo sector (sector 1 and its backup at sector 7)
#[repr(C, packed)]
struct FsInfoSector {
    lead_sig: u32, // 0x41615252
    reserved1: [u8; 480],
    struc_sig: u32,  // 0x61417272
    free_count: u32, // Free cluster count (0xFFFFFFFF = unknown)
    next_free: u32,  // Allocation cursor
    reserved2: [u8; 12],
    trail_sig: u32, // 0xAA550000
}

const _: () = assert!(core::mem::size_of::<FsInfoSector>() == 512);

impl FsInfoSector {
    fn new(next_free: u32) -> Self {
        Self {
            lead_sig: 0x41615252,
            reserved1: [0; 480],
            struc_sig: 0x61417272,
            free_count: 0xFFFF_FFFF,
            next_free,
            reserved2: [0; 12],
            trail_sig: 0xAA550000,
        }
    }

    fn to_bytes(&self) -> [u8; 512] {
        unsafe { core::mem::transmute_copy(self) }
    }
}

fn seed_entry(name: &[u8; 11], cluster: u32, ts: FatTimestamp) -> DirEntry {
    let mut entry = DirEntry::empty();
    entry.name = *name;
    entry.attr = ATTR_DIRECTORY;
    entry.set_first_cluster(cluster);
    entry.set_timestamp(ts);
    entry
}

/// Write a directory cluster as one full sector: the given entries at the
/// front, zeroes behind them. The trailing zeroes are the scan terminator.
fn write_dir_cluster<B: BlockIo>(
    block_io: &mut B,
    lba: u64,
    entries: &[DirEntry],
) -> Result<(), Fat32Error> {
    let mut sector = [0u8; LBA_SIZE];
    for (i, entry) in entries.iter().enumerate() {
        sector[i * 32..(i + 1) * 32].copy_from_slice(&entry.to_bytes());
    }
    block_io
        .write_blocks(Lba(lba), &sector)
        .map_err(|_| Fat32Error::IoError)
}

/// Initialize an empty FAT32 ESP.
///
/// Writes the VBR and FSInfo (plus backups at sectors 6 and 7), seeds
/// both FAT copies with the media marker and end-of-chain entries for the
/// root, "/EFI", and "/EFI/BOOT" clusters, and lays down those three
/// directories. The allocation cursor starts at cluster 5, the first
/// cluster available for caller-inserted content.
pub fn write_empty_fat32_esp<B: BlockIo>(
    block_io: &mut B,
    geom: &EspGeometry,
) -> Result<(), Fat32Error> {
    let vbr_bytes = Vbr::new(geom).to_bytes();
    let fsinfo_bytes = FsInfoSector::new(FIRST_CONTENT_CLUSTER).to_bytes();

    // Primary VBR + FSInfo, then identical backups
    for base in [geom.start_lba, geom.start_lba + BACKUP_BOOT_SECTOR as u64] {
        block_io
            .write_blocks(Lba(base), &vbr_bytes)
            .map_err(|_| Fat32Error::IoError)?;
        block_io
            .write_blocks(Lba(base + 1), &fsinfo_bytes)
            .map_err(|_| Fat32Error::IoError)?;
    }

    // First sector of each FAT copy: media marker, then EOC for cluster 1
    // and the three seeded directory clusters. Clusters 5+ stay free.
    let mut fat_sector = [0u8; LBA_SIZE];
    let seed_entries = [FAT_MEDIA_ENTRY, FAT_EOC, FAT_EOC, FAT_EOC, FAT_EOC];
    for (i, entry) in seed_entries.iter().enumerate() {
        fat_sector[i * 4..(i + 1) * 4].copy_from_slice(&entry.to_le_bytes());
    }
    for fat_num in 0..NUM_FATS {
        let lba = geom.fat_lba() + (fat_num as u64) * (geom.fat_size_lbas as u64);
        block_io
            .write_blocks(Lba(lba), &fat_sector)
            .map_err(|_| Fat32Error::IoError)?;
    }

    let ts = geom.timestamp;
    let data = geom.data_lba();

    // Root directory: a single "EFI" entry
    write_dir_cluster(
        block_io,
        data,
        &[seed_entry(b"EFI        ", EFI_CLUSTER, ts)],
    )?;

    // "/EFI": self, parent (root records as cluster 0), and "BOOT"
    write_dir_cluster(
        block_io,
        data + (EFI_CLUSTER - ROOT_CLUSTER) as u64,
        &[
            seed_entry(b".          ", EFI_CLUSTER, ts),
            seed_entry(b"..         ", 0, ts),
            seed_entry(b"BOOT       ", BOOT_CLUSTER, ts),
        ],
    )?;

    // "/EFI/BOOT": self and parent
    write_dir_cluster(
        block_io,
        data + (BOOT_CLUSTER - ROOT_CLUSTER) as u64,
        &[
            seed_entry(b".          ", BOOT_CLUSTER, ts),
            seed_entry(b"..         ", EFI_CLUSTER, ts),
        ],
    )?;

    block_io.flush().map_err(|_| Fat32Error::IoError)?;
    Ok(())
}
