//! Post-Build Structural Verification
//!
//! Re-reads the volume and checks that everything the initializer lays
//! down is still in place: signatures, geometry fields, seeded FAT
//! entries in both copies, and the "/EFI/BOOT" directory skeleton. Image
//! builders run this once after assembly as a cheap sanity gate.

use crate::context::Fat32Context;
use crate::error::Fat32Error;
use crate::format::{BACKUP_BOOT_SECTOR, OEM_NAME};
use crate::geometry::{
    EspGeometry, BOOT_CLUSTER, EFI_CLUSTER, FAT_EOC, FAT_MEDIA_ENTRY, FIRST_CONTENT_CLUSTER,
    LBA_SIZE, NUM_FATS, RESERVED_SECTORS, ROOT_CLUSTER,
};
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

fn fat_entry(sector: &[u8; LBA_SIZE], index: usize) -> u32 {
    u32::from_le_bytes([
        sector[index * 4],
        sector[index * 4 + 1],
        sector[index * 4 + 2],
        sector[index * 4 + 3],
    ])
}

fn check(ok: bool) -> Result<(), Fat32Error> {
    if ok {
        Ok(())
    } else {
        Err(Fat32Error::CorruptVolume)
    }
}

/// Verify the initialized ESP structures.
///
/// Checks the primary and backup VBR, the FSInfo signatures and cursor,
/// the five seeded FAT entries in every FAT copy, and the seed directory
/// entries for "/EFI" and "/EFI/BOOT".
pub fn verify_esp<B: BlockIo>(block_io: &mut B, geom: &EspGeometry) -> Result<(), Fat32Error> {
    let mut buffer = [0u8; LBA_SIZE];

    // Primary VBR
    block_io
        .read_blocks(Lba(geom.start_lba), &mut buffer)
        .map_err(|_| Fat32Error::IoError)?;
    check(buffer[510] == 0x55 && buffer[511] == 0xAA)?;
    check(buffer[3..11] == OEM_NAME)?;
    check(u16::from_le_bytes([buffer[11], buffer[12]]) as usize == LBA_SIZE)?;
    check(buffer[13] == 1)?; // sectors per cluster
    check(u16::from_le_bytes([buffer[14], buffer[15]]) == RESERVED_SECTORS)?;
    check(buffer[16] == NUM_FATS)?;
    check(u32::from_le_bytes([buffer[44], buffer[45], buffer[46], buffer[47]]) == ROOT_CLUSTER)?;
    check(u16::from_le_bytes([buffer[48], buffer[49]]) == 1)?;
    check(u16::from_le_bytes([buffer[50], buffer[51]]) == BACKUP_BOOT_SECTOR)?;
    check(&buffer[82..90] == b"FAT32   ")?;

    // Backup VBR carries the same signature and OEM name
    block_io
        .read_blocks(Lba(geom.start_lba + BACKUP_BOOT_SECTOR as u64), &mut buffer)
        .map_err(|_| Fat32Error::IoError)?;
    check(buffer[510] == 0x55 && buffer[511] == 0xAA)?;
    check(buffer[3..11] == OEM_NAME)?;

    // FSInfo signatures and a cursor past the seeded clusters. The cursor
    // only moves forward, so anything below 5 means a clobbered sector.
    let ctx = Fat32Context::from_boot_sector(block_io, geom.start_lba)?;
    check(ctx.read_next_free(block_io)? >= FIRST_CONTENT_CLUSTER)?;

    // Seed entries at the head of every FAT copy
    for fat_num in 0..ctx.num_fats {
        let lba = ctx.fat_start_lba + (fat_num as u64) * (ctx.fat_size as u64);
        block_io
            .read_blocks(Lba(lba), &mut buffer)
            .map_err(|_| Fat32Error::IoError)?;
        check(fat_entry(&buffer, 0) == FAT_MEDIA_ENTRY)?;
        for cluster in 1..=4 {
            check(fat_entry(&buffer, cluster) == FAT_EOC)?;
        }
    }

    // Root holds "EFI", "/EFI" holds "BOOT", both pointing at their
    // seeded clusters
    block_io
        .read_blocks(Lba(ctx.cluster_to_lba(ROOT_CLUSTER)), &mut buffer)
        .map_err(|_| Fat32Error::IoError)?;
    check(&buffer[0..11] == b"EFI        ")?;
    check(u16::from_le_bytes([buffer[26], buffer[27]]) as u32 == EFI_CLUSTER)?;

    block_io
        .read_blocks(Lba(ctx.cluster_to_lba(EFI_CLUSTER)), &mut buffer)
        .map_err(|_| Fat32Error::IoError)?;
    check(&buffer[0..11] == b".          ")?;
    check(&buffer[32..43] == b"..         ")?;
    check(&buffer[64..75] == b"BOOT       ")?;
    check(u16::from_le_bytes([buffer[90], buffer[91]]) as u32 == BOOT_CLUSTER)?;

    block_io
        .read_blocks(Lba(ctx.cluster_to_lba(BOOT_CLUSTER)), &mut buffer)
        .map_err(|_| Fat32Error::IoError)?;
    check(&buffer[0..11] == b".          ")?;
    check(&buffer[32..43] == b"..         ")?;

    Ok(())
}
