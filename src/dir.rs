//! Directory Writer
//!
//! Searches and appends 32-byte short entries inside a directory's single
//! data cluster, seeds "." / ".." for new directories, and streams file
//! content into freshly-allocated clusters. The scan is bounded to the 16
//! entries a one-sector cluster can hold; it never trusts the zero-name
//! terminator alone to stop in time.

use crate::allocator::ClusterRun;
use crate::context::Fat32Context;
use crate::error::Fat32Error;
use crate::filename;
use crate::geometry::{ENTRIES_PER_CLUSTER, LBA_SIZE};
use crate::types::{DirEntry, EntryKind, FatTimestamp, ATTR_ARCHIVE, ATTR_DIRECTORY};
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use std::io::Read;

fn read_dir_sector<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    dir_cluster: u32,
) -> Result<[u8; LBA_SIZE], Fat32Error> {
    // Clusters 0 and 1 have no data region; an entry pointing there can
    // only come from a clobbered image.
    if dir_cluster < 2 {
        return Err(Fat32Error::CorruptVolume);
    }
    let mut sector = [0u8; LBA_SIZE];
    block_io
        .read_blocks(Lba(ctx.cluster_to_lba(dir_cluster)), &mut sector)
        .map_err(|_| Fat32Error::IoError)?;
    Ok(sector)
}

/// Search a directory's cluster for an entry matching `name`.
///
/// Matching is the codec's case-insensitive positional compare. Returns
/// `None` if the terminator is reached or all 16 slots are in use without
/// a match.
pub fn find_entry<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    dir_cluster: u32,
    name: &str,
) -> Result<Option<DirEntry>, Fat32Error> {
    let sector = read_dir_sector(block_io, ctx, dir_cluster)?;
    let entries = unsafe {
        core::slice::from_raw_parts(sector.as_ptr() as *const DirEntry, ENTRIES_PER_CLUSTER)
    };

    for entry in entries {
        if entry.is_end_marker() {
            return Ok(None);
        }
        let entry_name = entry.name;
        if filename::name_matches(&entry_name, name) {
            return Ok(Some(*entry));
        }
    }

    Ok(None)
}

/// Append a new short entry to a directory's cluster.
///
/// The first zero-name slot within the 16-entry bound is overwritten;
/// a directory with no such slot is full, which is a reported failure
/// (directories never grow past one cluster in this design).
#[allow(clippy::too_many_arguments)]
pub fn insert_entry<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    dir_cluster: u32,
    name: &str,
    kind: EntryKind,
    first_cluster: u32,
    file_size: u32,
    ts: FatTimestamp,
) -> Result<(), Fat32Error> {
    let mut sector = read_dir_sector(block_io, ctx, dir_cluster)?;

    let slot = sector
        .chunks_exact(32)
        .position(|raw| raw[0] == 0)
        .ok_or(Fat32Error::DirectoryFull)?;

    let mut entry = DirEntry::empty();
    entry.name = filename::format_name(name, kind);
    entry.attr = match kind {
        EntryKind::Directory => ATTR_DIRECTORY,
        EntryKind::File => ATTR_ARCHIVE,
    };
    entry.set_first_cluster(first_cluster);
    entry.set_timestamp(ts);
    entry.file_size = match kind {
        EntryKind::Directory => 0,
        EntryKind::File => file_size,
    };

    sector[slot * 32..(slot + 1) * 32].copy_from_slice(&entry.to_bytes());

    block_io
        .write_blocks(Lba(ctx.cluster_to_lba(dir_cluster)), &sector)
        .map_err(|_| Fat32Error::IoError)
}

/// Seed a freshly-allocated directory cluster with "." and ".." entries.
///
/// The whole sector is written, so the trailing zero terminator is in
/// place no matter what the backing image held before. A parent that is
/// the root directory is recorded as cluster 0, per FAT32 convention and
/// matching the initializer's seeds.
pub fn seed_dot_entries<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    new_cluster: u32,
    parent_cluster: u32,
    ts: FatTimestamp,
) -> Result<(), Fat32Error> {
    let recorded_parent = if parent_cluster == ctx.root_cluster {
        0
    } else {
        parent_cluster
    };

    let mut dot = DirEntry::empty();
    dot.name = *b".          ";
    dot.attr = ATTR_DIRECTORY;
    dot.set_first_cluster(new_cluster);
    dot.set_timestamp(ts);

    let mut dotdot = DirEntry::empty();
    dotdot.name = *b"..         ";
    dotdot.attr = ATTR_DIRECTORY;
    dotdot.set_first_cluster(recorded_parent);
    dotdot.set_timestamp(ts);

    let mut sector = [0u8; LBA_SIZE];
    sector[0..32].copy_from_slice(&dot.to_bytes());
    sector[32..64].copy_from_slice(&dotdot.to_bytes());

    block_io
        .write_blocks(Lba(ctx.cluster_to_lba(new_cluster)), &sector)
        .map_err(|_| Fat32Error::IoError)
}

/// Stream file content into an allocated cluster run, one LBA-sized chunk
/// per cluster. The final chunk may be short; its tail is zero-filled.
pub fn write_file_data<B: BlockIo, R: Read>(
    block_io: &mut B,
    ctx: &Fat32Context,
    run: &ClusterRun,
    reader: &mut R,
) -> Result<(), Fat32Error> {
    for i in 0..run.count {
        let mut chunk = [0u8; LBA_SIZE];
        fill_chunk(reader, &mut chunk).map_err(|_| Fat32Error::HostFileError)?;

        block_io
            .write_blocks(Lba(ctx.cluster_to_lba(run.first + i)), &chunk)
            .map_err(|_| Fat32Error::IoError)?;
    }
    Ok(())
}

/// Read until the buffer is full or the source is exhausted
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
