//! Path Inserter
//!
//! Walks a slash-separated absolute path one segment at a time, searching
//! each directory with the name codec and materializing missing segments
//! with the cluster allocator and directory writer. A segment followed by
//! '/' is a directory; the final segment is the file. Each call re-reads
//! the VBR and FSInfo from the image, so successive calls always observe
//! the latest allocation cursor.

use crate::allocator::ClusterAllocator;
use crate::context::Fat32Context;
use crate::dir;
use crate::error::Fat32Error;
use crate::geometry::EspGeometry;
use crate::types::EntryKind;
use gpt_disk_io::BlockIo;
use log::{error, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Where the terminal file's bytes come from
enum Content<'a> {
    Data(&'a [u8]),
    Host(&'a Path),
}

enum ContentReader<'a> {
    Data(&'a [u8]),
    Host(File),
}

impl Read for ContentReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ContentReader::Data(slice) => slice.read(buf),
            ContentReader::Host(file) => file.read(buf),
        }
    }
}

impl<'a> Content<'a> {
    /// Open the content and report its size. For host files this is the
    /// point where a missing or unreadable file aborts the insertion.
    fn open(&self) -> Result<(ContentReader<'a>, u64), Fat32Error> {
        match *self {
            Content::Data(data) => Ok((ContentReader::Data(data), data.len() as u64)),
            Content::Host(path) => {
                let file = File::open(path).map_err(|err| {
                    error!("could not open host file '{}': {err}", path.display());
                    Fat32Error::HostFileError
                })?;
                let size = file
                    .metadata()
                    .map_err(|_| Fat32Error::HostFileError)?
                    .len();
                Ok((ContentReader::Host(file), size))
            }
        }
    }
}

/// Insert the host file at `path` into the volume, creating intermediate
/// directories as needed.
///
/// The path serves double duty: it is the file's location inside the
/// volume and the host path its content is read from. It must start with
/// '/' and contain no empty, "." or ".." segments. A terminal segment
/// that already exists is left untouched (this writer never overwrites).
///
/// Existence is checked with the 8.3 positional compare: a query like
/// "BOOTX64.EFI" does not match a stored "BOOTX64 EFI" field, so
/// re-inserting a dotted name appends a second entry instead of hitting
/// the already-present path. Use extensionless names where re-insertion
/// must be a no-op.
pub fn add_path<B: BlockIo>(
    block_io: &mut B,
    geom: &EspGeometry,
    path: &str,
) -> Result<(), Fat32Error> {
    insert_path(block_io, geom, path, Content::Host(Path::new(path)))
}

/// Insert in-memory content at `path` inside the volume.
///
/// Same walk as [`add_path`], with the terminal file's bytes supplied by
/// the caller instead of read from the host filesystem.
pub fn add_path_with_data<B: BlockIo>(
    block_io: &mut B,
    geom: &EspGeometry,
    path: &str,
    data: &[u8],
) -> Result<(), Fat32Error> {
    insert_path(block_io, geom, path, Content::Data(data))
}

fn insert_path<B: BlockIo>(
    block_io: &mut B,
    geom: &EspGeometry,
    path: &str,
    content: Content<'_>,
) -> Result<(), Fat32Error> {
    // Validate before touching the image at all. "." and ".." are
    // rejected outright: the seeded dot entries record the root parent as
    // cluster 0, which is not a navigable directory cluster.
    let rest = path.strip_prefix('/').ok_or(Fat32Error::MalformedPath)?;
    if rest.is_empty()
        || rest
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(Fat32Error::MalformedPath);
    }

    let ctx = Fat32Context::from_boot_sector(block_io, geom.start_lba)?;
    let mut allocator = ClusterAllocator::load(block_io, &ctx)?;
    let mut dir_cluster = ctx.root_cluster;

    let mut segments = rest.split('/').peekable();
    while let Some(segment) = segments.next() {
        let kind = if segments.peek().is_some() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        match dir::find_entry(block_io, &ctx, dir_cluster, segment)? {
            Some(entry) => match kind {
                EntryKind::Directory => {
                    if !entry.is_directory() {
                        return Err(Fat32Error::NotADirectory);
                    }
                    dir_cluster = entry.first_cluster();
                }
                EntryKind::File => {
                    // Overwriting is out of scope; the existing entry wins.
                    info!("'{path}' already present in ESP image, left untouched");
                    return Ok(());
                }
            },
            None => match kind {
                EntryKind::Directory => {
                    let run =
                        allocator.allocate(block_io, &ctx, EntryKind::Directory, 0)?;
                    allocator.commit(block_io, &ctx)?;
                    dir::insert_entry(
                        block_io,
                        &ctx,
                        dir_cluster,
                        segment,
                        EntryKind::Directory,
                        run.first,
                        0,
                        geom.timestamp,
                    )?;
                    dir::seed_dot_entries(block_io, &ctx, run.first, dir_cluster, geom.timestamp)?;
                    dir_cluster = run.first;
                }
                EntryKind::File => {
                    let (mut reader, size) = content.open()?;
                    let size_field = entry_size(size)?;
                    let run = allocator.allocate(block_io, &ctx, EntryKind::File, size)?;
                    allocator.commit(block_io, &ctx)?;
                    dir::insert_entry(
                        block_io,
                        &ctx,
                        dir_cluster,
                        segment,
                        EntryKind::File,
                        run.first,
                        size_field,
                        geom.timestamp,
                    )?;
                    dir::write_file_data(block_io, &ctx, &run, &mut reader)?;
                }
            },
        }
    }

    block_io.flush().map_err(|_| Fat32Error::IoError)?;
    info!("added '{path}' to ESP image");
    Ok(())
}

/// Directory entries hold a 32-bit size; FAT32 caps files at 4 GiB - 1.
fn entry_size(size: u64) -> Result<u32, Fat32Error> {
    u32::try_from(size).map_err(|_| Fat32Error::FileTooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size_at_the_fat32_limit() {
        assert_eq!(entry_size(0), Ok(0));
        assert_eq!(entry_size(u32::MAX as u64), Ok(u32::MAX));
        assert_eq!(entry_size(u32::MAX as u64 + 1), Err(Fat32Error::FileTooLarge));
    }
}
