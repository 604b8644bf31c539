//! Cluster Allocator
//!
//! Owns the FSInfo "next free cluster" cursor for the duration of one
//! top-level operation. Allocation is a contiguous run starting at the
//! cursor: this writer only ever appends and never frees a cluster, so a
//! free-list walk is unnecessary by construction. The chain plan for a
//! run is computed once and applied unchanged to every FAT copy, which
//! keeps the copies byte-identical.

use crate::context::Fat32Context;
use crate::error::Fat32Error;
use crate::geometry::{FAT_EOC, LBA_SIZE};
use crate::types::EntryKind;
use gpt_disk_io::BlockIo;

/// A contiguous run of newly-allocated clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterRun {
    pub first: u32,
    pub count: u32,
}

impl ClusterRun {
    pub const fn last(&self) -> u32 {
        self.first + self.count - 1
    }
}

/// Number of clusters a new entry of `kind` and `byte_len` bytes occupies.
///
/// Directories always take exactly one cluster. A zero-byte file also
/// takes one cluster, marked end-of-chain immediately; FAT32 has no way
/// to express a file with no first cluster that tools agree on, and the
/// single-cluster form keeps the directory entry well-formed.
fn run_length(kind: EntryKind, byte_len: u64) -> u32 {
    match kind {
        EntryKind::Directory => 1,
        EntryKind::File => (byte_len.div_ceil(LBA_SIZE as u64).max(1)) as u32,
    }
}

/// Exclusive owner of the allocation cursor during one operation.
///
/// Load it at the start of a call, allocate as needed, and `commit` after
/// every allocation so a crash mid-build still leaves a usable cursor on
/// disk (best effort; there is no journal).
pub struct ClusterAllocator {
    next_free: u32,
}

impl ClusterAllocator {
    /// Read the cursor from the volume's FSInfo sector
    pub fn load<B: BlockIo>(
        block_io: &mut B,
        ctx: &Fat32Context,
    ) -> Result<Self, Fat32Error> {
        let next_free = ctx.read_next_free(block_io)?;
        Ok(Self { next_free })
    }

    /// Current cursor value (the cluster the next allocation will start at)
    pub const fn next_free(&self) -> u32 {
        self.next_free
    }

    /// Allocate a contiguous cluster run and link it into every FAT copy.
    ///
    /// Each cluster in the run points at its successor; the last is marked
    /// end-of-chain. The cursor advances by the run length in memory only -
    /// call [`commit`](Self::commit) to persist it.
    pub fn allocate<B: BlockIo>(
        &mut self,
        block_io: &mut B,
        ctx: &Fat32Context,
        kind: EntryKind,
        byte_len: u64,
    ) -> Result<ClusterRun, Fat32Error> {
        let count = run_length(kind, byte_len);
        let run = ClusterRun {
            first: self.next_free,
            count,
        };

        for i in 0..count {
            let cluster = run.first + i;
            let value = if i + 1 < count { cluster + 1 } else { FAT_EOC };
            ctx.write_fat_entry(block_io, cluster, value)?;
        }

        self.next_free += count;
        Ok(run)
    }

    /// Persist the advanced cursor into FSInfo
    pub fn commit<B: BlockIo>(
        &self,
        block_io: &mut B,
        ctx: &Fat32Context,
    ) -> Result<(), Fat32Error> {
        ctx.write_next_free(block_io, self.next_free)
    }
}
