//! Standalone FAT32 ESP Writer
//!
//! Emulates a FAT32 filesystem directly inside a pre-allocated region of
//! a raw disk image - no mounting, no filesystem driver. Offline image
//! builders use it to produce a bootable EFI System Partition holding a
//! small set of files (typically a bootloader) before the image is ever
//! booted.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      ESP Writer Structure                      │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐  │
//! │  │ Filename │   │  Format   │   │ Allocator │   │   Dir    │  │
//! │  │          │   │           │   │           │   │          │  │
//! │  │ 8.3 enc  │   │ VBR/FSInfo│   │ cursor +  │   │ entry    │  │
//! │  │ matching │   │ FAT seeds │   │ FAT chains│   │ scan/put │  │
//! │  └────┬─────┘   └─────┬─────┘   └─────┬─────┘   └────┬─────┘  │
//! │       │               │               │              │        │
//! │       └───────────────┴───────┬───────┴──────────────┘        │
//! │                               │                               │
//! │                        ┌──────┴──────┐                        │
//! │                        │   Insert    │  add_path walks the    │
//! │                        │ (path walk) │  path, creating what   │
//! │                        └─────────────┘  is missing            │
//! │                                                               │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All disk access goes through `gpt_disk_io::BlockIo`, so the same code
//! drives a real image file (`BlockIoAdapter<std::fs::File>`) and an
//! in-memory buffer (`BlockIoAdapter<&mut [u8]>`) in tests.
//!
//! # Usage
//!
//! ```ignore
//! use espfat::{add_path, write_empty_fat32_esp, EspGeometry};
//! use gpt_disk_io::BlockIoAdapter;
//! use gpt_disk_types::BlockSize;
//!
//! let file = std::fs::OpenOptions::new()
//!     .read(true)
//!     .write(true)
//!     .open("disk.img")?;
//! let mut block_io = BlockIoAdapter::new(file, BlockSize::BS_512);
//!
//! // Placement computed by the partitioning stage
//! let geom = EspGeometry::new(2048, 262144, 1008);
//!
//! write_empty_fat32_esp(&mut block_io, &geom)?;
//! add_path(&mut block_io, &geom, "/EFI/BOOT/BOOTX64.EFI")?;
//! ```
//!
//! # Invariants and limits
//!
//! The writer is append-only and single-threaded: clusters are allocated
//! as contiguous runs at a monotonic cursor and nothing is ever freed,
//! renamed, or overwritten. Directories occupy exactly one cluster (16
//! entries); long (VFAT) names are not produced - names truncate to 8.3
//! silently.

mod allocator;
mod context;
mod dir;
mod error;
mod filename;
mod format;
mod geometry;
mod insert;
mod types;
mod verify;

pub use allocator::{ClusterAllocator, ClusterRun};
pub use context::Fat32Context;
pub use error::Fat32Error;
pub use filename::{format_name, name_matches};
pub use format::write_empty_fat32_esp;
pub use geometry::{
    EspGeometry, BOOT_CLUSTER, EFI_CLUSTER, ENTRIES_PER_CLUSTER, FAT_EOC, FIRST_CONTENT_CLUSTER,
    LBA_SIZE, ROOT_CLUSTER,
};
pub use insert::{add_path, add_path_with_data};
pub use types::{DirEntry, EntryKind, FatTimestamp};
pub use verify::verify_esp;
