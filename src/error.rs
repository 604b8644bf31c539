//! ESP writer error types
//!
//! Flat error enum for all FAT32 write operations. There is no rollback:
//! an error aborts the current top-level operation and the image may be
//! left with committed allocations for the segments already materialized.

/// Errors that can occur while initializing or populating the ESP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fat32Error {
    /// Block I/O operation against the image failed
    IoError,
    /// Path did not start with '/' or contained an empty segment
    MalformedPath,
    /// A non-terminal path segment resolved to a file entry
    NotADirectory,
    /// Directory already holds its maximum of 16 entries
    DirectoryFull,
    /// Host-side file could not be opened or read
    HostFileError,
    /// Content exceeds the 4 GiB - 1 FAT32 file size limit
    FileTooLarge,
    /// FSInfo sector signatures or cursor failed validation
    InvalidFsInfo,
    /// On-disk structures do not match what the initializer lays down
    CorruptVolume,
}

impl Fat32Error {
    /// Get a human-readable description of the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IoError => "Block I/O operation failed",
            Self::MalformedPath => "Path must be absolute with non-empty segments",
            Self::NotADirectory => "Path segment is a file, not a directory",
            Self::DirectoryFull => "Directory cluster is full",
            Self::HostFileError => "Host file could not be opened or read",
            Self::FileTooLarge => "File exceeds the FAT32 size limit",
            Self::InvalidFsInfo => "FSInfo sector failed validation",
            Self::CorruptVolume => "On-disk FAT32 structures are inconsistent",
        }
    }
}

impl core::fmt::Display for Fat32Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for Fat32Error {}
