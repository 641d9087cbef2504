//! Error types for archive extraction.
//!
//! Every failure aborts the whole extraction. Reaching the end-of-archive
//! marker is not an error and never shows up here.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use ustar_header::{HeaderError, BLOCK_SIZE};

/// Errors that can occur while extracting an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive does not exist. Nothing was read or written.
    #[error("archive not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The stream ended in the middle of a block.
    #[error("truncated archive: expected {BLOCK_SIZE} bytes at offset {position}, got {read}")]
    TruncatedStream {
        /// Offset of the block that could not be read in full.
        position: u64,
        /// Number of bytes that were available.
        read: usize,
    },

    /// A header block carries a signature but its fields cannot be decoded.
    #[error("malformed header at offset {position}: {source}")]
    MalformedHeader {
        /// Offset of the header block.
        position: u64,
        /// What was wrong with it.
        #[source]
        source: HeaderError,
    },

    /// Creating a directory or writing a file failed.
    #[error("failed to extract {}: {source}", path.display())]
    Filesystem {
        /// The entry path the operation was applied to.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading the archive stream failed.
    #[error("I/O error reading archive: {0}")]
    Io(#[from] io::Error),
}

impl ExtractError {
    pub(crate) fn filesystem(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Filesystem {
            path: path.to_owned(),
            source,
        }
    }
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
