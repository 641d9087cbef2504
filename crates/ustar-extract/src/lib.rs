//! Extract USTAR archives onto the filesystem.
//!
//! Directories and regular files are recreated below a root directory.
//! Every other entry type is reported and passed over. The archive is read
//! one 512-byte block at a time and ends at the first block without a
//! USTAR signature.
//!
//! The same extraction runs in two modes: [`extract`] blocks the calling
//! thread and [`extract_async`] runs on tokio. Both drive a single
//! [`Extractor`] state machine, so they produce identical trees and
//! identical progress lines for the same archive.
//!
//! ```no_run
//! # fn main() -> ustar_extract::Result<()> {
//! let mut lines = Vec::new();
//! let summary = ustar_extract::extract("bundle.tar", Some(&mut lines))?;
//! for line in &lines {
//!     println!("{line}");
//! }
//! println!("{} files, {} bytes", summary.files, summary.bytes_written);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod block;
pub mod engine;
pub mod error;
mod extract;
pub mod fs;
pub mod options;
pub mod progress;

pub use ustar_header as header;
pub use ustar_header::{Block, EntryHeader, EntryType, HeaderError, BLOCK_SIZE};

pub use engine::{Action, Chunk, ExtractSummary, Extractor};
pub use error::{ExtractError, Result};
pub use extract::{
    extract, extract_async, extract_from, extract_from_async, extract_with, extract_with_async,
};
pub use fs::{AsyncFilesystem, Filesystem, HostFs, TokioFs};
pub use options::{ExtractOptions, UnknownEntryPolicy};
pub use progress::{LineWriter, LogSink, Progress};
