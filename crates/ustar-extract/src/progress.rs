//! Progress events and the line-oriented log sink they are written to.

use std::{fmt, io::Write, path::PathBuf};

use ustar_header::EntryType;

/// High-level progress of an extraction.
///
/// For every entry the path announcement ([`Progress::Entry`]) comes first,
/// followed by one detail event. Regular files get a completion event once
/// the file has been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// A header was accepted for this path.
    Entry {
        /// Effective path of the entry.
        path: PathBuf,
    },

    /// A directory entry was applied.
    Directory {
        /// Effective path of the entry.
        path: PathBuf,
    },

    /// A regular file is about to be written.
    FileStarted {
        /// Effective path of the entry.
        path: PathBuf,
        /// Content size from the header.
        size: u64,
    },

    /// A regular file has been written and closed.
    FileWritten {
        /// Effective path of the entry.
        path: PathBuf,
        /// Number of bytes written.
        size: u64,
    },

    /// An entry that is neither a file nor a directory was passed over.
    Unknown {
        /// Effective path of the entry.
        path: PathBuf,
        /// The entry's type.
        entry_type: EntryType,
        /// Number of content blocks read and discarded.
        skipped_blocks: u64,
    },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Entry { path } => write!(f, "extracting {}", path.display()),
            Progress::Directory { path } => write!(f, "created directory {}", path.display()),
            Progress::FileStarted { size, .. } => write!(f, "regular file, {size} bytes"),
            Progress::FileWritten { path, size } => {
                write!(f, "wrote {size} bytes to {}", path.display())
            }
            Progress::Unknown {
                entry_type,
                skipped_blocks,
                ..
            } => write!(
                f,
                "{entry_type} not extracted, skipped {skipped_blocks} content blocks"
            ),
        }
    }
}

/// A line-oriented destination for progress messages.
///
/// Sinks only observe: a failing sink is reported through [`log`] and the
/// extraction carries on.
pub trait LogSink: Send {
    /// Record one line of progress, without a trailing newline.
    fn log_line(&mut self, line: &str) -> std::io::Result<()>;
}

impl LogSink for Vec<String> {
    fn log_line(&mut self, line: &str) -> std::io::Result<()> {
        self.push(line.to_owned());
        Ok(())
    }
}

/// Writes each progress line, newline-terminated, to an [`std::io::Write`].
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
}

impl<W: Write + Send> LineWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> LogSink for LineWriter<W> {
    fn log_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.inner, "{line}")
    }
}

/// Forwards progress events to the `log` facade and the optional sink.
pub(crate) struct Reporter<'a> {
    sink: Option<&'a mut dyn LogSink>,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(sink: Option<&'a mut dyn LogSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn report(&mut self, event: &Progress) {
        log::debug!("{event}");
        if let Some(sink) = self.sink.as_deref_mut() {
            if let Err(e) = sink.log_line(&event.to_string()) {
                log::warn!("failed to write progress line: {e}");
            }
        }
    }
}
