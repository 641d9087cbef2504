//! Configuration for archive extraction.

use std::path::PathBuf;

/// What to do with the content blocks of entries that are neither regular
/// files nor directories (links, devices, extension headers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownEntryPolicy {
    /// Read and discard the entry's content blocks so the next header is
    /// found where it belongs.
    #[default]
    SkipContent,

    /// Leave the content in the stream and read the next block as a header.
    ///
    /// Any such entry with a non-zero size misaligns the rest of the
    /// archive. Extraction then normally stops early at the first content
    /// block that does not look like a header.
    LeaveContent,
}

/// Options controlling an extraction.
///
/// # Example
///
/// ```
/// use ustar_extract::{ExtractOptions, UnknownEntryPolicy};
///
/// // Use defaults
/// let options = ExtractOptions::default();
///
/// // Customize
/// let options = ExtractOptions {
///     verify_checksums: true,
///     ..ExtractOptions::default()
/// }
/// .with_root("/tmp/out");
/// assert_eq!(options.unknown_entries, UnknownEntryPolicy::SkipContent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Directory that entry paths are resolved against.
    ///
    /// Paths are used verbatim: absolute entry paths ignore the root and
    /// `..` components are not filtered.
    ///
    /// Default: `"."`.
    pub root: PathBuf,

    /// Handling of entries that are neither files nor directories.
    ///
    /// Default: [`UnknownEntryPolicy::SkipContent`].
    pub unknown_entries: UnknownEntryPolicy,

    /// Reject headers whose stored checksum does not match their contents.
    ///
    /// Default: `false`.
    pub verify_checksums: bool,

    /// Treat a non-empty prefix field as a directory and put a `/` between
    /// it and the name when the prefix does not end with one.
    ///
    /// Off, the prefix and name are concatenated byte for byte.
    ///
    /// Default: `false`.
    pub join_prefix: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            unknown_entries: UnknownEntryPolicy::SkipContent,
            verify_checksums: false,
            join_prefix: false,
        }
    }
}

impl ExtractOptions {
    /// Create a new `ExtractOptions` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that mirror the classic extractor exactly: content of
    /// unknown entries stays in the stream and checksums are ignored.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            unknown_entries: UnknownEntryPolicy::LeaveContent,
            ..Self::default()
        }
    }

    /// Options for untrusted input: unknown content is skipped and every
    /// header checksum is verified.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            unknown_entries: UnknownEntryPolicy::SkipContent,
            verify_checksums: true,
            ..Self::default()
        }
    }

    /// Set the directory that entry paths are resolved against.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}
