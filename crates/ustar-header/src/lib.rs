//! Zerocopy-based decoding of USTAR archive header blocks.
//!
//! Every USTAR archive is a sequence of 512-byte blocks. An entry starts
//! with one header block, followed by its content padded up to the next
//! block boundary. The archive ends at the first block that does not carry
//! a recognised signature, normally an all-zero block.
//!
//! This crate performs no I/O. It turns one [`Block`] into an
//! [`EntryHeader`] and decides whether a block is a header at all.
//!
//! # Header Field Layout
//!
//! | Offset | Size | Field     | Encoding                       |
//! |--------|------|-----------|--------------------------------|
//! | 0      | 100  | name      | NUL-padded bytes               |
//! | 100    | 8    | mode      | ASCII octal                    |
//! | 108    | 8    | uid       | ASCII octal                    |
//! | 116    | 8    | gid       | ASCII octal                    |
//! | 124    | 12   | size      | ASCII octal                    |
//! | 136    | 12   | mtime     | ASCII octal (Unix seconds)     |
//! | 148    | 8    | checksum  | raw                            |
//! | 156    | 1    | typeflag  | ASCII character                |
//! | 157    | 100  | linkname  | NUL-padded bytes               |
//! | 257    | 8    | magic     | `"ustar\0" "00"` or `"ustar  \0"` |
//! | 265    | 32   | uname     | NUL-padded bytes               |
//! | 297    | 32   | gname     | NUL-padded bytes               |
//! | 329    | 8    | devmajor  | raw                            |
//! | 337    | 8    | devminor  | raw                            |
//! | 345    | 155  | prefix    | NUL-padded bytes               |
//!
//! # Example
//!
//! ```
//! use ustar_header::{is_header, EntryHeader, EntryType, BLOCK_SIZE, POSIX_MAGIC};
//!
//! let mut block = [0u8; BLOCK_SIZE];
//! assert!(!is_header(&block)); // the archive terminator
//!
//! block[..5].copy_from_slice(b"hello");
//! block[124..136].copy_from_slice(b"00000000002\0");
//! block[156] = b'0';
//! block[257..265].copy_from_slice(POSIX_MAGIC);
//!
//! assert!(is_header(&block));
//! let header = EntryHeader::decode(&block).unwrap();
//! assert_eq!(header.entry_type(), EntryType::Regular);
//! assert_eq!(header.size, 2);
//! assert_eq!(header.content_blocks(), 1);
//! ```

use std::{
    ffi::OsStr,
    fmt,
    os::unix::ffi::OsStrExt,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of every archive block, headers and content alike.
pub const BLOCK_SIZE: usize = 512;

/// One block read from an archive stream.
pub type Block = [u8; BLOCK_SIZE];

/// Signature of a POSIX ustar header: `"ustar\0"` followed by version `"00"`.
pub const POSIX_MAGIC: &[u8; 8] = b"ustar\x0000";

/// Signature of a GNU tar header: `"ustar "` followed by `" \0"`.
pub const GNU_MAGIC: &[u8; 8] = b"ustar  \0";

/// Byte range of the signature within a header block.
const MAGIC_RANGE: std::ops::Range<usize> = 257..265;

/// Byte range of the checksum field within a header block.
const CHECKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// Errors that can occur when decoding a header block.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// A numeric field contains something other than octal digits and padding.
    #[error("invalid octal in {field} field: {bytes:?}")]
    InvalidOctal {
        /// Name of the offending field.
        field: &'static str,
        /// The raw field bytes.
        bytes: Vec<u8>,
    },

    /// The stored checksum does not match the header contents.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// The checksum value stored in the header.
        expected: u64,
        /// The checksum computed from the header bytes.
        computed: u64,
    },
}

/// Result type for header decoding.
pub type Result<T> = std::result::Result<T, HeaderError>;

/// Field-by-field view of a 512-byte header block.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawHeader {
    /// Entry name (NUL-padded).
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// Content size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time as Unix seconds in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name.
    pub linkname: [u8; 100],
    /// Format signature, including the version bytes.
    pub magic: [u8; 8],
    /// Owner user name.
    pub uname: [u8; 32],
    /// Owner group name.
    pub gname: [u8; 32],
    /// Device major number.
    pub devmajor: [u8; 8],
    /// Device minor number.
    pub devminor: [u8; 8],
    /// Path prefix, placed before `name`.
    pub prefix: [u8; 155],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 12],
}

impl RawHeader {
    /// View a block as a header.
    #[must_use]
    pub fn from_block(block: &Block) -> &RawHeader {
        zerocopy::transmute_ref!(block)
    }
}

impl fmt::Debug for RawHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHeader")
            .field("name", &String::from_utf8_lossy(&strip_nul(&self.name)))
            .field("typeflag", &self.typeflag)
            .field("magic", &self.magic)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Signature
// ============================================================================

/// Which of the accepted signatures a header block carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    /// POSIX ustar (`"ustar\0"` + `"00"`).
    Posix,
    /// GNU tar (`"ustar "` + `" \0"`).
    Gnu,
}

/// Identify the signature of a block.
///
/// Returns `None` for anything that is not byte-for-byte one of the two
/// accepted signatures, including the all-zero block that ends an archive.
#[must_use]
pub fn signature(block: &Block) -> Option<Signature> {
    match &block[MAGIC_RANGE] {
        magic if magic == POSIX_MAGIC => Some(Signature::Posix),
        magic if magic == GNU_MAGIC => Some(Signature::Gnu),
        _ => None,
    }
}

/// Returns true if the block is a genuine archive header.
///
/// A block for which this returns false marks the end of the archive.
#[must_use]
pub fn is_header(block: &Block) -> bool {
    signature(block).is_some()
}

// ============================================================================
// Entry Type
// ============================================================================

/// Kind of archive member, taken from the type flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (type '0' or NUL).
    Regular,
    /// Directory (type '5').
    Directory,
    /// Hard link (type '1').
    Link,
    /// Symbolic link (type '2').
    Symlink,
    /// Character device (type '3').
    Char,
    /// Block device (type '4').
    Block,
    /// FIFO (type '6').
    Fifo,
    /// Anything else, including vendor extension headers.
    Other(u8),
}

impl EntryType {
    /// Classify a raw type flag.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'1' => EntryType::Link,
            b'2' => EntryType::Symlink,
            b'3' => EntryType::Char,
            b'4' => EntryType::Block,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            other => EntryType::Other(other),
        }
    }

    /// Returns true if this is a regular file entry.
    #[must_use]
    pub fn is_file(self) -> bool {
        self == EntryType::Regular
    }

    /// Returns true if this is a directory entry.
    #[must_use]
    pub fn is_dir(self) -> bool {
        self == EntryType::Directory
    }
}

impl From<u8> for EntryType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Regular => f.write_str("regular file"),
            EntryType::Directory => f.write_str("directory"),
            EntryType::Link => f.write_str("hard link"),
            EntryType::Symlink => f.write_str("symbolic link"),
            EntryType::Char => f.write_str("character device"),
            EntryType::Block => f.write_str("block device"),
            EntryType::Fifo => f.write_str("fifo"),
            EntryType::Other(byte) => write!(f, "type {:?}", char::from(*byte)),
        }
    }
}

// ============================================================================
// Decoded Header
// ============================================================================

/// A decoded header block.
///
/// Text fields are kept as bytes with their NULs removed; nothing is
/// reinterpreted as UTF-8.
#[derive(Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Entry name.
    pub name: Vec<u8>,
    /// File mode.
    pub mode: u32,
    /// Owner user ID.
    pub uid: u64,
    /// Owner group ID.
    pub gid: u64,
    /// Content size in bytes.
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u64,
    /// Raw checksum field. Only checked by [`EntryHeader::verify_checksum`].
    pub checksum: [u8; 8],
    /// Raw type flag.
    pub type_flag: u8,
    /// Link target name.
    pub link_name: Vec<u8>,
    /// Owner user name.
    pub uname: Vec<u8>,
    /// Owner group name.
    pub gname: Vec<u8>,
    /// Raw device major field.
    pub dev_major: [u8; 8],
    /// Raw device minor field.
    pub dev_minor: [u8; 8],
    /// Path prefix.
    pub prefix: Vec<u8>,
}

impl EntryHeader {
    /// Decode a header block.
    ///
    /// This does not look at the signature; use [`is_header`] first to tell
    /// headers from the end-of-archive marker.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::InvalidOctal`] if any numeric field holds
    /// something other than octal digits and NUL/space padding.
    pub fn decode(block: &Block) -> Result<Self> {
        let raw = RawHeader::from_block(block);

        Ok(Self {
            name: strip_nul(&raw.name),
            mode: parse_field("mode", &raw.mode)? as u32,
            uid: parse_field("uid", &raw.uid)?,
            gid: parse_field("gid", &raw.gid)?,
            size: parse_field("size", &raw.size)?,
            mtime: parse_field("mtime", &raw.mtime)?,
            checksum: raw.checksum,
            type_flag: raw.typeflag,
            link_name: strip_nul(&raw.linkname),
            uname: strip_nul(&raw.uname),
            gname: strip_nul(&raw.gname),
            dev_major: raw.devmajor,
            dev_minor: raw.devminor,
            prefix: strip_nul(&raw.prefix),
        })
    }

    /// Get the entry type.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.type_flag)
    }

    /// The full output path: the prefix bytes immediately followed by the
    /// name bytes, with nothing inserted between them.
    #[must_use]
    pub fn effective_path_bytes(&self) -> Vec<u8> {
        [self.prefix.as_slice(), self.name.as_slice()].concat()
    }

    /// The full output path as a [`PathBuf`].
    #[must_use]
    pub fn effective_path(&self) -> PathBuf {
        PathBuf::from(OsStr::from_bytes(&self.effective_path_bytes()))
    }

    /// The output path with the prefix treated as a directory, the way
    /// POSIX writers split long paths: a `/` goes between a non-empty
    /// prefix and the name unless the prefix already ends with one.
    #[must_use]
    pub fn joined_path_bytes(&self) -> Vec<u8> {
        let mut path = Vec::with_capacity(self.prefix.len() + 1 + self.name.len());
        path.extend_from_slice(&self.prefix);
        if !path.is_empty() && !path.ends_with(b"/") {
            path.push(b'/');
        }
        path.extend_from_slice(&self.name);
        path
    }

    /// [`EntryHeader::joined_path_bytes`] as a [`PathBuf`].
    #[must_use]
    pub fn joined_path(&self) -> PathBuf {
        PathBuf::from(OsStr::from_bytes(&self.joined_path_bytes()))
    }

    /// Number of content blocks following the header.
    #[must_use]
    pub fn content_blocks(&self) -> u64 {
        self.size.div_ceil(BLOCK_SIZE as u64)
    }

    /// Content size rounded up to the block boundary.
    #[must_use]
    pub fn padded_size(&self) -> u64 {
        self.content_blocks() * BLOCK_SIZE as u64
    }

    /// Modification time, or `None` if it does not fit in a [`SystemTime`].
    #[must_use]
    pub fn modified_at(&self) -> Option<SystemTime> {
        UNIX_EPOCH.checked_add(Duration::from_secs(self.mtime))
    }

    /// Check the stored checksum against the block it was decoded from.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::ChecksumMismatch`] if the sums differ, or
    /// [`HeaderError::InvalidOctal`] if the stored checksum is not octal.
    pub fn verify_checksum(&self, block: &Block) -> Result<()> {
        let expected = parse_field("checksum", &self.checksum)?;
        let computed = compute_checksum(block);
        if expected == computed {
            Ok(())
        } else {
            Err(HeaderError::ChecksumMismatch { expected, computed })
        }
    }
}

impl fmt::Debug for EntryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryHeader")
            .field(
                "path",
                &String::from_utf8_lossy(&self.effective_path_bytes()),
            )
            .field("entry_type", &self.entry_type())
            .field("size", &self.size)
            .field("mode", &format!("{:04o}", self.mode))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_field(field: &'static str, bytes: &[u8]) -> Result<u64> {
    parse_octal(bytes).ok_or_else(|| HeaderError::InvalidOctal {
        field,
        bytes: bytes.to_vec(),
    })
}

/// Parse an octal ASCII field.
///
/// Leading spaces are skipped and the digits end at the first NUL or space.
/// Everything after that must be padding. An empty field is zero.
///
/// - `"0000644\0"` -> 420
/// - `"     123 "` -> 83
///
/// Returns `None` for any other byte, or if the value overflows a `u64`.
#[must_use]
pub fn parse_octal(bytes: &[u8]) -> Option<u64> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);

    if bytes[end..].iter().any(|&b| b != b' ' && b != b'\0') {
        return None;
    }

    bytes[start..end].iter().try_fold(0u64, |value, &byte| {
        if !(b'0'..=b'7').contains(&byte) {
            return None;
        }
        value.checked_mul(8)?.checked_add(u64::from(byte - b'0'))
    })
}

/// Remove every NUL byte from a text field, keeping all other bytes.
///
/// ```
/// use ustar_header::strip_nul;
///
/// assert_eq!(strip_nul(b"hello\0\0\0"), b"hello");
/// assert_eq!(strip_nul(b"a\0b\0"), b"ab");
/// ```
#[must_use]
pub fn strip_nul(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|&b| b != 0).collect()
}

/// Compute the header checksum of a block.
///
/// This is the unsigned sum of all header bytes, with the checksum field
/// itself counted as spaces.
#[must_use]
pub fn compute_checksum(block: &Block) -> u64 {
    block
        .iter()
        .enumerate()
        .map(|(i, &byte)| {
            if CHECKSUM_RANGE.contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(byte)
            }
        })
        .sum()
}
