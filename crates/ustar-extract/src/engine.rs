//! The extraction state machine.
//!
//! [`Extractor`] holds the whole extraction algorithm and performs no I/O.
//! A driver asks it for the next [`Action`], carries the action out, and
//! hands over a block whenever [`Action::ReadBlock`] is requested. The
//! blocking and async drivers in this crate differ only in how they carry
//! out actions, so both see the same actions in the same order.
//!
//! # Example
//!
//! ```
//! use ustar_extract::{Action, ExtractOptions, Extractor, BLOCK_SIZE};
//!
//! let mut extractor = Extractor::new(&ExtractOptions::default());
//! assert!(matches!(extractor.next_action().unwrap(), Action::ReadBlock));
//!
//! // an all-zero block ends the archive
//! extractor.feed([0u8; BLOCK_SIZE]);
//! assert!(matches!(extractor.next_action().unwrap(), Action::Finished));
//! assert_eq!(extractor.summary().position, BLOCK_SIZE as u64);
//! ```

use std::{collections::VecDeque, path::PathBuf};

use ustar_header::{is_header, Block, EntryHeader, EntryType, BLOCK_SIZE};

use crate::{
    error::{ExtractError, Result},
    options::{ExtractOptions, UnknownEntryPolicy},
    progress::Progress,
};

/// Content bytes to append to the file that is currently open.
///
/// A chunk owns the block it was read from. Only the first
/// [`Chunk::len`] bytes are content; the rest is block padding.
#[derive(Clone)]
pub struct Chunk {
    block: Block,
    len: usize,
}

impl Chunk {
    /// The content bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.block[..self.len]
    }

    /// Number of content bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the chunk carries no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk").field("len", &self.len).finish()
    }
}

/// The next thing a driver must do.
#[derive(Debug)]
pub enum Action {
    /// Read the next block from the archive and pass it to
    /// [`Extractor::feed`].
    ReadBlock,
    /// Create a directory, with any missing ancestors.
    CreateDir(PathBuf),
    /// Create or truncate a file and keep it open for writing.
    CreateFile(PathBuf),
    /// Append to the open file.
    Write(Chunk),
    /// Close the open file.
    CloseFile,
    /// Pass an event to the progress sink.
    Report(Progress),
    /// The end of the archive was reached.
    Finished,
}

/// Counters describing a completed (or in-progress) extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Directory entries applied.
    pub directories: u64,
    /// Regular files written.
    pub files: u64,
    /// Entries of any other type passed over.
    pub unknown: u64,
    /// Content bytes written to files.
    pub bytes_written: u64,
    /// Bytes consumed from the archive stream, including the terminator.
    pub position: u64,
}

#[derive(Debug)]
enum State {
    AwaitHeader,
    FileContent {
        path: PathBuf,
        size: u64,
        remaining: u64,
    },
    SkipContent {
        blocks: u64,
    },
    Finished,
}

/// Sans-I/O archive extractor.
///
/// See the [module documentation](self) for how it is driven.
#[derive(Debug)]
pub struct Extractor {
    unknown_entries: UnknownEntryPolicy,
    verify_checksums: bool,
    join_prefix: bool,
    state: State,
    input: Option<Block>,
    pending: VecDeque<Action>,
    position: u64,
    summary: ExtractSummary,
}

impl Extractor {
    /// Create an extractor positioned before the first header.
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            unknown_entries: options.unknown_entries,
            verify_checksums: options.verify_checksums,
            join_prefix: options.join_prefix,
            state: State::AwaitHeader,
            input: None,
            pending: VecDeque::new(),
            position: 0,
            summary: ExtractSummary::default(),
        }
    }

    /// Offset of the next block to be read.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Counters so far.
    #[must_use]
    pub fn summary(&self) -> ExtractSummary {
        ExtractSummary {
            position: self.position,
            ..self.summary
        }
    }

    /// Hand over the block requested by [`Action::ReadBlock`].
    ///
    /// # Panics
    ///
    /// Panics if the previous block has not been consumed yet, that is if
    /// `feed` is called twice without [`Extractor::next_action`] asking for
    /// another block in between.
    pub fn feed(&mut self, block: Block) {
        assert!(
            self.input.is_none(),
            "block fed at offset {} before the previous one was consumed",
            self.position
        );
        self.position += BLOCK_SIZE as u64;
        self.input = Some(block);
    }

    /// Decide what happens next.
    ///
    /// Once [`Action::Finished`] has been returned it is returned forever.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MalformedHeader`] for a header that carries a
    /// valid signature but cannot be decoded, or fails checksum verification
    /// when that is enabled.
    pub fn next_action(&mut self) -> Result<Action> {
        loop {
            if let Some(action) = self.pending.pop_front() {
                return Ok(action);
            }

            match &mut self.state {
                State::Finished => return Ok(Action::Finished),

                State::AwaitHeader => match self.input.take() {
                    Some(block) => self.start_entry(&block)?,
                    None => return Ok(Action::ReadBlock),
                },

                State::FileContent {
                    path,
                    size,
                    remaining: 0,
                } => {
                    let path = std::mem::take(path);
                    let size = *size;
                    self.state = State::AwaitHeader;
                    self.summary.files += 1;
                    self.summary.bytes_written += size;
                    self.pending
                        .push_back(Action::Report(Progress::FileWritten { path, size }));
                    return Ok(Action::CloseFile);
                }

                State::FileContent { remaining, .. } => match self.input.take() {
                    Some(block) => {
                        let len = (*remaining).min(BLOCK_SIZE as u64) as usize;
                        *remaining -= len as u64;
                        return Ok(Action::Write(Chunk { block, len }));
                    }
                    None => return Ok(Action::ReadBlock),
                },

                State::SkipContent { blocks: 0 } => self.state = State::AwaitHeader,

                State::SkipContent { blocks } => match self.input.take() {
                    Some(_) => *blocks -= 1,
                    None => return Ok(Action::ReadBlock),
                },
            }
        }
    }

    fn start_entry(&mut self, block: &Block) -> Result<()> {
        let offset = self.position - BLOCK_SIZE as u64;

        if !is_header(block) {
            log::debug!("end of archive at offset {offset}");
            self.state = State::Finished;
            return Ok(());
        }

        let malformed = |source| ExtractError::MalformedHeader {
            position: offset,
            source,
        };
        let header = EntryHeader::decode(block).map_err(malformed)?;
        if self.verify_checksums {
            header.verify_checksum(block).map_err(malformed)?;
        }
        log::debug!("{header:?} at offset {offset}");

        let path = if self.join_prefix {
            header.joined_path()
        } else {
            header.effective_path()
        };
        self.pending
            .push_back(Action::Report(Progress::Entry { path: path.clone() }));

        match header.entry_type() {
            EntryType::Directory => {
                self.summary.directories += 1;
                self.pending.push_back(Action::CreateDir(path.clone()));
                self.pending
                    .push_back(Action::Report(Progress::Directory { path }));
            }
            EntryType::Regular => {
                let size = header.size;
                self.pending.push_back(Action::Report(Progress::FileStarted {
                    path: path.clone(),
                    size,
                }));
                self.pending.push_back(Action::CreateFile(path.clone()));
                self.state = State::FileContent {
                    path,
                    size,
                    remaining: size,
                };
            }
            entry_type => {
                let skipped_blocks = match self.unknown_entries {
                    UnknownEntryPolicy::SkipContent => header.content_blocks(),
                    UnknownEntryPolicy::LeaveContent => 0,
                };
                self.summary.unknown += 1;
                self.pending.push_back(Action::Report(Progress::Unknown {
                    path,
                    entry_type,
                    skipped_blocks,
                }));
                self.state = State::SkipContent {
                    blocks: skipped_blocks,
                };
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use ustar_header::{compute_checksum, HeaderError, POSIX_MAGIC};

    use super::*;

    fn header(name: &str, type_flag: u8, size: u64) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[100..108].copy_from_slice(b"0000644\0");
        block[124..136].copy_from_slice(format!("{size:011o}\0").as_bytes());
        block[156] = type_flag;
        block[257..265].copy_from_slice(POSIX_MAGIC);
        let checksum = compute_checksum(&block);
        block[148..156].copy_from_slice(format!("{checksum:06o}\0 ").as_bytes());
        block
    }

    fn content(data: &[u8]) -> Vec<Block> {
        data.chunks(BLOCK_SIZE)
            .map(|chunk| {
                let mut block = [0u8; BLOCK_SIZE];
                block[..chunk.len()].copy_from_slice(chunk);
                block
            })
            .collect()
    }

    /// Drive an extractor over `blocks`, recording what it asks for.
    fn trace(blocks: &[Block], options: &ExtractOptions) -> (Vec<String>, Extractor) {
        let mut extractor = Extractor::new(options);
        let mut blocks = blocks.iter();
        let mut trace = Vec::new();

        loop {
            match extractor.next_action().unwrap() {
                Action::ReadBlock => {
                    extractor.feed(*blocks.next().expect("extractor read past the archive"))
                }
                Action::CreateDir(path) => trace.push(format!("mkdir {}", path.display())),
                Action::CreateFile(path) => trace.push(format!("create {}", path.display())),
                Action::Write(chunk) => trace.push(format!(
                    "write {:?}",
                    String::from_utf8_lossy(chunk.as_bytes())
                )),
                Action::CloseFile => trace.push("close".into()),
                Action::Report(event) => trace.push(format!("> {event}")),
                Action::Finished => break,
            }
        }

        assert!(blocks.next().is_none(), "extractor stopped early");
        (trace, extractor)
    }

    #[test]
    fn test_directory_and_file() {
        let mut blocks = vec![header("out/", b'5', 0), header("out/hello.txt", b'0', 2)];
        blocks.extend(content(b"hi"));
        blocks.push([0u8; BLOCK_SIZE]);

        let (trace, extractor) = trace(&blocks, &ExtractOptions::default());
        assert_eq!(
            trace,
            [
                "> extracting out/",
                "mkdir out/",
                "> created directory out/",
                "> extracting out/hello.txt",
                "> regular file, 2 bytes",
                "create out/hello.txt",
                "write \"hi\"",
                "close",
                "> wrote 2 bytes to out/hello.txt",
            ]
        );
        assert_eq!(
            extractor.summary(),
            ExtractSummary {
                directories: 1,
                files: 1,
                unknown: 0,
                bytes_written: 2,
                position: 4 * BLOCK_SIZE as u64,
            }
        );
    }

    #[test]
    fn test_file_spanning_blocks() {
        let data: Vec<u8> = (0..1100).map(|i| b'a' + (i % 26) as u8).collect();
        let mut blocks = vec![header("big", b'0', data.len() as u64)];
        blocks.extend(content(&data));
        blocks.push([0u8; BLOCK_SIZE]);

        let mut extractor = Extractor::new(&ExtractOptions::default());
        let mut fed = blocks.iter();
        let mut written = Vec::new();
        let mut writes = 0;
        loop {
            match extractor.next_action().unwrap() {
                Action::ReadBlock => extractor.feed(*fed.next().unwrap()),
                Action::Write(chunk) => {
                    writes += 1;
                    written.extend_from_slice(chunk.as_bytes());
                }
                Action::Finished => break,
                _ => {}
            }
        }

        assert_eq!(writes, 3);
        assert_eq!(written, data);
        assert_eq!(extractor.summary().position, 5 * BLOCK_SIZE as u64);
    }

    #[test]
    fn test_exact_block_multiple_has_no_padding_block() {
        let data = [b'x'; BLOCK_SIZE];
        let mut blocks = vec![header("one", b'0', BLOCK_SIZE as u64)];
        blocks.extend(content(&data));
        blocks.push([0u8; BLOCK_SIZE]);

        let (_, extractor) = trace(&blocks, &ExtractOptions::default());
        assert_eq!(extractor.summary().position, 3 * BLOCK_SIZE as u64);
    }

    #[test]
    fn test_empty_file_reads_no_content() {
        let blocks = [header("empty", b'0', 0), [0u8; BLOCK_SIZE]];
        let (trace, extractor) = trace(&blocks, &ExtractOptions::default());
        assert_eq!(
            trace,
            [
                "> extracting empty",
                "> regular file, 0 bytes",
                "create empty",
                "close",
                "> wrote 0 bytes to empty",
            ]
        );
        assert_eq!(extractor.summary().position, 2 * BLOCK_SIZE as u64);
    }

    #[test]
    fn test_old_style_regular_type() {
        let blocks = [header("nul", b'\0', 0), [0u8; BLOCK_SIZE]];
        let (trace, _) = trace(&blocks, &ExtractOptions::default());
        assert!(trace.contains(&"create nul".to_string()));
    }

    #[test]
    fn test_unknown_entry_content_is_skipped() {
        let mut blocks = vec![header("weird", b'7', 600)];
        blocks.extend(content(&[b'z'; 600]));
        blocks.push(header("after", b'0', 0));
        blocks.push([0u8; BLOCK_SIZE]);

        let (trace, extractor) = trace(&blocks, &ExtractOptions::default());
        assert_eq!(
            trace,
            [
                "> extracting weird",
                "> type '7' not extracted, skipped 2 content blocks",
                "> extracting after",
                "> regular file, 0 bytes",
                "create after",
                "close",
                "> wrote 0 bytes to after",
            ]
        );
        assert_eq!(extractor.summary().unknown, 1);
        assert_eq!(extractor.summary().files, 1);
    }

    #[test]
    fn test_unknown_entry_content_left_in_stream() {
        // The first content block is read as a header. It has no signature,
        // so the archive ends there.
        let mut blocks = vec![header("weird", b'7', 600)];
        blocks.extend(content(&[b'z'; 600]).into_iter().take(1));

        let (trace, extractor) = trace(&blocks, &ExtractOptions::reference());
        assert_eq!(
            trace,
            [
                "> extracting weird",
                "> type '7' not extracted, skipped 0 content blocks",
            ]
        );
        assert_eq!(extractor.summary().position, 2 * BLOCK_SIZE as u64);
    }

    #[test]
    fn test_non_header_block_ends_archive() {
        let mut garbage = [0xffu8; BLOCK_SIZE];
        garbage[124..136].copy_from_slice(b"not octal!!!");
        let (trace, extractor) = trace(&[garbage], &ExtractOptions::default());
        assert!(trace.is_empty());
        assert_eq!(extractor.summary(), ExtractSummary {
            position: BLOCK_SIZE as u64,
            ..ExtractSummary::default()
        });
    }

    #[test]
    fn test_finished_is_sticky() {
        let mut extractor = Extractor::new(&ExtractOptions::default());
        assert!(matches!(extractor.next_action().unwrap(), Action::ReadBlock));
        extractor.feed([0u8; BLOCK_SIZE]);
        for _ in 0..3 {
            assert!(matches!(extractor.next_action().unwrap(), Action::Finished));
        }
    }

    #[test]
    fn test_malformed_header() {
        let mut block = header("bad", b'0', 0);
        block[124..136].copy_from_slice(b"00000000009\0");

        let mut extractor = Extractor::new(&ExtractOptions::default());
        assert!(matches!(extractor.next_action().unwrap(), Action::ReadBlock));
        extractor.feed(header("ok/", b'5', 0));
        while !matches!(extractor.next_action().unwrap(), Action::ReadBlock) {}
        extractor.feed(block);

        match extractor.next_action() {
            Err(ExtractError::MalformedHeader {
                position,
                source: HeaderError::InvalidOctal { field, .. },
            }) => {
                assert_eq!(position, BLOCK_SIZE as u64);
                assert_eq!(field, "size");
            }
            other => panic!("expected MalformedHeader, got {other:?}"),
        }
    }

    #[test]
    fn test_checksum_verification() {
        let mut block = header("file", b'0', 0);
        block[0] = b'F';

        // ignored by default
        let (trace, _) = trace(&[block, [0u8; BLOCK_SIZE]], &ExtractOptions::default());
        assert!(trace.contains(&"create File".to_string()));

        let mut extractor = Extractor::new(&ExtractOptions::strict());
        assert!(matches!(extractor.next_action().unwrap(), Action::ReadBlock));
        extractor.feed(block);
        assert!(matches!(
            extractor.next_action(),
            Err(ExtractError::MalformedHeader {
                position: 0,
                source: HeaderError::ChecksumMismatch { .. },
            })
        ));
    }

    #[test]
    fn test_prefix_forms_effective_path() {
        let mut block = header("c.txt", b'0', 0);
        block[345..349].copy_from_slice(b"a/b/");
        let (trace, _) = trace(&[block, [0u8; BLOCK_SIZE]], &ExtractOptions::default());
        assert!(trace.contains(&"create a/b/c.txt".to_string()));
    }

    #[test]
    #[should_panic(expected = "before the previous one was consumed")]
    fn test_feed_twice_panics() {
        let mut extractor = Extractor::new(&ExtractOptions::default());
        assert!(matches!(extractor.next_action().unwrap(), Action::ReadBlock));
        extractor.feed([0u8; BLOCK_SIZE]);
        extractor.feed([0u8; BLOCK_SIZE]);
    }

    #[test]
    fn test_prefix_is_concatenated_verbatim() {
        let mut block = header("c.txt", b'0', 0);
        block[345..348].copy_from_slice(b"a/b");
        let blocks = [block, [0u8; BLOCK_SIZE]];

        let (trace, _) = self::trace(&blocks, &ExtractOptions::default());
        assert!(trace.contains(&"create a/bc.txt".to_string()));

        let options = ExtractOptions {
            join_prefix: true,
            ..ExtractOptions::default()
        };
        let (trace, _) = self::trace(&blocks, &options);
        assert!(trace.contains(&"create a/b/c.txt".to_string()));
    }
}
