//! Reading whole blocks from an archive stream.
//!
//! Both readers fill a fresh [`Block`] per call, retrying short reads and
//! `EINTR` until the block is complete. Running out of input part-way,
//! including before the first byte, is [`ExtractError::TruncatedStream`].

use std::io::{ErrorKind, Read};

use tokio::io::{AsyncRead, AsyncReadExt};
use ustar_header::{Block, BLOCK_SIZE};

use crate::error::{ExtractError, Result};

/// Read the block starting at `position` from a blocking reader.
pub fn read_block(reader: &mut impl Read, position: u64) -> Result<Block> {
    let mut block = [0u8; BLOCK_SIZE];
    let mut filled = 0;

    while filled < BLOCK_SIZE {
        match reader.read(&mut block[filled..]) {
            Ok(0) => {
                return Err(ExtractError::TruncatedStream {
                    position,
                    read: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    log::trace!("read block at offset {position}");
    Ok(block)
}

/// Read the block starting at `position` from an async reader.
///
/// This is the async version of [`read_block`].
pub async fn read_block_async(
    reader: &mut (impl AsyncRead + Unpin),
    position: u64,
) -> Result<Block> {
    let mut block = [0u8; BLOCK_SIZE];
    let mut filled = 0;

    while filled < BLOCK_SIZE {
        match reader.read(&mut block[filled..]).await {
            Ok(0) => {
                return Err(ExtractError::TruncatedStream {
                    position,
                    read: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    log::trace!("read block at offset {position}");
    Ok(block)
}

#[cfg(test)]
mod tests {
    use std::io::Error;

    use similar_asserts::assert_eq;

    use super::*;

    fn two_and_a_half_blocks() -> Vec<u8> {
        (0..BLOCK_SIZE * 5 / 2).map(|i| (i % 251) as u8).collect()
    }

    fn read_block_common(read: fn(&mut &[u8], u64) -> Result<Block>) {
        let data = two_and_a_half_blocks();
        let mut r = data.as_slice();

        let first = read(&mut r, 0).unwrap();
        assert_eq!(&first[..], &data[..BLOCK_SIZE]);
        let second = read(&mut r, 512).unwrap();
        assert_eq!(&second[..], &data[BLOCK_SIZE..2 * BLOCK_SIZE]);

        match read(&mut r, 1024) {
            Err(ExtractError::TruncatedStream { position, read }) => {
                assert_eq!(position, 1024);
                assert_eq!(read, BLOCK_SIZE / 2);
            }
            other => panic!("expected TruncatedStream, got {other:?}"),
        }

        // an exhausted stream is truncated too
        let mut empty = b"" as &[u8];
        assert!(matches!(
            read(&mut empty, 1536),
            Err(ExtractError::TruncatedStream {
                position: 1536,
                read: 0
            })
        ));
    }

    #[test]
    fn test_read_block() {
        read_block_common(|r, pos| read_block(r, pos));
    }

    #[test]
    fn test_read_block_async() {
        read_block_common(|r, pos| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(read_block_async(r, pos))
        });
    }

    #[test]
    fn test_read_block_broken_reader() {
        struct BrokenReader;
        impl Read for BrokenReader {
            fn read(&mut self, _buffer: &mut [u8]) -> std::io::Result<usize> {
                Err(ErrorKind::ConnectionReset.into())
            }
        }

        match read_block(&mut BrokenReader, 0) {
            Err(ExtractError::Io(e)) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_block_async_split_reads() {
        // a block delivered in pieces is reassembled
        let data = two_and_a_half_blocks();
        let mut reader = tokio_test::io::Builder::new()
            .read(&data[..100])
            .read(&data[100..BLOCK_SIZE])
            .build();

        let block = read_block_async(&mut reader, 0).await.unwrap();
        assert_eq!(&block[..], &data[..BLOCK_SIZE]);
    }

    #[tokio::test]
    async fn test_read_block_async_broken_reader() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[0u8; 10])
            .read_error(Error::from(ErrorKind::ConnectionReset))
            .build();

        match read_block_async(&mut reader, 0).await {
            Err(ExtractError::Io(e)) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
