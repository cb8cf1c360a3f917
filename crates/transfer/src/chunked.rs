//! Buffered chunk reading from an arbitrary byte source.

use std::io::Read;

use crate::{ChunkRange, TransferError};

/// One planned range together with its payload bytes.
///
/// The payload is buffered before the first send attempt so a retry can
/// re-send byte-identical content even when the source cannot seek.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub range: ChunkRange,
    pub data: Vec<u8>,
}

/// Reads planned ranges out of a byte source in ascending offset order.
///
/// The source is consumed strictly forward. Ranges the server already holds
/// are skipped with [`skip_to`], which discards bytes instead of seeking —
/// the deployer hands over a plain stream, not a file handle.
///
/// [`skip_to`]: ChunkReader::skip_to
pub struct ChunkReader<R> {
    source: R,
    offset: u64,
}

impl<R: Read> ChunkReader<R> {
    /// Wraps a source positioned at byte 0.
    pub fn new(source: R) -> Self {
        Self { source, offset: 0 }
    }

    /// Current absolute read offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Discards bytes until the reader is positioned at `offset`.
    ///
    /// Fails if `offset` lies behind the current position (the stream only
    /// moves forward) or if the source ends before reaching it.
    pub fn skip_to(&mut self, offset: u64) -> Result<(), TransferError> {
        if offset < self.offset {
            return Err(TransferError::NonContiguous {
                at: self.offset,
                start: offset,
            });
        }

        let to_skip = offset - self.offset;
        let skipped = std::io::copy(&mut (&mut self.source).take(to_skip), &mut std::io::sink())?;
        self.offset += skipped;
        if skipped < to_skip {
            return Err(TransferError::ShortRead {
                offset: self.offset,
                expected: to_skip,
                actual: skipped,
            });
        }
        Ok(())
    }

    /// Reads exactly `range` into an owned buffer.
    ///
    /// A gap between the current position and `range.offset` is skipped
    /// first; a source that ends before filling the range is an error,
    /// never a silently short chunk.
    pub fn read_range(&mut self, range: ChunkRange) -> Result<Chunk, TransferError> {
        if range.offset != self.offset {
            self.skip_to(range.offset)?;
        }

        let mut data = vec![0u8; range.length as usize];
        let mut filled = 0usize;
        while filled < data.len() {
            let n = self.source.read(&mut data[filled..])?;
            if n == 0 {
                return Err(TransferError::ShortRead {
                    offset: range.offset,
                    expected: range.length as u64,
                    actual: filled as u64,
                });
            }
            filled += n;
        }

        self.offset = range.end();
        Ok(Chunk { range, data })
    }
}
