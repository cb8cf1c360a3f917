//! Byte-range planning for chunked uploads.

use crate::{CHUNK_ALIGNMENT, TransferError};

/// A contiguous byte range scheduled for one upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Absolute offset of the first byte.
    pub offset: u64,
    /// Number of bytes in this range.
    pub length: u32,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }

    /// Inclusive end offset, as used in `Content-Range` headers.
    pub fn last(&self) -> u64 {
        self.end() - 1
    }
}

/// A byte range the server still expects.
///
/// `end` is inclusive; `None` means "through the end of the file". This is
/// the parsed form of the wire strings `"26-"` and `"26-100"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ExpectedRange {
    /// True if any byte of `range` falls inside this outstanding range.
    pub fn overlaps(&self, range: &ChunkRange) -> bool {
        let within_end = match self.end {
            Some(end) => range.offset <= end,
            None => true,
        };
        within_end && range.end() > self.start
    }
}

/// Computes chunk plans for a configured chunk size and alignment unit.
pub struct ChunkPlanner {
    max_chunk_size: u32,
    alignment: u32,
}

impl ChunkPlanner {
    /// Creates a planner with the protocol's default 320 KiB alignment.
    pub fn new(max_chunk_size: u32) -> Result<Self, TransferError> {
        Self::with_alignment(max_chunk_size, CHUNK_ALIGNMENT)
    }

    /// Creates a planner with a server-policy alignment unit.
    ///
    /// `max_chunk_size` must be a positive multiple of `alignment`.
    pub fn with_alignment(max_chunk_size: u32, alignment: u32) -> Result<Self, TransferError> {
        if alignment == 0 || max_chunk_size == 0 || max_chunk_size % alignment != 0 {
            return Err(TransferError::BadChunkSize {
                size: max_chunk_size,
                alignment,
            });
        }
        Ok(Self {
            max_chunk_size,
            alignment,
        })
    }

    /// Configured upper bound for one chunk.
    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Configured alignment unit.
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Partitions `[0, total_len)` into ordered, contiguous ranges.
    ///
    /// Every range except the last has exactly `max_chunk_size` bytes; the
    /// last carries the remainder. Fails with [`TransferError::EmptySource`]
    /// when there is nothing to upload.
    pub fn plan(&self, total_len: u64) -> Result<ChunkPlan, TransferError> {
        if total_len == 0 {
            return Err(TransferError::EmptySource);
        }

        let chunk = self.max_chunk_size as u64;
        let mut ranges = Vec::with_capacity(total_len.div_ceil(chunk) as usize);
        let mut offset = 0u64;
        while offset < total_len {
            let length = (total_len - offset).min(chunk) as u32;
            ranges.push(ChunkRange { offset, length });
            offset += length as u64;
        }

        Ok(ChunkPlan { total_len, ranges })
    }
}

/// The ordered set of ranges to transmit for one upload attempt.
///
/// Ranges cover `[0, total_len)` with no gaps or overlaps. A plan is
/// immutable once computed; resuming derives a new plan via [`remaining`]
/// rather than mutating this one.
///
/// [`remaining`]: ChunkPlan::remaining
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total_len: u64,
    ranges: Vec<ChunkRange>,
}

impl ChunkPlan {
    /// Total payload length the plan covers.
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Planned ranges in ascending offset order.
    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    /// True when no ranges remain to transmit.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Restricts the plan to ranges the server still expects.
    ///
    /// Ranges fully acknowledged by the server are dropped and never
    /// re-sent. An empty `next_expected` set means the server already holds
    /// every byte; the returned plan is empty.
    pub fn remaining(&self, next_expected: &[ExpectedRange]) -> ChunkPlan {
        let ranges = self
            .ranges
            .iter()
            .filter(|r| next_expected.iter().any(|e| e.overlaps(r)))
            .copied()
            .collect();
        ChunkPlan {
            total_len: self.total_len,
            ranges,
        }
    }
}
