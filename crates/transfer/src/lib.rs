//! Chunk planning and buffered chunk reading for resumable drive uploads.
//!
//! No network code lives here: this crate turns a source length into an
//! ordered sequence of byte ranges and reads those ranges out of any
//! `Read` source, one owned buffer at a time.

mod chunked;
mod plan;
mod progress;

pub use chunked::{Chunk, ChunkReader};
pub use plan::{ChunkPlan, ChunkPlanner, ChunkRange, ExpectedRange};
pub use progress::SpeedCalculator;

/// Alignment unit required by the upload endpoint: 320 KiB.
///
/// Every non-final chunk must be a multiple of this. The server publishes
/// the unit as policy; [`ChunkPlanner::with_alignment`] overrides it.
pub const CHUNK_ALIGNMENT: u32 = 320 * 1024;

/// Default chunk size: 10 alignment units (3,276,800 bytes).
pub const DEFAULT_CHUNK_SIZE: u32 = 10 * CHUNK_ALIGNMENT;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nothing to upload: source length is zero")]
    EmptySource,

    #[error("invalid chunk size {size}: must be a positive multiple of {alignment}")]
    BadChunkSize { size: u32, alignment: u32 },

    #[error("source ended early: wanted {expected} bytes at offset {offset}, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    #[error("non-contiguous read: reader is at offset {at}, range starts at {start}")]
    NonContiguous { at: u64, start: u64 },
}
