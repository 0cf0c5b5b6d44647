//! Chunked sequential access for files of any size.
//!
//! Both iterators hold an open handle and at most one chunk of content.
//! No lock is taken: a file rewritten mid-stream yields whatever the handle
//! reads next.

mod bytes;
mod lines;

use serde::{Deserialize, Serialize};

pub use bytes::{ByteChunk, ByteChunks, stream_bytes};
pub use lines::{LineChunk, LineChunks, stream_lines};

/// Where a line stream resumes.
///
/// Every [`LineChunk`] carries the position following its last line, so a
/// caller can reopen the stream there later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPosition {
    /// Byte offset of the next unread line.
    pub byte_offset: u64,
    /// One-based number of the next unread line.
    pub line_number: usize,
}

impl StreamPosition {
    /// The start of the file.
    pub const START: Self = Self {
        byte_offset: 0,
        line_number: 1,
    };
}

impl Default for StreamPosition {
    fn default() -> Self {
        Self::START
    }
}
