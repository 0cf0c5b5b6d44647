//! Fixed-size byte chunks.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::FileError;
use crate::options::open_regular;

/// One slice of raw file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteChunk {
    /// One-based chunk counter within this stream.
    pub chunk_number: u64,
    /// File offset of `data`.
    pub offset: u64,
    /// Raw bytes, at most the requested chunk size.
    pub data: Vec<u8>,
    /// True when `data` reaches the end of the file.
    pub is_last_chunk: bool,
    /// Chunks needed for the whole file at the size it had when opened.
    pub estimated_total_chunks: u64,
}

/// Lazy iterator of [`ByteChunk`]s.
#[derive(Debug)]
pub struct ByteChunks {
    path: PathBuf,
    file: File,
    chunk_bytes: u64,
    offset: u64,
    chunk_number: u64,
    file_size: u64,
    estimated_total_chunks: u64,
    finished: bool,
}

impl ByteChunks {
    /// File size when the stream was opened.
    #[must_use]
    pub const fn file_size(&self) -> u64 {
        self.file_size
    }
}

impl Iterator for ByteChunks {
    type Item = Result<ByteChunk, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut data = Vec::new();
        if let Err(error) = (&self.file).take(self.chunk_bytes).read_to_end(&mut data) {
            self.finished = true;
            return Some(Err(FileError::read(&self.path, error)));
        }
        if data.is_empty() {
            self.finished = true;
            return None;
        }
        let offset = self.offset;
        self.offset += data.len() as u64;
        self.chunk_number += 1;
        let is_last_chunk = self.offset >= self.file_size;
        self.finished = is_last_chunk;
        Some(Ok(ByteChunk {
            chunk_number: self.chunk_number,
            offset,
            data,
            is_last_chunk,
            estimated_total_chunks: self.estimated_total_chunks,
        }))
    }
}

/// Streams the raw bytes of `path` in `chunk_bytes` pieces from `offset`.
///
/// # Errors
///
/// Returns [`FileError::Validation`] for a zero chunk size or an offset
/// past the end of the file, and open failures.
pub fn stream_bytes(path: &Path, chunk_bytes: usize, offset: u64) -> Result<ByteChunks, FileError> {
    if chunk_bytes == 0 {
        return Err(FileError::validation("chunk_bytes must be greater than zero"));
    }
    let mut file = open_regular(path)?;
    let file_size = file
        .metadata()
        .map_err(|error| FileError::read(path, error))?
        .len();
    if offset > file_size {
        return Err(FileError::validation(format!(
            "offset {offset} is past the end of {} ({file_size} bytes)",
            path.display()
        )));
    }
    file.seek(SeekFrom::Start(offset))
        .map_err(|error| FileError::read(path, error))?;
    let window = chunk_bytes as u64;
    Ok(ByteChunks {
        path: path.to_path_buf(),
        file,
        chunk_bytes: window,
        offset,
        chunk_number: 0,
        file_size,
        estimated_total_chunks: file_size.div_ceil(window),
        finished: false,
    })
}
