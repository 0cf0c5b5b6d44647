//! Line-grouped chunks.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;
use spiderfs_text::{DecodePolicy, TextEncoding, WINDOW_BYTES};
use tracing::debug;

use super::StreamPosition;
use crate::error::FileError;
use crate::options::{TextOptions, open_regular, read_head};
use crate::reader::decode_at;

const STREAM_TARGET: &str = "spiderfs_file::streamer";

const LF: u16 = 0x0A;
const CR: u16 = 0x0D;

/// A group of consecutive lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChunk {
    /// One-based chunk counter within this stream.
    pub chunk_number: usize,
    /// Line number of the first line in `lines`.
    pub start_line: usize,
    /// Line contents without terminators.
    pub lines: Vec<String>,
    /// Position to resume from after this chunk.
    pub next: StreamPosition,
    /// File size when the stream was opened.
    pub file_size: u64,
    /// True when nothing follows this chunk.
    pub is_last_chunk: bool,
}

/// Splits lines on the terminator unit of one encoding.
#[derive(Debug, Clone, Copy)]
struct Splitter {
    wide: bool,
    big_endian: bool,
    delimiter: u16,
}

impl Splitter {
    /// Splits on line feeds unless the file holds carriage returns and no
    /// line feed at all, the rule the line index applies.
    ///
    /// Scans the whole of `reader` one window at a time.
    fn classify<R: Read>(reader: &mut R, encoding: TextEncoding) -> io::Result<Self> {
        let line_feed = Self {
            wide: encoding.is_utf16(),
            big_endian: encoding.is_big_endian(),
            delimiter: LF,
        };
        let mut window = vec![0u8; WINDOW_BYTES];
        let mut saw_cr = false;
        loop {
            let filled = read_up_to(reader, &mut window)?;
            if filled == 0 {
                break;
            }
            for unit in line_feed.units(window.get(..filled).unwrap_or_default()) {
                if unit == LF {
                    return Ok(line_feed);
                }
                saw_cr |= unit == CR;
            }
        }
        Ok(Self {
            delimiter: if saw_cr { CR } else { LF },
            ..line_feed
        })
    }

    /// True when a stripped line still holds a carriage return.
    fn holds_bare_cr(&self, line: &[u8]) -> bool {
        self.delimiter == LF && self.units(line).any(|unit| unit == CR)
    }

    fn units<'a>(&self, bytes: &'a [u8]) -> Box<dyn Iterator<Item = u16> + 'a> {
        if self.wide {
            let big_endian = self.big_endian;
            Box::new(bytes.chunks_exact(2).map(move |pair| match pair {
                [first, second] => join_unit(*first, *second, big_endian),
                _ => 0,
            }))
        } else {
            Box::new(bytes.iter().map(|byte| u16::from(*byte)))
        }
    }

    /// Appends the next raw line, terminator included, to `out` and returns
    /// the number of bytes consumed.
    fn read_line<R: BufRead>(&self, reader: &mut R, out: &mut Vec<u8>) -> io::Result<u64> {
        if !self.wide {
            let delimiter = u8::try_from(self.delimiter).unwrap_or(b'\n');
            return reader.read_until(delimiter, out).map(|read| read as u64);
        }
        let mut consumed = 0u64;
        loop {
            let mut pair = [0u8; 2];
            let filled = read_up_to(reader, &mut pair)?;
            out.extend_from_slice(pair.get(..filled).unwrap_or_default());
            consumed += filled as u64;
            let [first, second] = pair;
            if filled < 2 || join_unit(first, second, self.big_endian) == self.delimiter {
                return Ok(consumed);
            }
        }
    }

    /// Removes the terminator from a raw line, treating a carriage return
    /// before a line feed as part of it.
    fn strip(&self, raw: &mut Vec<u8>) {
        if self.strip_unit(raw, self.delimiter) && self.delimiter == LF {
            self.strip_unit(raw, CR);
        }
    }

    fn strip_unit(&self, raw: &mut Vec<u8>, unit: u16) -> bool {
        let width = if self.wide { 2 } else { 1 };
        let Some(split) = raw.len().checked_sub(width) else {
            return false;
        };
        let tail_matches = self
            .units(raw.get(split..).unwrap_or_default())
            .next()
            .is_some_and(|found| found == unit);
        if tail_matches {
            raw.truncate(split);
        }
        tail_matches
    }
}

fn join_unit(first: u8, second: u8, big_endian: bool) -> u16 {
    if big_endian {
        (u16::from(first) << 8) | u16::from(second)
    } else {
        (u16::from(second) << 8) | u16::from(first)
    }
}

fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while let Some(rest) = buffer.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        match reader.read(rest) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
    Ok(filled)
}

/// Lazy iterator of [`LineChunk`]s.
#[derive(Debug)]
pub struct LineChunks {
    path: PathBuf,
    reader: BufReader<File>,
    splitter: Splitter,
    encoding: TextEncoding,
    policy: DecodePolicy,
    chunk_lines: usize,
    position: StreamPosition,
    chunk_number: usize,
    file_size: u64,
    finished: bool,
}

impl LineChunks {
    /// Encoding the lines are decoded with.
    #[must_use]
    pub const fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Position of the next unread line.
    #[must_use]
    pub const fn position(&self) -> StreamPosition {
        self.position
    }

    fn fail(&mut self, error: FileError) -> Option<Result<LineChunk, FileError>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl Iterator for LineChunks {
    type Item = Result<LineChunk, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let start_line = self.position.line_number;
        let mut lines = Vec::with_capacity(self.chunk_lines.min(1024));
        while lines.len() < self.chunk_lines {
            let mut raw = Vec::new();
            let consumed = match self.splitter.read_line(&mut self.reader, &mut raw) {
                Ok(consumed) => consumed,
                Err(error) => return self.fail(FileError::read(&self.path, error)),
            };
            if consumed == 0 {
                break;
            }
            self.splitter.strip(&mut raw);
            if self.splitter.holds_bare_cr(&raw) {
                let error = FileError::MalformedLineEnding {
                    path: self.path.clone(),
                    line: self.position.line_number,
                };
                return self.fail(error);
            }
            let text = match decode_at(
                &self.path,
                &raw,
                self.position.byte_offset,
                self.encoding,
                self.policy,
            ) {
                Ok(text) => text,
                Err(error) => return self.fail(error),
            };
            lines.push(text);
            self.position.byte_offset += consumed;
            self.position.line_number += 1;
        }
        if lines.is_empty() {
            self.finished = true;
            return None;
        }
        let is_last_chunk = match self.reader.fill_buf() {
            Ok(buffered) => buffered.is_empty(),
            Err(error) => return self.fail(FileError::read(&self.path, error)),
        };
        self.finished = is_last_chunk;
        self.chunk_number += 1;
        debug!(
            target: STREAM_TARGET,
            path = %self.path.display(),
            chunk = self.chunk_number,
            lines = lines.len(),
            "line chunk produced"
        );
        Some(Ok(LineChunk {
            chunk_number: self.chunk_number,
            start_line,
            lines,
            next: self.position,
            file_size: self.file_size,
            is_last_chunk,
        }))
    }
}

/// Streams `path` in groups of `chunk_lines` lines starting at `from`.
///
/// Lines end at `\n` (with an optional preceding `\r`), or at `\r` when the
/// file contains carriage returns but no line feed. In a file that has both,
/// a line holding a bare `\r` ends the stream with
/// [`FileError::MalformedLineEnding`], as a range read over it would.
///
/// # Errors
///
/// Returns [`FileError::Validation`] for a zero chunk size, a zero line
/// number or an offset past the end of the file, and open failures.
pub fn stream_lines(
    path: &Path,
    chunk_lines: usize,
    from: StreamPosition,
    options: TextOptions,
) -> Result<LineChunks, FileError> {
    if chunk_lines == 0 {
        return Err(FileError::validation("chunk_lines must be greater than zero"));
    }
    if from.line_number == 0 {
        return Err(FileError::validation("line numbers are one-based"));
    }
    let mut file = open_regular(path)?;
    let file_size = file
        .metadata()
        .map_err(|error| FileError::read(path, error))?
        .len();
    if from.byte_offset > file_size {
        return Err(FileError::validation(format!(
            "offset {} is past the end of {} ({file_size} bytes)",
            from.byte_offset,
            path.display()
        )));
    }
    let head = read_head(&mut file).map_err(|error| FileError::read(path, error))?;
    let encoding = options.encoding.resolve(&head);
    let splitter =
        Splitter::classify(&mut file, encoding).map_err(|error| FileError::read(path, error))?;
    let start = if from.byte_offset == 0 {
        encoding.bom_len(&head) as u64
    } else {
        from.byte_offset
    };
    file.seek(SeekFrom::Start(start))
        .map_err(|error| FileError::read(path, error))?;
    Ok(LineChunks {
        path: path.to_path_buf(),
        reader: BufReader::new(file),
        splitter,
        encoding,
        policy: options.policy,
        chunk_lines,
        position: StreamPosition {
            byte_offset: start,
            line_number: from.line_number,
        },
        chunk_number: 0,
        file_size,
        finished: false,
    })
}
