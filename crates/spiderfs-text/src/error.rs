//! Errors raised while indexing or transcoding text.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Failures surfaced by the line index and encoding helpers.
#[derive(Debug, Clone, Error)]
pub enum TextError {
    /// The supplied encoding label is not recognised.
    #[error("unknown encoding label '{label}'")]
    UnknownEncoding {
        /// Label exactly as supplied by the caller.
        label: String,
    },

    /// A line range was malformed before any lookup was attempted.
    #[error("invalid line range {start}..={end}: lines are one-based and start must not exceed end")]
    InvalidRange {
        /// Requested first line.
        start: usize,
        /// Requested last line.
        end: usize,
    },

    /// The first requested line lies beyond the end of the content.
    #[error("line {start} is beyond the end of the file ({total} lines)")]
    RangeOutOfBounds {
        /// Requested first line.
        start: usize,
        /// Number of lines actually present.
        total: usize,
    },

    /// A bare carriage return inside otherwise `\n`-terminated content would
    /// change which lines a request sees.
    #[error("line {line} contains a bare carriage return in a file terminated by line feeds")]
    MalformedLineEnding {
        /// One-based line holding the bare carriage return.
        line: usize,
    },

    /// The bytes are not valid in the requested encoding.
    #[error("invalid {encoding} sequence at byte {offset}")]
    Decode {
        /// Encoding used for decoding.
        encoding: &'static str,
        /// Offset of the first malformed byte, relative to the decoded slice.
        offset: usize,
    },

    /// A character has no representation in the target encoding.
    #[error("character {character:?} cannot be represented in {encoding}")]
    Unrepresentable {
        /// Target encoding.
        encoding: &'static str,
        /// First offending character.
        character: char,
    },

    /// Reading the underlying content failed.
    #[error("failed to read content: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl From<io::Error> for TextError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}
