//! Response serialisation for the dispatch loop.
//!
//! Every response is one JSON line tagged by `status`. Streaming tools write
//! any number of `chunk` lines before their final `ok` line; an `error` line
//! ends a request whether or not chunks preceded it.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use spiderfs_file::ErrorKind;

use super::errors::DispatchError;

/// Structured failure carried by an `error` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Taxonomy entry.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// For failed writes, whether the original content is back in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored: Option<bool>,
}

impl From<&DispatchError> for ErrorBody {
    fn from(error: &DispatchError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            restored: error.restored(),
        }
    }
}

/// One response line.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse<'a> {
    /// Final successful result.
    Ok {
        /// Request id.
        id: &'a Value,
        /// Tool-specific payload.
        result: Value,
    },
    /// One piece of a streamed result.
    Chunk {
        /// Request id.
        id: &'a Value,
        /// Tool-specific chunk payload.
        chunk: Value,
    },
    /// Terminal failure.
    Error {
        /// Request id, `null` when the line could not be parsed.
        id: &'a Value,
        /// What went wrong.
        error: ErrorBody,
    },
}

/// Writes JSONL responses, flushing after every line so a client can act on
/// each one as it arrives.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one response line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation, writing or flushing fails.
    pub fn write_message(&mut self, message: &ToolResponse<'_>) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a final `ok` line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_ok(&mut self, id: &Value, result: Value) -> Result<(), DispatchError> {
        self.write_message(&ToolResponse::Ok { id, result })
    }

    /// Writes a `chunk` line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_chunk(&mut self, id: &Value, chunk: Value) -> Result<(), DispatchError> {
        self.write_message(&ToolResponse::Chunk { id, chunk })
    }

    /// Writes an `error` line describing `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_error(&mut self, id: &Value, error: &DispatchError) -> Result<(), DispatchError> {
        self.write_message(&ToolResponse::Error {
            id,
            error: ErrorBody::from(error),
        })
    }
}
