//! The JSONL serve loop.
//!
//! Requests are handled one at a time in arrival order. Each line is read
//! with a hard size cap; an oversized line is discarded up to its newline and
//! answered with a validation error so the loop can carry on with the next
//! request.

use std::io::{BufRead, Read, Write};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::errors::DispatchError;
use super::handlers::ToolContext;
use super::request::{ToolRequest, trim_trailing_whitespace};
use super::response::ResponseWriter;
use super::router::{DISPATCH_TARGET, ToolRouter};

/// Maximum size of a single request line in bytes, newline excluded.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    /// The input is exhausted.
    Eof,
    /// A complete line is in the buffer.
    Request,
    /// The line exceeded the cap and was skipped; carries its length.
    Oversized(usize),
}

/// Serves requests from a line-oriented input until it closes.
#[derive(Debug)]
pub struct Server {
    router: ToolRouter,
}

impl Server {
    /// Creates a server over the given tool context.
    #[must_use]
    pub const fn new(tools: ToolContext) -> Self {
        Self {
            router: ToolRouter::new(tools),
        }
    }

    /// Reads requests from `input` and writes responses to `output` until
    /// `input` reaches end of file. Returns the number of lines answered.
    ///
    /// # Errors
    ///
    /// Returns an error when reading the input or writing a response fails.
    /// Malformed and failing requests are answered, not returned.
    pub fn serve<R: BufRead, W: Write>(&self, mut input: R, output: W) -> Result<u64, DispatchError> {
        let mut writer = ResponseWriter::new(output);
        let mut buffer = Vec::new();
        let mut answered = 0_u64;
        loop {
            match read_request_line(&mut input, &mut buffer)? {
                Line::Eof => break,
                Line::Oversized(size) => {
                    warn!(target: DISPATCH_TARGET, size, "request line too large");
                    let error = DispatchError::RequestTooLarge {
                        size,
                        max_size: MAX_REQUEST_BYTES,
                    };
                    writer.write_error(&Value::Null, &error)?;
                }
                Line::Request => {
                    if trim_trailing_whitespace(&buffer).is_empty() {
                        continue;
                    }
                    self.handle(&buffer, &mut writer)?;
                }
            }
            answered += 1;
        }
        info!(target: DISPATCH_TARGET, answered, "input closed");
        Ok(answered)
    }

    fn handle<W: Write>(&self, line: &[u8], writer: &mut ResponseWriter<W>) -> Result<(), DispatchError> {
        match ToolRequest::parse(line) {
            Ok(request) => self.router.route(&request, writer),
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "malformed request");
                writer.write_error(&Value::Null, &error)
            }
        }
    }
}

/// Reads one newline-terminated line into `buffer`, never buffering more
/// than [`MAX_REQUEST_BYTES`] plus the delimiter.
fn read_request_line<R: BufRead>(input: &mut R, buffer: &mut Vec<u8>) -> Result<Line, DispatchError> {
    buffer.clear();
    let limit = MAX_REQUEST_BYTES as u64 + 1;
    let read = input.by_ref().take(limit).read_until(b'\n', buffer)?;
    if read == 0 {
        return Ok(Line::Eof);
    }
    if buffer.last() == Some(&b'\n') || buffer.len() <= MAX_REQUEST_BYTES {
        return Ok(Line::Request);
    }
    let skipped = input.skip_until(b'\n')?;
    debug!(target: DISPATCH_TARGET, skipped, "discarded the rest of an oversized line");
    Ok(Line::Oversized(buffer.len() + skipped))
}
