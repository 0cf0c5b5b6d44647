//! `stream_lines` and `stream_bytes`.
//!
//! Chunks are pushed to the sink as the iterator yields them, so at most one
//! chunk is held in memory. The returned summary ends the stream.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spiderfs_file::{ByteChunk, StreamPosition, stream_bytes, stream_lines};

use super::{ChunkSink, ToolContext, to_result};
use crate::dispatch::errors::DispatchError;

pub(crate) const STREAM_LINES: &str = "stream_lines";
pub(crate) const STREAM_BYTES: &str = "stream_bytes";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StreamLinesArgs {
    path: String,
    #[serde(default)]
    chunk_lines: Option<usize>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    byte_offset: Option<u64>,
    #[serde(default)]
    line_number: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StreamBytesArgs {
    path: String,
    #[serde(default)]
    chunk_bytes: Option<usize>,
    #[serde(default)]
    offset: Option<u64>,
}

/// Final line of a stream.
#[derive(Debug, Serialize)]
struct StreamSummary {
    chunks: u64,
}

/// Wire form of a byte chunk; `data` is standard base64.
#[derive(Debug, Serialize)]
struct EncodedByteChunk {
    chunk_number: u64,
    offset: u64,
    length: usize,
    data: String,
    is_last_chunk: bool,
    estimated_total_chunks: u64,
}

impl From<ByteChunk> for EncodedByteChunk {
    fn from(chunk: ByteChunk) -> Self {
        Self {
            chunk_number: chunk.chunk_number,
            offset: chunk.offset,
            length: chunk.data.len(),
            data: STANDARD.encode(&chunk.data),
            is_last_chunk: chunk.is_last_chunk,
            estimated_total_chunks: chunk.estimated_total_chunks,
        }
    }
}

pub(crate) fn lines(
    tools: &ToolContext,
    args: StreamLinesArgs,
    sink: &mut ChunkSink<'_>,
) -> Result<Value, DispatchError> {
    let path = tools.resolve(STREAM_LINES, &args.path)?;
    let options = tools.text_options(args.encoding.as_deref())?;
    let from = StreamPosition {
        byte_offset: args.byte_offset.unwrap_or(StreamPosition::START.byte_offset),
        line_number: args.line_number.unwrap_or(StreamPosition::START.line_number),
    };
    let chunk_lines = args.chunk_lines.unwrap_or(tools.stream_chunk_lines());
    let mut chunks = 0_u64;
    for chunk in stream_lines(&path, chunk_lines, from, options)? {
        sink(to_result(&chunk?)?)?;
        chunks += 1;
    }
    to_result(&StreamSummary { chunks })
}

pub(crate) fn bytes(
    tools: &ToolContext,
    args: StreamBytesArgs,
    sink: &mut ChunkSink<'_>,
) -> Result<Value, DispatchError> {
    let path = tools.resolve(STREAM_BYTES, &args.path)?;
    let chunk_bytes = args.chunk_bytes.unwrap_or(tools.stream_chunk_bytes());
    let mut chunks = 0_u64;
    for chunk in stream_bytes(&path, chunk_bytes, args.offset.unwrap_or(0))? {
        sink(to_result(&EncodedByteChunk::from(chunk?))?)?;
        chunks += 1;
    }
    to_result(&StreamSummary { chunks })
}
