//! Bounded reads, chunked streaming and transactional writes for text files.
//!
//! Reads index the file once and read back only the bytes covering the
//! requested lines. Streams hold one chunk at a time. Writes go through
//! [`MutationEngine`], which snapshots the original, swaps the new content
//! in atomically and restores the snapshot when the swap fails.

mod error;
mod mutation;
mod options;
mod reader;
mod streamer;

pub use error::{ErrorKind, FileError};
pub use mutation::{
    BackupRetention, Edit, EditSet, Fault, FaultInjectingStore, FileOutcome, FileStore,
    LocalFileStore, MutationEngine, MutationSettings, MutationState, ReplaceOutcome, Replacement,
    Step, WriteOutcome,
};
pub use options::{DETECT_LABEL, EncodingRequest, TextOptions};
pub use reader::{ContextWindow, ReadMetadata, ReadOutput, read_context, read_range};
pub use streamer::{
    ByteChunk, ByteChunks, LineChunk, LineChunks, StreamPosition, stream_bytes, stream_lines,
};
