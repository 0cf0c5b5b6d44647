//! Error types for request dispatch failures.
//!
//! Every failure a caller can see maps onto the shared [`ErrorKind`]
//! taxonomy. Output failures are the exception: once stdout is gone there is
//! nobody to answer, so they end the serve loop instead.

use std::io;

use spiderfs_file::{ErrorKind, FileError};
use spiderfs_search::SearchError;
use thiserror::Error;

/// Errors surfaced while parsing, routing or executing a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request line could not be parsed as JSON.
    #[error("malformed request: {message}")]
    MalformedJsonl {
        /// Parser diagnostic.
        message: String,
    },

    /// Request line exceeds the size limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Bytes received before giving up.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// The `tool` field names nothing this server offers.
    #[error("unknown tool '{tool}'")]
    UnknownTool {
        /// Requested tool name.
        tool: String,
    },

    /// Arguments are missing, mistyped or out of range.
    #[error("invalid arguments for '{tool}': {message}")]
    InvalidArguments {
        /// Tool being invoked.
        tool: &'static str,
        /// What is wrong.
        message: String,
    },

    /// A read, stream or write failed.
    #[error(transparent)]
    File(#[from] FileError),

    /// Content search or fuzzy location failed.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Reading requests or writing responses failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Response serialisation failed.
    #[error("failed to serialise response: {0}")]
    SerializeResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates a malformed request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJsonl {
            message: message.into(),
        }
    }

    /// Creates an unknown tool error.
    pub fn unknown_tool(tool: impl Into<String>) -> Self {
        Self::UnknownTool { tool: tool.into() }
    }

    /// Creates an invalid arguments error.
    pub fn invalid_arguments(tool: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool,
            message: message.into(),
        }
    }

    /// Classification reported on the wire.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedJsonl { .. }
            | Self::RequestTooLarge { .. }
            | Self::UnknownTool { .. }
            | Self::InvalidArguments { .. } => ErrorKind::ValidationError,
            Self::File(error) => error.kind(),
            Self::Search(error) => search_kind(error),
            Self::Io(_) | Self::SerializeResponse(_) => ErrorKind::IoError,
        }
    }

    /// Whether a failed write left the original content in place; `None`
    /// for everything that is not a failed write.
    #[must_use]
    pub const fn restored(&self) -> Option<bool> {
        match self {
            Self::File(error) => error.restored(),
            _ => None,
        }
    }

    /// True for failures that end the serve loop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::SerializeResponse(_))
    }
}

const fn search_kind(error: &SearchError) -> ErrorKind {
    match error {
        SearchError::InvalidPattern { .. } | SearchError::InvalidParameter { .. } => {
            ErrorKind::ValidationError
        }
        SearchError::NotFound { .. } => ErrorKind::NotFound,
        SearchError::BackendUnavailable { .. }
        | SearchError::Timeout { .. }
        | SearchError::Exhausted { .. } => ErrorKind::BackendUnavailable,
        SearchError::Io { .. } => ErrorKind::IoError,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DispatchError::unknown_tool("nope"), "validation_error")]
    #[case(DispatchError::invalid_arguments("read_range", "missing path"), "validation_error")]
    #[case(
        DispatchError::Search(SearchError::Exhausted { reason: "denied".to_owned() }),
        "backend_unavailable"
    )]
    #[case(
        DispatchError::Search(SearchError::NotFound { path: PathBuf::from("/x") }),
        "not_found"
    )]
    #[case(
        DispatchError::File(FileError::NotFound { path: PathBuf::from("/x") }),
        "not_found"
    )]
    fn maps_to_wire_kinds(#[case] error: DispatchError, #[case] expected: &str) {
        assert_eq!(error.kind().as_str(), expected);
    }

    #[test]
    fn only_output_failures_are_fatal() {
        assert!(DispatchError::Io(io::Error::other("closed")).is_fatal());
        assert!(!DispatchError::malformed("bad").is_fatal());
    }
}
