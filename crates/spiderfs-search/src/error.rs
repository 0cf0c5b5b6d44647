//! Error types for search and location.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failures raised by search backends and the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The pattern was rejected before any backend ran.
    #[error("invalid search pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern as supplied.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },

    /// A query parameter was out of range.
    #[error("invalid search parameter '{parameter}': {message}")]
    InvalidParameter {
        /// Parameter name.
        parameter: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// The search scope or locate root does not exist.
    #[error("path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// An external tool is missing or failed for a reason other than
    /// finding nothing.
    #[error("search backend '{backend}' unavailable: {reason}")]
    BackendUnavailable {
        /// Tool or backend name.
        backend: String,
        /// What went wrong.
        reason: String,
    },

    /// An external tool exceeded its time budget and was killed.
    #[error("search backend '{backend}' timed out after {}ms", timeout.as_millis())]
    Timeout {
        /// Tool name.
        backend: String,
        /// Budget that was exceeded.
        timeout: Duration,
    },

    /// Neither the external tools nor the in-process fallback could serve
    /// the request.
    #[error("no search backend could complete the request: {reason}")]
    Exhausted {
        /// Failure of the last backend tried.
        reason: String,
    },

    /// Reading the tree failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl SearchError {
    /// Builds an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Builds a [`SearchError::BackendUnavailable`].
    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// True for failures the dispatcher recovers from by falling back.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::Timeout { .. } | Self::Io { .. }
        )
    }
}
