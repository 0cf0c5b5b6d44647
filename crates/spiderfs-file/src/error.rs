//! Error types for reads, streams and mutations.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use spiderfs_text::{LineRange, TextError};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input rejected before any I/O.
    ValidationError,
    /// The path does not exist.
    NotFound,
    /// A line range lies outside the file.
    RangeOutOfBounds,
    /// Two edits in one set touch the same line.
    ConflictingEdits,
    /// Replacement text cannot be expressed in the file's encoding.
    EncodingError,
    /// File bytes are invalid in the requested encoding.
    DecodeError,
    /// Inconsistent line terminators inside the requested range.
    MalformedLineEnding,
    /// No search backend could serve the request.
    BackendUnavailable,
    /// The snapshot could not be taken; nothing was written.
    BackupFailed,
    /// Writing failed and the original content was restored.
    WriteFailed,
    /// Writing failed and the original content could not be restored.
    RollbackFailed,
    /// Any other filesystem failure.
    IoError,
}

impl ErrorKind {
    /// Wire spelling of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Failures from the partial reader, the streamer and the mutation engine.
#[derive(Debug, Clone, Error)]
pub enum FileError {
    /// Request parameters were rejected before touching the file.
    #[error("invalid request: {message}")]
    Validation {
        /// What was wrong.
        message: String,
    },

    /// The target path does not exist.
    #[error("{} does not exist", path.display())]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// A requested line is past the end of the file.
    #[error("line {line} is beyond the end of {} ({total} lines)", path.display())]
    RangeOutOfBounds {
        /// Target file.
        path: PathBuf,
        /// First requested line that does not exist.
        line: usize,
        /// Lines present.
        total: usize,
    },

    /// Two edits in the same set cover a common line.
    #[error("edits {first} and {second} overlap")]
    ConflictingEdits {
        /// One of the overlapping ranges.
        first: LineRange,
        /// The other overlapping range.
        second: LineRange,
    },

    /// A bare carriage return inside the requested lines.
    #[error("line {line} of {} mixes carriage-return line endings", path.display())]
    MalformedLineEnding {
        /// Target file.
        path: PathBuf,
        /// Offending line.
        line: usize,
    },

    /// The file content is not valid in the chosen encoding.
    #[error("{} is not valid {encoding} at byte {offset}", path.display())]
    Decode {
        /// Target file.
        path: PathBuf,
        /// Encoding used.
        encoding: &'static str,
        /// Offset of the first bad byte within the decoded region.
        offset: usize,
    },

    /// Replacement text contains a character the file's encoding lacks.
    #[error("{character:?} cannot be written to {} as {encoding}", path.display())]
    Encoding {
        /// Target file.
        path: PathBuf,
        /// Target encoding.
        encoding: &'static str,
        /// First unrepresentable character.
        character: char,
    },

    /// Reading the file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The pre-write snapshot could not be captured. The file is untouched.
    #[error("failed to back up {}: {source}", path.display())]
    BackupFailed {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Writing failed; the original content has been restored and verified.
    #[error("failed to write {}: {source}; original content restored", path.display())]
    WriteFailed {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Writing failed and so did restoring the snapshot. The file may be
    /// inconsistent and needs operator attention.
    #[error(
        "failed to write {}: {write_error}; restoring the original also failed: {reason}",
        path.display()
    )]
    RollbackFailed {
        /// Target file.
        path: PathBuf,
        /// Why the write failed.
        write_error: String,
        /// Why the restore failed.
        reason: String,
        /// Side file holding the original bytes, when one was written.
        backup: Option<PathBuf>,
    },
}

impl FileError {
    /// Builds a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wraps a read failure, mapping a missing file to [`FileError::NotFound`].
    #[must_use]
    pub fn read(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(source),
            }
        }
    }

    /// Attaches `path` to a text-layer failure.
    #[must_use]
    pub fn from_text(path: &Path, error: TextError) -> Self {
        let owned = path.to_path_buf();
        match error {
            TextError::UnknownEncoding { label } => {
                Self::validation(format!("unknown encoding label '{label}'"))
            }
            TextError::InvalidRange { start, end } => Self::validation(format!(
                "invalid line range {start}-{end}: lines are one-based and start must not exceed end"
            )),
            TextError::RangeOutOfBounds { start, total } => Self::RangeOutOfBounds {
                path: owned,
                line: start,
                total,
            },
            TextError::MalformedLineEnding { line } => Self::MalformedLineEnding { path: owned, line },
            TextError::Decode { encoding, offset } => Self::Decode {
                path: owned,
                encoding,
                offset,
            },
            TextError::Unrepresentable {
                encoding,
                character,
            } => Self::Encoding {
                path: owned,
                encoding,
                character,
            },
            TextError::Io { source } => Self::Io {
                path: owned,
                source,
            },
        }
    }

    /// Classification used on the wire.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RangeOutOfBounds { .. } => ErrorKind::RangeOutOfBounds,
            Self::ConflictingEdits { .. } => ErrorKind::ConflictingEdits,
            Self::MalformedLineEnding { .. } => ErrorKind::MalformedLineEnding,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Encoding { .. } => ErrorKind::EncodingError,
            Self::Io { .. } => ErrorKind::IoError,
            Self::BackupFailed { .. } => ErrorKind::BackupFailed,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::RollbackFailed { .. } => ErrorKind::RollbackFailed,
        }
    }

    /// For mutation failures past validation, whether the file holds its
    /// original content.
    #[must_use]
    pub const fn restored(&self) -> Option<bool> {
        match self {
            Self::BackupFailed { .. } | Self::WriteFailed { .. } => Some(true),
            Self::RollbackFailed { .. } => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ErrorKind::ValidationError, "validation_error")]
    #[case(ErrorKind::RangeOutOfBounds, "range_out_of_bounds")]
    #[case(ErrorKind::RollbackFailed, "rollback_failed")]
    fn kinds_use_snake_case(#[case] kind: ErrorKind, #[case] expected: &str) {
        assert_eq!(kind.as_str(), expected);
        assert_eq!(kind.to_string(), expected);
    }

    #[test]
    fn missing_files_map_to_not_found() {
        let error = FileError::read(
            Path::new("/nowhere"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.restored(), None);
    }

    #[test]
    fn unknown_encodings_are_validation_errors() {
        let error = FileError::from_text(
            Path::new("a.txt"),
            TextError::UnknownEncoding {
                label: String::from("klingon"),
            },
        );
        assert_eq!(error.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn rollback_failure_reports_unrestored_content() {
        let error = FileError::RollbackFailed {
            path: PathBuf::from("a.txt"),
            write_error: String::from("disk full"),
            reason: String::from("disk full"),
            backup: None,
        };
        assert_eq!(error.restored(), Some(false));
        assert_eq!(error.kind(), ErrorKind::RollbackFailed);
    }
}
