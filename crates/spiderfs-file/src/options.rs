//! How callers choose the encoding and decode policy for a file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use spiderfs_text::{DecodePolicy, TextEncoding, WINDOW_BYTES, detect};

use crate::error::FileError;

/// Label that asks for statistical detection instead of a fixed encoding.
pub const DETECT_LABEL: &str = "auto";

/// Encoding requested for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncodingRequest {
    /// UTF-8, unless the file starts with a byte-order mark.
    #[default]
    Default,
    /// Guess from the first window of the file.
    Detect,
    /// Use exactly this encoding.
    Named(TextEncoding),
}

impl EncodingRequest {
    /// Parses an optional caller-supplied label; `auto` selects detection.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Validation`] for unknown labels.
    pub fn from_label(label: Option<&str>) -> Result<Self, FileError> {
        match label.map(str::trim) {
            None | Some("") => Ok(Self::Default),
            Some(text) if text.eq_ignore_ascii_case(DETECT_LABEL) => Ok(Self::Detect),
            Some(text) => TextEncoding::for_label(text)
                .map(Self::Named)
                .map_err(|error| FileError::from_text(Path::new(""), error)),
        }
    }

    /// Settles on an encoding given the leading bytes of the file.
    #[must_use]
    pub fn resolve(self, head: &[u8]) -> TextEncoding {
        match self {
            Self::Default => TextEncoding::sniff_bom(head)
                .map_or_else(TextEncoding::utf8, |(encoding, _)| encoding),
            Self::Detect => detect(head),
            Self::Named(encoding) => encoding,
        }
    }
}

/// Per-call text handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextOptions {
    /// Encoding selection.
    pub encoding: EncodingRequest,
    /// What to do with undecodable bytes.
    pub policy: DecodePolicy,
}

impl TextOptions {
    /// Options with the given encoding request and policy.
    #[must_use]
    pub const fn new(encoding: EncodingRequest, policy: DecodePolicy) -> Self {
        Self { encoding, policy }
    }
}

/// Opens `path` for reading, rejecting directories.
pub(crate) fn open_regular(path: &Path) -> Result<File, FileError> {
    let file = File::open(path).map_err(|error| FileError::read(path, error))?;
    let metadata = file.metadata().map_err(|error| FileError::read(path, error))?;
    if !metadata.is_file() {
        return Err(FileError::validation(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    Ok(file)
}

/// Reads up to one window from the start of `file`, then rewinds.
pub(crate) fn read_head(file: &mut File) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(WINDOW_BYTES);
    file.by_ref().take(WINDOW_BYTES as u64).read_to_end(&mut head)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(head)
}
