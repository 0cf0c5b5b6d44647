//! Range and context reads.
//!
//! Only the bytes covering the requested lines are read back after the
//! index pass, so memory use is bounded by the size of the answer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::Serialize;
use spiderfs_text::{
    DecodePolicy, LineIndex, LineRange, LineSpan, ResolvedRange, TextEncoding, TextError, decode,
};
use tracing::debug;

use crate::error::FileError;
use crate::options::{EncodingRequest, TextOptions, open_regular, read_head};

const READER_TARGET: &str = "spiderfs_file::reader";

/// Window actually applied around a context read's target line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextWindow {
    /// Line the caller asked about.
    pub target_line: usize,
    /// Lines returned before the target.
    pub before: usize,
    /// Lines returned after the target.
    pub after: usize,
}

/// Facts about the file and the lines returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadMetadata {
    /// Lines in the whole file.
    pub total_lines: usize,
    /// File size in bytes.
    pub byte_size: u64,
    /// Encoding used to decode the lines.
    pub encoding: &'static str,
    /// First line returned.
    pub start_line: usize,
    /// Last line returned.
    pub end_line: usize,
    /// True when the request reached past a file boundary and was pulled in.
    pub clamped: bool,
    /// Present for context reads.
    #[serde(flatten)]
    pub context: Option<ContextWindow>,
}

/// Decoded lines plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadOutput {
    /// Line contents without terminators.
    pub lines: Vec<String>,
    /// Facts about the read.
    pub metadata: ReadMetadata,
}

/// Reads `range`, clamping an end beyond the last line.
///
/// # Errors
///
/// Returns [`FileError::RangeOutOfBounds`] when `range` starts past the last
/// line, [`FileError::MalformedLineEnding`] when a covered line holds a bare
/// carriage return in a line-feed file, and decode or I/O failures.
pub fn read_range(path: &Path, range: LineRange, options: TextOptions) -> Result<ReadOutput, FileError> {
    let mut file = open_regular(path)?;
    let index = index_file(path, &mut file, options.encoding)?;
    let resolved = index
        .resolve(range)
        .map_err(|error| FileError::from_text(path, error))?;
    let lines = read_lines(path, &mut file, &index, resolved, options.policy)?;
    debug!(
        target: READER_TARGET,
        path = %path.display(),
        start = resolved.start(),
        end = resolved.end(),
        clamped = resolved.clamped(),
        "range read"
    );
    Ok(ReadOutput {
        lines,
        metadata: metadata(&index, resolved, resolved.clamped(), None),
    })
}

/// Reads `line` with up to `before` lines above and `after` lines below it.
///
/// The window is clamped to the file without error.
///
/// # Errors
///
/// Returns [`FileError::Validation`] for line zero,
/// [`FileError::RangeOutOfBounds`] when `line` does not exist, and the
/// failures of [`read_range`].
pub fn read_context(
    path: &Path,
    line: usize,
    before: usize,
    after: usize,
    options: TextOptions,
) -> Result<ReadOutput, FileError> {
    if line == 0 {
        return Err(FileError::validation("line numbers are one-based"));
    }
    let mut file = open_regular(path)?;
    let index = index_file(path, &mut file, options.encoding)?;
    let total = index.line_count();
    if line > total {
        return Err(FileError::RangeOutOfBounds {
            path: path.to_path_buf(),
            line,
            total,
        });
    }
    let start = line.saturating_sub(before).max(1);
    let end = line.saturating_add(after).min(total);
    let clamped = line - start < before || end - line < after;
    let range = LineRange::new(start, end).map_err(|error| FileError::from_text(path, error))?;
    let resolved = index
        .resolve(range)
        .map_err(|error| FileError::from_text(path, error))?;
    let lines = read_lines(path, &mut file, &index, resolved, options.policy)?;
    let window = ContextWindow {
        target_line: line,
        before: line - start,
        after: end - line,
    };
    Ok(ReadOutput {
        lines,
        metadata: metadata(&index, resolved, clamped, Some(window)),
    })
}

/// Builds the line index for `file` under the requested encoding.
pub(crate) fn index_file(
    path: &Path,
    file: &mut File,
    request: EncodingRequest,
) -> Result<LineIndex, FileError> {
    let head = read_head(file).map_err(|error| FileError::read(path, error))?;
    let encoding = request.resolve(&head);
    LineIndex::build(&mut *file, encoding).map_err(|error| FileError::from_text(path, error))
}

fn read_lines(
    path: &Path,
    file: &mut File,
    index: &LineIndex,
    range: ResolvedRange,
    policy: DecodePolicy,
) -> Result<Vec<String>, FileError> {
    index
        .check_terminators(range)
        .map_err(|error| FileError::from_text(path, error))?;
    let bytes = index.byte_range(range);
    let mut buffer = vec![0u8; to_usize(path, bytes.end - bytes.start)?];
    file.seek(SeekFrom::Start(bytes.start))
        .and_then(|_| file.read_exact(&mut buffer))
        .map_err(|error| FileError::read(path, error))?;

    let encoding = index.encoding();
    (range.start()..=range.end())
        .filter_map(|line| index.span(line))
        .map(|span| decode_span(path, &buffer, bytes.start, span, encoding, policy))
        .collect()
}

/// Decodes one line's content out of a buffer that starts at file offset
/// `base`.
fn decode_span(
    path: &Path,
    buffer: &[u8],
    base: u64,
    span: &LineSpan,
    encoding: TextEncoding,
    policy: DecodePolicy,
) -> Result<String, FileError> {
    let from = to_usize(path, span.start() - base)?;
    let to = to_usize(path, span.content_end() - base)?;
    let slice = buffer.get(from..to).unwrap_or_default();
    decode_at(path, slice, span.start(), encoding, policy)
}

/// Decodes `bytes` found at `file_offset`, reporting decode failures with
/// their position in the file.
pub(crate) fn decode_at(
    path: &Path,
    bytes: &[u8],
    file_offset: u64,
    encoding: TextEncoding,
    policy: DecodePolicy,
) -> Result<String, FileError> {
    match decode(bytes, encoding, policy) {
        Ok(text) => Ok(text.into_owned()),
        Err(TextError::Decode {
            encoding: name,
            offset,
        }) => Err(FileError::Decode {
            path: path.to_path_buf(),
            encoding: name,
            offset: offset.saturating_add(to_usize(path, file_offset)?),
        }),
        Err(error) => Err(FileError::from_text(path, error)),
    }
}

pub(crate) fn to_usize(path: &Path, value: u64) -> Result<usize, FileError> {
    usize::try_from(value).map_err(|_| {
        FileError::validation(format!(
            "{} is too large to address on this platform",
            path.display()
        ))
    })
}

fn metadata(
    index: &LineIndex,
    range: ResolvedRange,
    clamped: bool,
    context: Option<ContextWindow>,
) -> ReadMetadata {
    ReadMetadata {
        total_lines: index.line_count(),
        byte_size: index.byte_len(),
        encoding: index.encoding().name(),
        start_line: range.start(),
        end_line: range.end(),
        clamped,
        context,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;

    struct Sample {
        _dir: TempDir,
        path: std::path::PathBuf,
    }

    fn sample(content: &[u8]) -> Sample {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("sample.txt");
        fs::write(&path, content).expect("write sample");
        Sample { _dir: dir, path }
    }

    #[fixture]
    fn four_lines() -> Sample {
        sample(b"a\nb\r\nc\nd")
    }

    fn range(start: usize, end: usize) -> LineRange {
        LineRange::new(start, end).expect("valid range")
    }

    #[rstest]
    fn reads_interior_lines_without_terminators(four_lines: Sample) {
        let output =
            read_range(&four_lines.path, range(2, 3), TextOptions::default()).expect("read");
        assert_eq!(output.lines, ["b", "c"]);
        assert_eq!(output.metadata.total_lines, 4);
        assert_eq!(output.metadata.byte_size, 9);
        assert!(!output.metadata.clamped);
    }

    #[rstest]
    fn clamps_an_overlong_end(four_lines: Sample) {
        let output =
            read_range(&four_lines.path, range(3, 10), TextOptions::default()).expect("read");
        assert_eq!(output.lines, ["c", "d"]);
        assert_eq!(output.metadata.end_line, 4);
        assert!(output.metadata.clamped);
    }

    #[rstest]
    fn rejects_a_start_past_the_end(four_lines: Sample) {
        let error = read_range(&four_lines.path, range(5, 6), TextOptions::default())
            .expect_err("out of bounds");
        assert_eq!(error.kind(), ErrorKind::RangeOutOfBounds);
    }

    #[rstest]
    fn repeated_reads_agree(four_lines: Sample) {
        let first = read_range(&four_lines.path, range(1, 4), TextOptions::default()).expect("read");
        let second =
            read_range(&four_lines.path, range(1, 4), TextOptions::default()).expect("read");
        assert_eq!(first, second);
        assert_eq!(first.lines.len(), 4);
    }

    #[rstest]
    #[case(3, 5, 1, (1, 4), (2, 1), true)]
    #[case(2, 1, 1, (1, 3), (1, 1), false)]
    #[case(4, 0, 9, (4, 4), (0, 0), true)]
    fn context_reads_clamp_at_boundaries(
        four_lines: Sample,
        #[case] line: usize,
        #[case] before: usize,
        #[case] after: usize,
        #[case] bounds: (usize, usize),
        #[case] applied: (usize, usize),
        #[case] clamped: bool,
    ) {
        let output = read_context(&four_lines.path, line, before, after, TextOptions::default())
            .expect("context read");
        let meta = &output.metadata;
        assert_eq!((meta.start_line, meta.end_line), bounds);
        let window = meta.context.expect("context window");
        assert_eq!((window.before, window.after), applied);
        assert_eq!(window.target_line, line);
        assert_eq!(meta.clamped, clamped);
    }

    #[rstest]
    fn context_rejects_missing_lines(four_lines: Sample) {
        let error = read_context(&four_lines.path, 9, 1, 1, TextOptions::default())
            .expect_err("no line 9");
        assert_eq!(error.kind(), ErrorKind::RangeOutOfBounds);
        let zero = read_context(&four_lines.path, 0, 1, 1, TextOptions::default())
            .expect_err("line zero");
        assert_eq!(zero.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn bare_carriage_returns_fail_only_when_covered() {
        let file = sample(b"a\nb\rc\nd\n");
        let error = read_range(&file.path, range(2, 2), TextOptions::default())
            .expect_err("line 2 holds a bare CR");
        assert_eq!(error.kind(), ErrorKind::MalformedLineEnding);
        let ok = read_range(&file.path, range(3, 3), TextOptions::default()).expect("line 3");
        assert_eq!(ok.lines, ["d"]);
    }

    #[test]
    fn strict_decoding_reports_the_file_offset() {
        let file = sample(b"ok\n\xFFno\n");
        let error = read_range(&file.path, range(2, 2), TextOptions::default())
            .expect_err("invalid UTF-8");
        assert!(matches!(error, FileError::Decode { offset: 3, .. }));
        let lenient = TextOptions::new(EncodingRequest::Default, DecodePolicy::Replace);
        let output = read_range(&file.path, range(2, 2), lenient).expect("replaced");
        assert_eq!(output.lines, ["\u{FFFD}no"]);
    }

    #[test]
    fn reads_utf16_with_a_byte_order_mark() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "one\ntwo\n".encode_utf16() {
            bytes.push(u8::try_from(unit >> 8).expect("high byte"));
            bytes.push(u8::try_from(unit & 0xFF).expect("low byte"));
        }
        let file = sample(&bytes);
        let output = read_range(&file.path, range(2, 2), TextOptions::default()).expect("read");
        assert_eq!(output.lines, ["two"]);
        assert_eq!(output.metadata.encoding, "UTF-16BE");
    }

    #[test]
    fn missing_files_and_directories_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let missing = read_range(&dir.path().join("gone"), range(1, 1), TextOptions::default())
            .expect_err("missing");
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        let directory =
            read_range(dir.path(), range(1, 1), TextOptions::default()).expect_err("directory");
        assert_eq!(directory.kind(), ErrorKind::ValidationError);
    }
}
