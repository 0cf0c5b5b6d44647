//! Line-range edits and their application to file bytes.

use std::path::Path;

use spiderfs_text::{LineIndex, LineRange, Terminator, encode};

use crate::error::FileError;
use crate::reader::to_usize;

/// Replaces the lines in `range` with `replacement`.
///
/// An empty replacement deletes the range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    range: LineRange,
    replacement: Vec<String>,
    unterminated: bool,
}

impl Edit {
    /// Builds an edit, rejecting replacement lines that carry terminators.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Validation`] when a replacement line contains
    /// `\n` or `\r`.
    pub fn new(range: LineRange, replacement: Vec<String>) -> Result<Self, FileError> {
        if let Some(position) = replacement
            .iter()
            .position(|line| line.contains(['\n', '\r']))
        {
            return Err(FileError::validation(format!(
                "replacement line {} for lines {range} contains a line terminator",
                position + 1
            )));
        }
        Ok(Self {
            range,
            replacement,
            unterminated: false,
        })
    }

    /// Edit built from already split lines.
    ///
    /// With `unterminated` set the last replacement line is written without
    /// a terminator.
    pub(crate) const fn derived(
        range: LineRange,
        replacement: Vec<String>,
        unterminated: bool,
    ) -> Self {
        Self {
            range,
            replacement,
            unterminated,
        }
    }

    /// Lines replaced.
    #[must_use]
    pub const fn range(&self) -> LineRange {
        self.range
    }

    /// Replacement lines, without terminators.
    #[must_use]
    pub fn replacement(&self) -> &[String] {
        &self.replacement
    }
}

/// Non-overlapping edits ordered for application.
///
/// Edits apply from the bottom of the file upwards, so every range refers
/// to line numbers of the original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    /// Orders `edits` by descending start line and rejects overlaps.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Validation`] for an empty batch and
    /// [`FileError::ConflictingEdits`] naming the first overlapping pair.
    pub fn new(mut edits: Vec<Edit>) -> Result<Self, FileError> {
        if edits.is_empty() {
            return Err(FileError::validation("at least one edit is required"));
        }
        edits.sort_by(|left, right| right.range.start().cmp(&left.range.start()));
        for pair in edits.windows(2) {
            if let [later, earlier] = pair
                && later.range.overlaps(&earlier.range)
            {
                return Err(FileError::ConflictingEdits {
                    first: earlier.range,
                    second: later.range,
                });
            }
        }
        Ok(Self { edits })
    }

    /// Edits in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Edit> {
        self.edits.iter()
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Always false for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// New content plus the count reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Applied {
    pub(crate) bytes: Vec<u8>,
    pub(crate) lines_changed: usize,
}

/// Splices `edits` into `original`.
///
/// Interior replacement lines take the file's dominant terminator. The last
/// replacement line takes the terminator of the last line it replaces, so
/// a file without a trailing newline keeps that shape. Edits that leave
/// their bytes unchanged are not counted.
pub(crate) fn apply(
    path: &Path,
    original: &[u8],
    index: &LineIndex,
    edits: &EditSet,
) -> Result<Applied, FileError> {
    let encoding = index.encoding();
    let interior = encode(index.dominant_terminator().as_str(), encoding)
        .map_err(|error| FileError::from_text(path, error))?
        .into_owned();
    let total = index.line_count();
    let mut output = original.to_vec();
    let mut lines_changed = 0;

    for edit in edits.iter() {
        let range = edit.range();
        let resolved = index.resolve_exact(range).map_err(|_| FileError::RangeOutOfBounds {
            path: path.to_path_buf(),
            line: range.start().max(total + 1),
            total,
        })?;
        let last = if edit.unterminated {
            Terminator::None
        } else {
            index
                .span(range.end())
                .map_or(Terminator::None, |span| span.terminator())
        };
        let closing = encode(last.as_str(), encoding)
            .map_err(|error| FileError::from_text(path, error))?;

        let mut replacement = Vec::new();
        let count = edit.replacement().len();
        for (position, line) in edit.replacement().iter().enumerate() {
            let encoded = encode(line, encoding).map_err(|error| FileError::from_text(path, error))?;
            replacement.extend_from_slice(&encoded);
            if position + 1 < count {
                replacement.extend_from_slice(&interior);
            } else {
                replacement.extend_from_slice(&closing);
            }
        }

        let bytes = index.byte_range(resolved);
        let from = to_usize(path, bytes.start)?;
        let to = to_usize(path, bytes.end)?;
        if output.get(from..to) == Some(replacement.as_slice()) {
            continue;
        }
        lines_changed += if count == 0 { range.len() } else { count };
        output.splice(from..to, replacement);
    }

    Ok(Applied {
        bytes: output,
        lines_changed,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use spiderfs_text::TextEncoding;

    use super::*;

    fn range(start: usize, end: usize) -> LineRange {
        LineRange::new(start, end).expect("valid range")
    }

    fn edit(start: usize, end: usize, lines: &[&str]) -> Edit {
        Edit::new(range(start, end), lines.iter().map(ToString::to_string).collect())
            .expect("valid edit")
    }

    fn run(original: &str, edits: Vec<Edit>) -> Result<(String, usize), FileError> {
        let index = LineIndex::from_bytes(original.as_bytes(), TextEncoding::utf8());
        let set = EditSet::new(edits)?;
        let applied = apply(Path::new("f.txt"), original.as_bytes(), &index, &set)?;
        let text = String::from_utf8(applied.bytes).expect("utf-8 output");
        Ok((text, applied.lines_changed))
    }

    #[test]
    fn rejects_terminators_in_replacement_lines() {
        let result = Edit::new(range(1, 1), vec!["a\nb".to_owned()]);
        assert!(matches!(result, Err(FileError::Validation { .. })));
    }

    #[test]
    fn orders_edits_bottom_up() {
        let set = EditSet::new(vec![edit(1, 1, &["x"]), edit(5, 6, &[]), edit(3, 3, &["y"])])
            .expect("disjoint edits");
        let starts: Vec<usize> = set.iter().map(|edit| edit.range().start()).collect();
        assert_eq!(starts, vec![5, 3, 1]);
    }

    #[rstest]
    #[case(vec![edit(2, 3, &["x"]), edit(3, 4, &["y"])])]
    #[case(vec![edit(1, 10, &["x"]), edit(8, 8, &["y"]), edit(4, 4, &["z"])])]
    fn rejects_overlaps(#[case] edits: Vec<Edit>) {
        assert!(matches!(
            EditSet::new(edits),
            Err(FileError::ConflictingEdits { .. })
        ));
    }

    #[test]
    fn replaces_deletes_and_counts() {
        let (text, changed) = run("a\nb\nc\nd\n", vec![edit(2, 3, &["B"])]).expect("applies");
        assert_eq!(text, "a\nB\nd\n");
        assert_eq!(changed, 1);

        let (text, changed) = run("a\nb\nc\nd\n", vec![edit(2, 3, &[])]).expect("applies");
        assert_eq!(text, "a\nd\n");
        assert_eq!(changed, 2);
    }

    #[test]
    fn applies_several_edits_against_original_numbering() {
        let (text, changed) = run(
            "1\n2\n3\n4\n5\n",
            vec![edit(1, 1, &["one", "uno"]), edit(4, 5, &["four"])],
        )
        .expect("applies");
        assert_eq!(text, "one\nuno\n2\n3\nfour\n");
        assert_eq!(changed, 3);
    }

    #[test]
    fn keeps_crlf_and_missing_final_terminator() {
        let (text, _) = run("a\r\nb\r\nc", vec![edit(3, 3, &["x", "y"])]).expect("applies");
        assert_eq!(text, "a\r\nb\r\nx\r\ny");
    }

    #[test]
    fn derived_edits_may_drop_the_final_terminator() {
        let index = LineIndex::from_bytes(b"a\nb\n", TextEncoding::utf8());
        let set = EditSet::new(vec![Edit::derived(range(2, 2), vec!["x".to_owned()], true)])
            .expect("edit set");
        let applied = apply(Path::new("f.txt"), b"a\nb\n", &index, &set).expect("applies");
        assert_eq!(applied.bytes, b"a\nx".to_vec());
    }

    #[test]
    fn identical_content_counts_nothing() {
        let (text, changed) = run("a\nb\n", vec![edit(2, 2, &["b"])]).expect("applies");
        assert_eq!(text, "a\nb\n");
        assert_eq!(changed, 0);
    }

    #[test]
    fn rejects_ranges_past_the_end() {
        let error = run("a\nb\n", vec![edit(2, 3, &["x"])]).expect_err("out of bounds");
        assert!(matches!(
            error,
            FileError::RangeOutOfBounds { line: 3, total: 2, .. }
        ));
    }

    #[test]
    fn encodes_into_the_file_encoding() {
        let original = [0xFF, 0xFE, b'a', 0, b'\n', 0];
        let encoding = TextEncoding::for_label("utf-16le").expect("known label");
        let index = LineIndex::from_bytes(&original, encoding);
        let set = EditSet::new(vec![edit(1, 1, &["b"])]).expect("edit set");
        let applied = apply(Path::new("f.txt"), &original, &index, &set).expect("applies");
        assert_eq!(applied.bytes, vec![0xFF, 0xFE, b'b', 0, b'\n', 0]);
    }
}
