//! Turns a literal search-and-replace into line edits.

use std::path::Path;

use spiderfs_text::{DecodePolicy, LineIndex, LineRange};

use crate::error::FileError;
use crate::mutation::edit::Edit;
use crate::reader::{decode_at, to_usize};

/// Literal replacement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    search: String,
    replace: String,
    limit: usize,
}

impl Replacement {
    /// Replaces up to `limit` occurrences of `search`; zero means all.
    ///
    /// `\r\n` in either string is read as `\n`, which matches every line
    /// boundary whatever the file's terminator.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Validation`] for an empty search string or a
    /// bare carriage return in either string.
    pub fn new(search: &str, replace: &str, limit: usize) -> Result<Self, FileError> {
        if search.is_empty() {
            return Err(FileError::validation("search string must not be empty"));
        }
        Ok(Self {
            search: normalise("search", search)?,
            replace: normalise("replacement", replace)?,
            limit,
        })
    }
}

fn normalise(field: &str, text: &str) -> Result<String, FileError> {
    let unified = text.replace("\r\n", "\n");
    if unified.contains('\r') {
        return Err(FileError::validation(format!(
            "{field} string contains a bare carriage return"
        )));
    }
    Ok(unified)
}

/// Edits for every group of lines touched by a match.
#[derive(Debug, Default)]
pub(crate) struct Derived {
    pub(crate) edits: Vec<Edit>,
    pub(crate) occurrences: usize,
}

struct Group {
    first: usize,
    last: usize,
    matches: Vec<(usize, usize)>,
    consumes_final_terminator: bool,
}

/// Decodes the file into `\n`-joined text, finds matches and rewrites each
/// affected run of lines as one edit.
///
/// A terminated file gets a trailing `\n` in the searched text, so a match
/// may consume the final terminator. The edit for such a match then carries
/// the region's text including that terminator.
pub(crate) fn derive(
    path: &Path,
    bytes: &[u8],
    index: &LineIndex,
    request: &Replacement,
    policy: DecodePolicy,
) -> Result<Derived, FileError> {
    let mut text = String::new();
    let mut starts = Vec::with_capacity(index.line_count());
    for (position, span) in index.spans().iter().enumerate() {
        if position > 0 {
            text.push('\n');
        }
        starts.push(text.len());
        let from = to_usize(path, span.start())?;
        let to = to_usize(path, span.content_end())?;
        let content = bytes.get(from..to).unwrap_or_default();
        text.push_str(&decode_at(path, content, span.start(), index.encoding(), policy)?);
    }
    let content_len = text.len();
    if index.ends_with_terminator() {
        text.push('\n');
    }

    let line_of = |offset: usize| starts.partition_point(|&start| start <= offset).saturating_sub(1);
    let line_end = |line: usize| {
        starts
            .get(line + 1)
            .map_or(content_len, |next| next.saturating_sub(1))
    };

    let mut groups: Vec<Group> = Vec::new();
    let mut occurrences = 0;
    for (at, found) in text.match_indices(request.search.as_str()) {
        if request.limit != 0 && occurrences == request.limit {
            break;
        }
        occurrences += 1;
        let close = at + found.len();
        let consumes_final_terminator = close > content_len;
        let mut last = line_of(close.saturating_sub(1));
        if found.ends_with('\n') && !consumes_final_terminator {
            last += 1;
        }
        let first = line_of(at);
        match groups.last_mut() {
            Some(group) if group.last >= first => {
                group.last = group.last.max(last);
                group.matches.push((at, close));
                group.consumes_final_terminator |= consumes_final_terminator;
            }
            _ => groups.push(Group {
                first,
                last,
                matches: vec![(at, close)],
                consumes_final_terminator,
            }),
        }
    }

    let mut edits = Vec::with_capacity(groups.len());
    for group in groups {
        let base = starts.get(group.first).copied().unwrap_or_default();
        let end = line_end(group.last);
        let mut rewritten = String::new();
        let mut cursor = base;
        for (at, close) in group.matches {
            rewritten.push_str(text.get(cursor..at).unwrap_or_default());
            rewritten.push_str(&request.replace);
            cursor = close;
        }
        rewritten.push_str(text.get(cursor..end).unwrap_or_default());
        let range = LineRange::new(group.first + 1, group.last + 1)
            .map_err(|error| FileError::from_text(path, error))?;
        edits.push(rewrite(range, &rewritten, group.consumes_final_terminator));
    }

    Ok(Derived { edits, occurrences })
}

fn rewrite(range: LineRange, rewritten: &str, consumes_final_terminator: bool) -> Edit {
    if !consumes_final_terminator {
        let lines = rewritten.split('\n').map(str::to_owned).collect();
        return Edit::derived(range, lines, false);
    }
    if rewritten.is_empty() {
        return Edit::derived(range, Vec::new(), false);
    }
    match rewritten.strip_suffix('\n') {
        Some(body) => Edit::derived(range, body.split('\n').map(str::to_owned).collect(), false),
        None => Edit::derived(range, rewritten.split('\n').map(str::to_owned).collect(), true),
    }
}
