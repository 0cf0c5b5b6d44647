//! In-process backend built on `regex` and `ignore`.
//!
//! It reproduces ripgrep's observable behaviour for the flags the external
//! backend passes: lines split on `\n` only, a UTF-8 byte-order mark is
//! stripped, UTF-16 with a byte-order mark or an explicit encoding is
//! transcoded to UTF-8 before matching, and byte offsets are measured in the
//! searched text.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use regex::bytes::Regex;
use spiderfs_text::{DecodePolicy, TextEncoding, decode};
use tracing::debug;

use crate::backend::SearchBackend;
use crate::error::SearchError;
use crate::locator::{self, ranking};
use crate::model::{ContentQuery, LocateQuery, LocatorHit, SearchMatch, SearchResult};
use crate::walk;

const NATIVE_TARGET: &str = "spiderfs_search::native";

/// Pure in-process search and location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl SearchBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn search(&self, query: &ContentQuery) -> Result<SearchResult, SearchError> {
        let regex = query.validate()?;
        let mut matches = Vec::new();
        for path in walk::files(query.scope())? {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(error) if path == query.scope() => return Err(SearchError::io(path, error)),
                Err(error) => {
                    debug!(
                        target: NATIVE_TARGET,
                        path = %path.display(),
                        %error,
                        "skipping unreadable file"
                    );
                    continue;
                }
            };
            let text = searchable(&bytes, query.encoding());
            search_lines(&regex, &path, &text, query.max_matches_per_file(), &mut matches);
        }
        debug!(target: NATIVE_TARGET, matches = matches.len(), "content search finished");
        Ok(SearchResult::from_unsorted(matches))
    }

    fn locate(&self, query: &LocateQuery) -> Result<Vec<LocatorHit>, SearchError> {
        query.validate()?;
        let pattern = query.pattern();
        let matched = locator::candidates(query)?
            .filter(|candidate| ranking::is_candidate(pattern, &candidate.relative));
        Ok(locator::rank(query, matched))
    }
}

/// Bytes the regex runs over, after byte-order-mark handling and optional
/// transcoding.
fn searchable(bytes: &[u8], explicit: Option<TextEncoding>) -> Cow<'_, [u8]> {
    if let Some((encoding, bom)) = TextEncoding::sniff_bom(bytes) {
        let body = bytes.get(bom..).unwrap_or_default();
        if encoding == TextEncoding::utf8() {
            return Cow::Borrowed(body);
        }
        return Cow::Owned(transcode(body, encoding));
    }
    match explicit {
        Some(encoding) => Cow::Owned(transcode(bytes, encoding)),
        None => Cow::Borrowed(bytes),
    }
}

fn transcode(bytes: &[u8], encoding: TextEncoding) -> Vec<u8> {
    decode(bytes, encoding, DecodePolicy::Replace)
        .map(|text| text.into_owned().into_bytes())
        .unwrap_or_default()
}

fn search_lines(regex: &Regex, path: &Path, text: &[u8], cap: usize, out: &mut Vec<SearchMatch>) {
    let display = path.to_string_lossy();
    let mut offset = 0u64;
    let mut found = 0usize;
    for (index, line) in text.split_inclusive(|byte| *byte == b'\n').enumerate() {
        let start = offset;
        offset += line.len() as u64;
        let body = line.strip_suffix(b"\n").unwrap_or(line);
        if !regex.is_match(body) {
            continue;
        }
        let content = body.strip_suffix(b"\r").unwrap_or(body);
        out.push(SearchMatch {
            path: display.clone().into_owned(),
            line_number: index + 1,
            line_content: String::from_utf8_lossy(content).into_owned(),
            byte_offset: Some(start),
        });
        found += 1;
        if found >= cap {
            break;
        }
    }
}
