//! Queries and results shared by every backend.

use std::path::{Path, PathBuf};

use regex::bytes::Regex;
use serde::Serialize;
use spiderfs_text::TextEncoding;

use crate::error::SearchError;
use crate::locator::DEFAULT_MAX_RESULTS;

/// Matches reported per file unless the query says otherwise.
pub const DEFAULT_MAX_MATCHES_PER_FILE: usize = 1000;

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// File holding the match, as reached from the query scope.
    pub path: String,
    /// One-based line number.
    pub line_number: usize,
    /// Line text without its terminator.
    pub line_content: String,
    /// Offset of the line's first byte in the searched text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
}

/// Matches ordered by path, then line number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchResult {
    matches: Vec<SearchMatch>,
}

impl SearchResult {
    /// Sorts `matches` into the canonical order.
    #[must_use]
    pub fn from_unsorted(mut matches: Vec<SearchMatch>) -> Self {
        matches.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then(a.line_number.cmp(&b.line_number))
        });
        Self { matches }
    }

    /// Matches in canonical order.
    #[must_use]
    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    /// Number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// True when nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Consumes the result, returning the matches.
    #[must_use]
    pub fn into_matches(self) -> Vec<SearchMatch> {
        self.matches
    }
}

/// One ranked path returned by fuzzy location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatorHit {
    /// Matching path.
    pub path: String,
    /// True when the path is a directory.
    pub is_directory: bool,
    /// Relevance; higher is better.
    pub score: f64,
}

/// Parameters of a regex content search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pattern: String,
    scope: PathBuf,
    encoding: Option<TextEncoding>,
    max_matches_per_file: usize,
}

impl ContentQuery {
    /// Searches `scope`, a file or a directory, for `pattern`.
    pub fn new(pattern: impl Into<String>, scope: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: scope.into(),
            encoding: None,
            max_matches_per_file: DEFAULT_MAX_MATCHES_PER_FILE,
        }
    }

    /// Decodes files from `encoding` before matching.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Option<TextEncoding>) -> Self {
        self.encoding = encoding.filter(|candidate| *candidate != TextEncoding::utf8());
        self
    }

    /// Caps the matches reported per file.
    #[must_use]
    pub const fn with_max_matches_per_file(mut self, cap: usize) -> Self {
        self.max_matches_per_file = cap;
        self
    }

    /// Regex pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// File or directory searched.
    #[must_use]
    pub fn scope(&self) -> &Path {
        &self.scope
    }

    /// Transcoding applied before matching; `None` searches raw bytes.
    #[must_use]
    pub const fn encoding(&self) -> Option<TextEncoding> {
        self.encoding
    }

    /// Per-file match cap.
    #[must_use]
    pub const fn max_matches_per_file(&self) -> usize {
        self.max_matches_per_file
    }

    /// Checks the pattern and scope, returning the compiled regex.
    ///
    /// Patterns containing a line feed are rejected: matching is per line,
    /// so they could never match and external tools refuse them outright.
    pub(crate) fn validate(&self) -> Result<Regex, SearchError> {
        if self.max_matches_per_file == 0 {
            return Err(SearchError::InvalidParameter {
                parameter: "max_matches_per_file",
                message: String::from("must be greater than zero"),
            });
        }
        if self.pattern.contains('\n') {
            return Err(SearchError::InvalidPattern {
                pattern: self.pattern.clone(),
                message: String::from("patterns must not contain a line feed"),
            });
        }
        let regex = Regex::new(&self.pattern).map_err(|error| SearchError::InvalidPattern {
            pattern: self.pattern.clone(),
            message: error.to_string(),
        })?;
        if !self.scope.exists() {
            return Err(SearchError::NotFound {
                path: self.scope.clone(),
            });
        }
        Ok(regex)
    }
}

/// Parameters of a fuzzy path search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateQuery {
    pattern: String,
    root: Option<PathBuf>,
    max_results: usize,
    include_dirs: bool,
}

impl LocateQuery {
    /// Locates paths resembling `pattern` under the default roots.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            root: None,
            max_results: DEFAULT_MAX_RESULTS,
            include_dirs: true,
        }
    }

    /// Restricts the walk to `root`.
    #[must_use]
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    /// Keeps at most `max_results` hits.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Includes or excludes directories from the hits.
    #[must_use]
    pub const fn with_include_dirs(mut self, include_dirs: bool) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    /// Pattern matched against relative paths.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Explicit root, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Result cap.
    #[must_use]
    pub const fn max_results(&self) -> usize {
        self.max_results
    }

    /// Whether directories may be returned.
    #[must_use]
    pub const fn include_dirs(&self) -> bool {
        self.include_dirs
    }

    pub(crate) fn validate(&self) -> Result<(), SearchError> {
        if self.pattern.trim().is_empty() {
            return Err(SearchError::InvalidPattern {
                pattern: self.pattern.clone(),
                message: String::from("pattern must not be empty"),
            });
        }
        if self.max_results == 0 {
            return Err(SearchError::InvalidParameter {
                parameter: "max_results",
                message: String::from("must be greater than zero"),
            });
        }
        match &self.root {
            Some(root) if !root.is_dir() => Err(SearchError::NotFound { path: root.clone() }),
            _ => Ok(()),
        }
    }
}
