//! Fuzzy file location: root selection, candidate walk and ranking.
//!
//! Backends differ only in how they decide which candidates match. The
//! external backend asks `fzf --filter` and the native backend applies
//! [`ranking::is_candidate`]; every survivor is then scored and ranked here
//! so both produce the same hits in the same order.

pub(crate) mod ranking;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SearchError;
use crate::model::{LocateQuery, LocatorHit};
use crate::walk::{Entry, walk};

use ranking::{Ranked, TopK};

/// Hits returned when the caller gives no limit.
pub const DEFAULT_MAX_RESULTS: usize = 5;

const LOCATOR_TARGET: &str = "spiderfs_search::locator";

/// Roots searched when a query names none.
///
/// Unix systems have a single tree rooted at `/`. Windows has one tree per
/// volume, so every existing drive root is returned and the hits from all of
/// them are ranked together.
#[must_use]
pub fn default_roots() -> Vec<PathBuf> {
    platform_roots()
}

#[cfg(windows)]
fn platform_roots() -> Vec<PathBuf> {
    (b'A'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", char::from(letter))))
        .filter(|root| root.exists())
        .collect()
}

#[cfg(not(windows))]
fn platform_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

/// A path that may be offered to the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    /// Path as reported to the caller.
    pub(crate) path: String,
    /// Path relative to its root with `/` separators; this is what matches.
    pub(crate) relative: String,
    pub(crate) is_dir: bool,
}

impl Candidate {
    fn from_entry(root: &Path, entry: Entry, include_dirs: bool) -> Option<Self> {
        if entry.depth == 0 || (entry.is_dir && !include_dirs) {
            return None;
        }
        let relative = entry
            .path
            .strip_prefix(root)
            .ok()?
            .to_string_lossy()
            .replace('\\', "/");
        Some(Self {
            path: entry.path.to_string_lossy().into_owned(),
            relative,
            is_dir: entry.is_dir,
        })
    }

    fn depth(&self) -> usize {
        self.relative.matches('/').count() + 1
    }
}

/// Walks every root of `query`, yielding candidates lazily.
///
/// An explicit root must be readable. Default roots that cannot be read are
/// skipped, and the walk fails only when none can be read.
pub(crate) fn candidates(
    query: &LocateQuery,
) -> Result<impl Iterator<Item = Candidate> + use<>, SearchError> {
    let explicit = query.root().map(Path::to_path_buf);
    let roots = explicit.clone().map_or_else(default_roots, |root| vec![root]);
    let mut walks = Vec::with_capacity(roots.len());
    let mut last_error = None;
    for root in roots {
        match walk(&root) {
            Ok(entries) => walks.push((root, entries)),
            Err(error) if explicit.is_none() => {
                debug!(
                    target: LOCATOR_TARGET,
                    root = %root.display(),
                    %error,
                    "skipping unreadable root"
                );
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }
    if walks.is_empty() {
        return Err(last_error.unwrap_or_else(|| {
            SearchError::unavailable("locator", "no readable filesystem roots")
        }));
    }
    let include_dirs = query.include_dirs();
    Ok(walks.into_iter().flat_map(move |(root, entries)| {
        entries.filter_map(move |entry| Candidate::from_entry(&root, entry, include_dirs))
    }))
}

/// Scores the candidates that passed a backend's filter and keeps the best.
pub(crate) fn rank<I>(query: &LocateQuery, matched: I) -> Vec<LocatorHit>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut top = TopK::new(query.max_results());
    for candidate in matched {
        if let Some(score) = ranking::score(query.pattern(), &candidate.relative) {
            top.push(Ranked {
                score,
                depth: candidate.depth(),
                is_dir: candidate.is_dir,
                path: candidate.path,
            });
        }
    }
    top.into_hits()
}
