//! Deterministic directory walk shared by search and location.
//!
//! Hidden entries are visited and ignore files are not honoured, matching
//! `rg --hidden --no-ignore`. Symbolic links are reported but not followed.
//! Unreadable entries below the root are skipped; an unreadable root is an
//! error because nothing useful can be returned from it.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::error::SearchError;

const WALK_TARGET: &str = "spiderfs_search::walk";

/// One visited path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) path: PathBuf,
    pub(crate) depth: usize,
    pub(crate) is_dir: bool,
    pub(crate) is_file: bool,
}

/// Walks `root` in file-name order, root first.
pub(crate) fn walk(root: &Path) -> Result<impl Iterator<Item = Entry> + use<>, SearchError> {
    if root.is_dir() {
        fs::read_dir(root).map_err(|error| SearchError::io(root, error))?;
    }
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    let entries = builder.build().filter_map(|result| match result {
        Ok(entry) => {
            let file_type = entry.file_type();
            Some(Entry {
                depth: entry.depth(),
                is_dir: file_type.is_some_and(|kind| kind.is_dir()),
                is_file: file_type.is_some_and(|kind| kind.is_file()),
                path: entry.into_path(),
            })
        }
        Err(error) => {
            debug!(target: WALK_TARGET, %error, "skipping unreadable entry");
            None
        }
    });
    Ok(entries)
}

/// Files under `root`, or `root` itself when it is a file.
pub(crate) fn files(root: &Path) -> Result<impl Iterator<Item = PathBuf> + use<>, SearchError> {
    let entries = walk(root)?
        .filter(|entry| entry.is_file || (entry.depth == 0 && !entry.is_dir))
        .map(|entry| entry.path);
    Ok(entries)
}
