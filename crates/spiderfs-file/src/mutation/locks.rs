//! Process-wide exclusive locks keyed by canonical path.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};

use once_cell::sync::Lazy;

static GLOBAL: Lazy<PathLocks> = Lazy::new(PathLocks::default);

/// Registry of paths with a write in progress.
#[derive(Debug, Default)]
pub(crate) struct PathLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl PathLocks {
    /// The registry shared by every engine in the process.
    pub(crate) fn global() -> &'static Self {
        &GLOBAL
    }

    /// Blocks until no other guard holds `path`, then holds it.
    pub(crate) fn acquire(&self, path: &Path) -> PathGuard<'_> {
        let key = canonical_key(path);
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.clone());
        PathGuard { locks: self, key }
    }
}

/// Releases its path when dropped.
#[derive(Debug)]
pub(crate) struct PathGuard<'a> {
    locks: &'a PathLocks,
    key: PathBuf,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
        drop(held);
        self.locks.released.notify_all();
    }
}

/// Resolves symlinks and relative components so aliases of one file share
/// a lock. Files that do not exist yet are keyed by their canonical parent.
fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .and_then(|parent| fs::canonicalize(parent).ok());
    match (parent, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn same_path_waits_for_release() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("shared.txt");
        fs::write(&path, "x").expect("write");
        let locks = Arc::new(PathLocks::default());
        let entered = Arc::new(AtomicBool::new(false));

        let guard = locks.acquire(&path);
        let waiter = {
            let locks = Arc::clone(&locks);
            let entered = Arc::clone(&entered);
            let alias = dir.path().join(".").join("shared.txt");
            thread::spawn(move || {
                let _guard = locks.acquire(&alias);
                entered.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        waiter.join().expect("waiter finishes");
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn different_paths_do_not_block() {
        let dir = TempDir::new().expect("temp dir");
        let locks = PathLocks::default();
        let first = locks.acquire(&dir.path().join("a.txt"));
        let second = locks.acquire(&dir.path().join("b.txt"));
        drop((first, second));
    }

    #[test]
    fn missing_files_key_on_their_parent() {
        let dir = TempDir::new().expect("temp dir");
        let key = canonical_key(&dir.path().join("new.txt"));
        let parent = fs::canonicalize(dir.path()).expect("canonical dir");
        assert_eq!(key, parent.join("new.txt"));
    }
}
