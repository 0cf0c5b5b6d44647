//! Filesystem access used by write transactions.
//!
//! The transaction only touches the disk through [`FileStore`], so tests can
//! substitute a store that fails at a chosen point.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::NamedTempFile;

/// Disk operations a write transaction performs.
pub trait FileStore: Send + Sync {
    /// Reads the whole file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; `NotFound` means the file is absent.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Current permissions of an existing file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn permissions(&self, path: &Path) -> io::Result<Permissions>;

    /// Writes the side-file copy of the original content.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn write_backup(&self, backup: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Atomically replaces `path` with `bytes`, applying `permissions` when
    /// given. Observers see either the old file or the new one.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn replace(&self, path: &Path, bytes: &[u8], permissions: Option<Permissions>) -> io::Result<()>;

    /// Deletes `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`FileStore`] over the local filesystem.
///
/// Replacement writes a temporary file in the target's directory, syncs it
/// and renames it over the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn permissions(&self, path: &Path) -> io::Result<Permissions> {
        fs::metadata(path).map(|metadata| metadata.permissions())
    }

    fn write_backup(&self, backup: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(backup)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn replace(&self, path: &Path, bytes: &[u8], permissions: Option<Permissions>) -> io::Result<()> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(bytes)?;
        if let Some(mode) = permissions {
            temp.as_file().set_permissions(mode)?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|error| error.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// When an injected fault fires relative to the real operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail without touching the disk.
    Before,
    /// Perform the operation, then report failure.
    After,
}

/// Local store that fails chosen operations.
///
/// Exists for tests and behaviour specs that need to reach the rollback
/// paths deterministically.
#[derive(Debug, Default)]
pub struct FaultInjectingStore {
    inner: LocalFileStore,
    backup_fault: Option<Fault>,
    replace_faults: Vec<(usize, Fault)>,
    replace_calls: AtomicUsize,
}

impl FaultInjectingStore {
    /// A store with no faults configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every side-file backup fail.
    #[must_use]
    pub fn failing_backup(mut self, fault: Fault) -> Self {
        self.backup_fault = Some(fault);
        self
    }

    /// Makes the `call`-th replacement (one-based) fail. The first
    /// replacement of a transaction is the write and the second, if any, is
    /// the restore.
    #[must_use]
    pub fn failing_replace(mut self, call: usize, fault: Fault) -> Self {
        self.replace_faults.push((call, fault));
        self
    }

    /// Replacements attempted so far.
    #[must_use]
    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }

    fn injected(operation: &str) -> io::Error {
        io::Error::other(format!("injected {operation} failure"))
    }
}

impl FileStore for FaultInjectingStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn permissions(&self, path: &Path) -> io::Result<Permissions> {
        self.inner.permissions(path)
    }

    fn write_backup(&self, backup: &Path, bytes: &[u8]) -> io::Result<()> {
        match self.backup_fault {
            None => self.inner.write_backup(backup, bytes),
            Some(Fault::Before) => Err(Self::injected("backup")),
            Some(Fault::After) => {
                self.inner.write_backup(backup, bytes)?;
                Err(Self::injected("backup"))
            }
        }
    }

    fn replace(&self, path: &Path, bytes: &[u8], permissions: Option<Permissions>) -> io::Result<()> {
        let call = self.replace_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fault = self
            .replace_faults
            .iter()
            .find(|(nth, _)| *nth == call)
            .map(|(_, fault)| *fault);
        match fault {
            None => self.inner.replace(path, bytes, permissions),
            Some(Fault::Before) => Err(Self::injected("write")),
            Some(Fault::After) => {
                self.inner.replace(path, bytes, permissions)?;
                Err(Self::injected("write"))
            }
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path)
    }
}
