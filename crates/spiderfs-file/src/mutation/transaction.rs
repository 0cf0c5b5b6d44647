//! Drives one write through the mutation states.
//!
//! The original bytes are held in memory for the whole transaction and a
//! SHA-256 of them taken before anything is written. Rollback restores the
//! in-memory copy and reads it back to prove the restore landed.

use std::fs::Permissions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::FileError;
use crate::mutation::BackupRetention;
use crate::mutation::locks::PathLocks;
use crate::mutation::state::{MutationState, Step};
use crate::mutation::store::FileStore;

const TRANSACTION_TARGET: &str = "spiderfs_file::mutation";

/// What validation decided to write.
#[derive(Debug)]
pub(crate) struct Change<T> {
    /// New file content; `None` when nothing needs writing.
    pub(crate) content: Option<Vec<u8>>,
    /// Operation-specific result handed back on commit.
    pub(crate) report: T,
}

impl<T> Change<T> {
    pub(crate) const fn unchanged(report: T) -> Self {
        Self {
            content: None,
            report,
        }
    }
}

/// Result of a committed transaction.
#[derive(Debug)]
pub(crate) struct Executed<T> {
    pub(crate) report: T,
    pub(crate) backup_ref: Option<PathBuf>,
    pub(crate) created: bool,
}

/// Side-file settings for one transaction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backups<'a> {
    pub(crate) retention: BackupRetention,
    pub(crate) suffix: &'a str,
}

impl Backups<'_> {
    fn side_file(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(self.suffix);
        PathBuf::from(name)
    }
}

struct Machine<'a> {
    path: &'a Path,
    state: MutationState,
}

impl<'a> Machine<'a> {
    const fn new(path: &'a Path) -> Self {
        Self {
            path,
            state: MutationState::Idle,
        }
    }

    fn advance(&mut self, step: Step) {
        let next = self.state.next(step);
        debug!(
            target: TRANSACTION_TARGET,
            path = %self.path.display(),
            from = %self.state,
            to = %next,
            "mutation state changed"
        );
        self.state = next;
    }
}

/// Original content captured before the write.
struct Snapshot {
    original: Option<Vec<u8>>,
    checksum: Option<Vec<u8>>,
    permissions: Option<Permissions>,
    side_file: Option<PathBuf>,
}

impl Snapshot {
    fn capture(
        path: &Path,
        original: Option<Vec<u8>>,
        store: &dyn FileStore,
        backups: Backups<'_>,
    ) -> Result<Self, (io::Error, Option<PathBuf>)> {
        let Some(bytes) = original else {
            return Ok(Self {
                original: None,
                checksum: None,
                permissions: None,
                side_file: None,
            });
        };
        let permissions = store.permissions(path).map_err(|error| (error, None))?;
        let side_file = match backups.retention {
            BackupRetention::Keep => {
                let side = backups.side_file(path);
                store
                    .write_backup(&side, &bytes)
                    .map_err(|error| (error, Some(side.clone())))?;
                Some(side)
            }
            BackupRetention::Discard => None,
        };
        Ok(Self {
            checksum: Some(Sha256::digest(&bytes).to_vec()),
            original: Some(bytes),
            permissions: Some(permissions),
            side_file,
        })
    }

    /// Puts the original back and verifies it by checksum.
    fn restore(&self, path: &Path, store: &dyn FileStore) -> Result<(), String> {
        let Some(bytes) = &self.original else {
            return match store.remove(path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(format!("could not remove the partially created file: {error}")),
            };
        };
        store
            .replace(path, bytes, self.permissions.clone())
            .map_err(|error| format!("could not rewrite the original content: {error}"))?;
        let restored = store
            .read(path)
            .map_err(|error| format!("could not read back the restored file: {error}"))?;
        let matches = self
            .checksum
            .as_deref()
            .is_some_and(|expected| Sha256::digest(&restored).as_slice() == expected);
        if matches {
            Ok(())
        } else {
            Err("restored content does not match the snapshot checksum".to_owned())
        }
    }
}

/// Runs `plan` and commits its result under the per-path lock.
///
/// `plan` receives the current content, or `None` when the file does not
/// exist, and decides what to write.
pub(crate) fn execute<T>(
    path: &Path,
    store: &dyn FileStore,
    backups: Backups<'_>,
    plan: impl FnOnce(Option<&[u8]>) -> Result<Change<T>, FileError>,
) -> Result<Executed<T>, FileError> {
    let _guard = PathLocks::global().acquire(path);
    let mut machine = Machine::new(path);
    machine.advance(Step::Succeeded);

    let original = match store.read(path) {
        Ok(bytes) => Some(bytes),
        Err(error) if error.kind() == io::ErrorKind::NotFound => None,
        Err(error) => {
            machine.advance(Step::Failed);
            return Err(FileError::read(path, error));
        }
    };
    let change = match plan(original.as_deref()) {
        Ok(change) => change,
        Err(failure) => {
            machine.advance(Step::Failed);
            return Err(failure);
        }
    };
    let Some(content) = change
        .content
        .filter(|content| original.as_deref() != Some(content.as_slice()))
    else {
        machine.advance(Step::Unchanged);
        return Ok(Executed {
            report: change.report,
            backup_ref: None,
            created: false,
        });
    };
    let created = original.is_none();
    machine.advance(Step::Succeeded);

    let snapshot = match Snapshot::capture(path, original, store, backups) {
        Ok(snapshot) => snapshot,
        Err((failure, partial)) => {
            machine.advance(Step::Failed);
            if let Some(side) = partial {
                discard_partial(&side, store);
            }
            machine.advance(Step::Succeeded);
            return Err(FileError::BackupFailed {
                path: path.to_path_buf(),
                source: Arc::new(failure),
            });
        }
    };
    machine.advance(Step::Succeeded);

    match store.replace(path, &content, snapshot.permissions.clone()) {
        Ok(()) => {
            machine.advance(Step::Succeeded);
            info!(
                target: TRANSACTION_TARGET,
                path = %path.display(),
                bytes = content.len(),
                created,
                "write committed"
            );
            Ok(Executed {
                report: change.report,
                backup_ref: snapshot.side_file,
                created,
            })
        }
        Err(failure) => {
            machine.advance(Step::Failed);
            warn!(
                target: TRANSACTION_TARGET,
                path = %path.display(),
                error = %failure,
                "write failed, restoring original"
            );
            let restored = snapshot.restore(path, store);
            machine.advance(if restored.is_ok() {
                Step::Succeeded
            } else {
                Step::Failed
            });
            match restored {
                Ok(()) => Err(FileError::WriteFailed {
                    path: path.to_path_buf(),
                    source: Arc::new(failure),
                }),
                Err(reason) => {
                    error!(
                        target: TRANSACTION_TARGET,
                        path = %path.display(),
                        reason = %reason,
                        "rollback failed"
                    );
                    Err(FileError::RollbackFailed {
                        path: path.to_path_buf(),
                        write_error: failure.to_string(),
                        reason,
                        backup: snapshot.side_file,
                    })
                }
            }
        }
    }
}

fn discard_partial(side: &Path, store: &dyn FileStore) {
    match store.remove(side) {
        Ok(()) => {}
        Err(failure) if failure.kind() == io::ErrorKind::NotFound => {}
        Err(failure) => warn!(
            target: TRANSACTION_TARGET,
            path = %side.display(),
            error = %failure,
            "could not remove partial backup"
        ),
    }
}
