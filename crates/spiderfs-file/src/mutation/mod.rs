//! Transactional writes with snapshot and rollback.
//!
//! Every write runs the same state machine: take the per-path lock, validate
//! and plan the new bytes, capture a snapshot, replace the file atomically
//! and, if that fails, restore the snapshot. Callers see either a committed
//! outcome or an error that says whether the original content is back.

mod edit;
mod locks;
mod replace;
mod state;
mod store;
mod transaction;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spiderfs_text::{LineIndex, WINDOW_BYTES, encode};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::FileError;
use crate::options::{EncodingRequest, TextOptions};

pub use edit::{Edit, EditSet};
pub use replace::Replacement;
pub use state::{MutationState, Step};
pub use store::{Fault, FaultInjectingStore, FileStore, LocalFileStore};

use transaction::{Backups, Change, execute};

const MUTATION_TARGET: &str = "spiderfs_file::mutation";

/// What happens to the side-file copy of the original content.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BackupRetention {
    /// Write the side file and report its path.
    #[default]
    Keep,
    /// Keep the snapshot in memory only.
    Discard,
}

/// Engine-wide write settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSettings {
    /// Side-file handling.
    pub retention: BackupRetention,
    /// Appended to the target path to name the side file.
    pub backup_suffix: String,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            retention: BackupRetention::Keep,
            backup_suffix: ".bak".to_owned(),
        }
    }
}

/// Result of [`MutationEngine::write_lines`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// Lines written by edits that changed content, or removed by deletions.
    pub lines_changed: usize,
    /// Side file holding the original content.
    pub backup_ref: Option<PathBuf>,
}

/// Result of [`MutationEngine::write_replace`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    /// Occurrences replaced.
    pub occurrences_replaced: usize,
    /// Side file holding the original content.
    pub backup_ref: Option<PathBuf>,
}

/// Result of [`MutationEngine::write_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Size of the file content after the call, byte-order mark included.
    pub bytes_written: u64,
    /// True when the file did not exist before.
    pub created: bool,
    /// Side file holding the original content.
    pub backup_ref: Option<PathBuf>,
}

/// Applies edits to files through the write transaction.
#[derive(Clone)]
pub struct MutationEngine {
    store: Arc<dyn FileStore>,
    settings: MutationSettings,
}

impl std::fmt::Debug for MutationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new(MutationSettings::default())
    }
}

impl MutationEngine {
    /// Engine writing to the local filesystem.
    #[must_use]
    pub fn new(settings: MutationSettings) -> Self {
        Self::with_store(Arc::new(LocalFileStore), settings)
    }

    /// Engine writing through `store`.
    #[must_use]
    pub const fn with_store(store: Arc<dyn FileStore>, settings: MutationSettings) -> Self {
        Self { store, settings }
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &MutationSettings {
        &self.settings
    }

    fn backups(&self) -> Backups<'_> {
        Backups {
            retention: self.settings.retention,
            suffix: &self.settings.backup_suffix,
        }
    }

    /// Replaces line ranges. All ranges refer to the file as it is before
    /// the call and must not overlap.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::ConflictingEdits`] or
    /// [`FileError::RangeOutOfBounds`] during validation, and the backup,
    /// write and rollback errors of the transaction.
    pub fn write_lines(
        &self,
        path: &Path,
        edits: Vec<Edit>,
        options: TextOptions,
    ) -> Result<WriteOutcome, FileError> {
        let executed = execute(path, self.store.as_ref(), self.backups(), |current| {
            let bytes = current.ok_or_else(|| FileError::NotFound {
                path: path.to_path_buf(),
            })?;
            let set = EditSet::new(edits)?;
            let index = LineIndex::from_bytes(bytes, options.encoding.resolve(head(bytes)));
            let applied = edit::apply(path, bytes, &index, &set)?;
            debug!(
                target: MUTATION_TARGET,
                path = %path.display(),
                edits = set.len(),
                lines_changed = applied.lines_changed,
                "edits planned"
            );
            Ok(Change {
                content: Some(applied.bytes),
                report: applied.lines_changed,
            })
        })?;
        Ok(WriteOutcome {
            lines_changed: executed.report,
            backup_ref: executed.backup_ref,
        })
    }

    /// Replaces literal occurrences of a search string.
    ///
    /// # Errors
    ///
    /// Returns decode failures under a strict decode policy and the
    /// transaction's errors.
    pub fn write_replace(
        &self,
        path: &Path,
        request: &Replacement,
        options: TextOptions,
    ) -> Result<ReplaceOutcome, FileError> {
        let executed = execute(path, self.store.as_ref(), self.backups(), |current| {
            let bytes = current.ok_or_else(|| FileError::NotFound {
                path: path.to_path_buf(),
            })?;
            let index = LineIndex::from_bytes(bytes, options.encoding.resolve(head(bytes)));
            let derived = replace::derive(path, bytes, &index, request, options.policy)?;
            if derived.occurrences == 0 {
                return Ok(Change::unchanged(0));
            }
            let set = EditSet::new(derived.edits)?;
            let applied = edit::apply(path, bytes, &index, &set)?;
            Ok(Change {
                content: Some(applied.bytes),
                report: derived.occurrences,
            })
        })?;
        Ok(ReplaceOutcome {
            occurrences_replaced: executed.report,
            backup_ref: executed.backup_ref,
        })
    }

    /// Writes `content` as the whole file, creating it if needed.
    ///
    /// With [`EncodingRequest::Default`] an existing byte-order mark selects
    /// the encoding and is kept; otherwise UTF-8 is written.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Validation`] when `path` is a directory,
    /// [`FileError::NotFound`] for a missing parent without
    /// `create_parents`, [`FileError::Encoding`] for unrepresentable text
    /// and the transaction's errors.
    pub fn write_file(
        &self,
        path: &Path,
        content: &str,
        encoding: EncodingRequest,
        create_parents: bool,
    ) -> Result<FileOutcome, FileError> {
        if path.is_dir() {
            return Err(FileError::validation(format!(
                "{} is a directory",
                path.display()
            )));
        }
        ensure_parent(path, create_parents)?;
        let executed = execute(path, self.store.as_ref(), self.backups(), |current| {
            let existing = current.unwrap_or_default();
            let target = encoding.resolve(head(existing));
            let mut bytes = existing
                .get(..target.bom_len(existing))
                .unwrap_or_default()
                .to_vec();
            let encoded = encode(content, target).map_err(|error| FileError::from_text(path, error))?;
            bytes.extend_from_slice(&encoded);
            let size = bytes.len() as u64;
            Ok(Change {
                content: Some(bytes),
                report: size,
            })
        })?;
        Ok(FileOutcome {
            bytes_written: executed.report,
            created: executed.created,
            backup_ref: executed.backup_ref,
        })
    }
}

fn head(bytes: &[u8]) -> &[u8] {
    bytes.get(..bytes.len().min(WINDOW_BYTES)).unwrap_or(bytes)
}

fn ensure_parent(path: &Path, create_parents: bool) -> Result<(), FileError> {
    let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    if !create_parents {
        return Err(FileError::NotFound {
            path: parent.to_path_buf(),
        });
    }
    fs::create_dir_all(parent).map_err(|error| FileError::Io {
        path: parent.to_path_buf(),
        source: Arc::new(error),
    })?;
    debug!(
        target: MUTATION_TARGET,
        path = %parent.display(),
        "created parent directories"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use rstest::{fixture, rstest};
    use spiderfs_text::{DecodePolicy, LineRange};
    use tempfile::TempDir;

    use super::*;

    struct Workspace {
        dir: TempDir,
        path: PathBuf,
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("notes.txt");
        fs::write(&path, "a\nb\nc\nd\n").expect("seed");
        Workspace { dir, path }
    }

    fn edit(start: usize, end: usize, lines: &[&str]) -> Edit {
        let range = LineRange::new(start, end).expect("valid range");
        Edit::new(range, lines.iter().map(ToString::to_string).collect()).expect("valid edit")
    }

    const fn strict() -> TextOptions {
        TextOptions::new(EncodingRequest::Default, DecodePolicy::Strict)
    }

    #[rstest]
    fn replaces_a_range(workspace: Workspace) {
        let engine = MutationEngine::default();
        let outcome = engine
            .write_lines(&workspace.path, vec![edit(2, 3, &["B"])], strict())
            .expect("write commits");
        assert_eq!(fs::read_to_string(&workspace.path).expect("read"), "a\nB\nd\n");
        assert_eq!(outcome.lines_changed, 1);
        let side = outcome.backup_ref.expect("backup kept");
        assert_eq!(fs::read_to_string(side).expect("read backup"), "a\nb\nc\nd\n");
    }

    #[rstest]
    fn no_op_edit_writes_nothing(workspace: Workspace) {
        let engine = MutationEngine::default();
        let outcome = engine
            .write_lines(&workspace.path, vec![edit(1, 1, &["a"])], strict())
            .expect("no-op commits");
        assert_eq!(outcome.lines_changed, 0);
        assert!(outcome.backup_ref.is_none());
        assert_eq!(fs::read_dir(workspace.dir.path()).expect("list").count(), 1);
    }

    #[rstest]
    fn conflicting_edits_leave_the_file_alone(workspace: Workspace) {
        let engine = MutationEngine::default();
        let error = engine
            .write_lines(
                &workspace.path,
                vec![edit(1, 2, &["x"]), edit(2, 3, &["y"])],
                strict(),
            )
            .expect_err("overlap rejected");
        assert!(matches!(error, FileError::ConflictingEdits { .. }));
        assert_eq!(
            fs::read_to_string(&workspace.path).expect("read"),
            "a\nb\nc\nd\n"
        );
    }

    #[rstest]
    fn missing_file_is_not_found(workspace: Workspace) {
        let engine = MutationEngine::default();
        let error = engine
            .write_lines(&workspace.dir.path().join("nope.txt"), vec![edit(1, 1, &[])], strict())
            .expect_err("missing file");
        assert!(matches!(error, FileError::NotFound { .. }));
    }

    #[rstest]
    fn failed_write_restores_the_original(workspace: Workspace) {
        let store = Arc::new(FaultInjectingStore::new().failing_replace(1, Fault::After));
        let engine = MutationEngine::with_store(store, MutationSettings::default());
        let error = engine
            .write_lines(&workspace.path, vec![edit(1, 4, &["z"])], strict())
            .expect_err("write fails");
        assert_eq!(error.restored(), Some(true));
        assert_eq!(
            fs::read_to_string(&workspace.path).expect("read"),
            "a\nb\nc\nd\n"
        );
    }

    #[rstest]
    fn replace_counts_occurrences(workspace: Workspace) {
        fs::write(&workspace.path, "x = 1\ny = x\n").expect("seed");
        let engine = MutationEngine::default();
        let request = Replacement::new("x", "width", 0).expect("request");
        let outcome = engine
            .write_replace(&workspace.path, &request, strict())
            .expect("replace commits");
        assert_eq!(outcome.occurrences_replaced, 2);
        assert_eq!(
            fs::read_to_string(&workspace.path).expect("read"),
            "width = 1\ny = width\n"
        );
    }

    #[rstest]
    fn replace_can_remove_the_final_line_with_its_newline(workspace: Workspace) {
        fs::write(&workspace.path, "a\nb\n").expect("seed");
        let engine = MutationEngine::default();
        let request = Replacement::new("b\n", "", 0).expect("request");
        let outcome = engine
            .write_replace(&workspace.path, &request, strict())
            .expect("replace commits");
        assert_eq!(outcome.occurrences_replaced, 1);
        assert_eq!(fs::read_to_string(&workspace.path).expect("read"), "a\n");
    }

    #[rstest]
    fn replace_sees_every_newline(workspace: Workspace) {
        fs::write(&workspace.path, "a\nb\n").expect("seed");
        let engine = MutationEngine::default();
        let request = Replacement::new("\n", "|", 0).expect("request");
        let outcome = engine
            .write_replace(&workspace.path, &request, strict())
            .expect("replace commits");
        assert_eq!(outcome.occurrences_replaced, 2);
        assert_eq!(fs::read_to_string(&workspace.path).expect("read"), "a|b|");
    }

    #[rstest]
    fn replace_without_matches_does_not_write(workspace: Workspace) {
        let engine = MutationEngine::default();
        let request = Replacement::new("zzz", "y", 0).expect("request");
        let outcome = engine
            .write_replace(&workspace.path, &request, strict())
            .expect("succeeds");
        assert_eq!(outcome.occurrences_replaced, 0);
        assert!(outcome.backup_ref.is_none());
    }

    #[rstest]
    fn write_file_creates_with_parents(workspace: Workspace) {
        let engine = MutationEngine::default();
        let target = workspace.dir.path().join("deep/er/new.txt");
        let outcome = engine
            .write_file(&target, "hello\n", EncodingRequest::Default, true)
            .expect("creates");
        assert!(outcome.created);
        assert_eq!(outcome.bytes_written, 6);
        assert!(outcome.backup_ref.is_none());
        assert_eq!(fs::read_to_string(&target).expect("read"), "hello\n");
    }

    #[rstest]
    fn write_file_needs_parent_unless_asked(workspace: Workspace) {
        let engine = MutationEngine::default();
        let target = workspace.dir.path().join("missing/new.txt");
        let error = engine
            .write_file(&target, "x", EncodingRequest::Default, false)
            .expect_err("parent missing");
        assert!(matches!(error, FileError::NotFound { .. }));
    }

    #[rstest]
    fn write_file_keeps_byte_order_mark(workspace: Workspace) {
        fs::write(&workspace.path, [0xEF, 0xBB, 0xBF, b'o', b'l', b'd']).expect("seed");
        let engine = MutationEngine::default();
        let outcome = engine
            .write_file(&workspace.path, "new", EncodingRequest::Default, false)
            .expect("overwrites");
        assert!(!outcome.created);
        assert_eq!(
            fs::read(&workspace.path).expect("read"),
            vec![0xEF, 0xBB, 0xBF, b'n', b'e', b'w']
        );
    }

    #[rstest]
    fn write_file_rejects_directories(workspace: Workspace) {
        let engine = MutationEngine::default();
        let error = engine
            .write_file(workspace.dir.path(), "x", EncodingRequest::Default, false)
            .expect_err("directory");
        assert!(matches!(error, FileError::Validation { .. }));
    }

    #[rstest]
    fn concurrent_writers_to_one_file_serialise(workspace: Workspace) {
        let engine = MutationEngine::new(MutationSettings {
            retention: BackupRetention::Discard,
            ..MutationSettings::default()
        });
        thread::scope(|scope| {
            for (line, text) in [(1, "A"), (2, "B"), (3, "C"), (4, "D")] {
                let writer = &engine;
                let target = &workspace.path;
                scope.spawn(move || {
                    writer
                        .write_lines(target, vec![edit(line, line, &[text])], strict())
                        .expect("write commits");
                });
            }
        });
        assert_eq!(
            fs::read_to_string(&workspace.path).expect("read"),
            "A\nB\nC\nD\n"
        );
    }

    #[rstest]
    fn writers_to_different_files_both_commit(workspace: Workspace) {
        let engine = MutationEngine::default();
        let other = workspace.dir.path().join("other.txt");
        fs::write(&other, "1\n").expect("seed");
        thread::scope(|scope| {
            scope.spawn(|| {
                engine
                    .write_lines(&workspace.path, vec![edit(1, 1, &["first"])], strict())
                    .expect("first commits");
            });
            scope.spawn(|| {
                engine
                    .write_lines(&other, vec![edit(1, 1, &["second"])], strict())
                    .expect("second commits");
            });
        });
        assert!(fs::read_to_string(&workspace.path).expect("read").starts_with("first\n"));
        assert_eq!(fs::read_to_string(&other).expect("read"), "second\n");
    }
}
