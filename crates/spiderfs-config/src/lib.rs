//! Layered configuration for the spiderfs tool server.
//!
//! Values are merged by `ortho_config` with the precedence built-in defaults,
//! then a discovered or `--config-path` TOML file, then `SPIDERFS_*`
//! environment variables, then command-line flags. Every field carries a
//! serde default so a bare invocation yields a usable [`Config`].

mod defaults;
mod logging;
mod modes;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use spiderfs_text::DecodePolicy;
use thiserror::Error;

pub use defaults::*;
pub use logging::{LogFormat, LogFormatParseError};
pub use modes::{BackupRetention, SearchBackendMode};

/// Runtime configuration shared by the server and its core crates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SPIDERFS")]
pub struct Config {
    /// Tracing filter expression, e.g. `info` or `spiderfs_file=debug`.
    #[serde(default = "default_log_filter_string")]
    log_filter: String,
    /// Output format of the log sink.
    #[serde(default = "default_log_format")]
    log_format: LogFormat,
    /// Directory that relative request paths resolve against.
    #[serde(default)]
    base_dir: Option<Utf8PathBuf>,
    /// Whether external search tools may be used.
    #[serde(default = "default_search_backend")]
    search_backend: SearchBackendMode,
    /// Command used for regex content search.
    #[serde(default = "default_ripgrep_command")]
    ripgrep_command: String,
    /// Command used to prefilter fuzzy path matches.
    #[serde(default = "default_fzf_command")]
    fzf_command: String,
    /// Milliseconds an external search tool may run.
    #[serde(default = "default_search_timeout_ms")]
    search_timeout_ms: u64,
    /// Matches reported per file during content search.
    #[serde(default = "default_max_matches_per_file")]
    max_matches_per_file: usize,
    /// Default number of fuzzy search hits.
    #[serde(default = "default_locator_max_results")]
    locator_max_results: usize,
    /// Decoding policy applied to reads and searches.
    #[serde(default = "default_decode_policy")]
    decode_policy: DecodePolicy,
    /// Whether backup side files survive a committed write.
    #[serde(default = "default_backup_retention")]
    backup_retention: BackupRetention,
    /// Suffix used to name backup side files.
    #[serde(default = "default_backup_suffix")]
    backup_suffix: String,
    /// Lines per streamed chunk when the request gives none.
    #[serde(default = "default_stream_chunk_lines")]
    stream_chunk_lines: usize,
    /// Bytes per streamed chunk when the request gives none.
    #[serde(default = "default_stream_chunk_bytes")]
    stream_chunk_bytes: usize,
}

/// Semantic problems found after the layers were merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric setting that must be positive was zero.
    #[error("configuration value '{field}' must be greater than zero")]
    ZeroValue {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The backup suffix would make the backup overwrite its source.
    #[error("configuration value 'backup_suffix' must not be empty")]
    EmptyBackupSuffix,
    /// The base directory is not absolute.
    #[error("configuration value 'base_dir' must be absolute, got '{path}'")]
    RelativeBaseDir {
        /// Offending path.
        path: Utf8PathBuf,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            base_dir: None,
            search_backend: default_search_backend(),
            ripgrep_command: default_ripgrep_command(),
            fzf_command: default_fzf_command(),
            search_timeout_ms: default_search_timeout_ms(),
            max_matches_per_file: default_max_matches_per_file(),
            locator_max_results: default_locator_max_results(),
            decode_policy: default_decode_policy(),
            backup_retention: default_backup_retention(),
            backup_suffix: default_backup_suffix(),
            stream_chunk_lines: default_stream_chunk_lines(),
            stream_chunk_bytes: default_stream_chunk_bytes(),
        }
    }
}

impl Config {
    /// Checks invariants the individual layers cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("search_timeout_ms", self.search_timeout_ms == 0),
            ("max_matches_per_file", self.max_matches_per_file == 0),
            ("locator_max_results", self.locator_max_results == 0),
            ("stream_chunk_lines", self.stream_chunk_lines == 0),
            ("stream_chunk_bytes", self.stream_chunk_bytes == 0),
        ];
        if let Some((field, _)) = positive.into_iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::ZeroValue { field });
        }
        if self.backup_suffix.is_empty() {
            return Err(ConfigError::EmptyBackupSuffix);
        }
        if let Some(path) = self.base_dir.as_ref().filter(|path| path.is_relative()) {
            return Err(ConfigError::RelativeBaseDir { path: path.clone() });
        }
        Ok(())
    }

    /// Returns a copy rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<Utf8PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Returns a copy with the given search backend mode.
    #[must_use]
    pub const fn with_search_backend(mut self, mode: SearchBackendMode) -> Self {
        self.search_backend = mode;
        self
    }

    /// Returns a copy with the given backup retention.
    #[must_use]
    pub const fn with_backup_retention(mut self, retention: BackupRetention) -> Self {
        self.backup_retention = retention;
        self
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Directory that relative request paths resolve against.
    #[must_use]
    pub fn base_dir(&self) -> Option<&Utf8Path> {
        self.base_dir.as_deref()
    }

    /// Search backend selection.
    #[must_use]
    pub const fn search_backend(&self) -> SearchBackendMode {
        self.search_backend
    }

    /// Ripgrep executable.
    #[must_use]
    pub fn ripgrep_command(&self) -> &str {
        &self.ripgrep_command
    }

    /// Fzf executable.
    #[must_use]
    pub fn fzf_command(&self) -> &str {
        &self.fzf_command
    }

    /// Time an external search tool may run.
    #[must_use]
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// Per-file match cap for content search.
    #[must_use]
    pub const fn max_matches_per_file(&self) -> usize {
        self.max_matches_per_file
    }

    /// Default fuzzy search result count.
    #[must_use]
    pub const fn locator_max_results(&self) -> usize {
        self.locator_max_results
    }

    /// Decoding policy for reads and searches.
    #[must_use]
    pub const fn decode_policy(&self) -> DecodePolicy {
        self.decode_policy
    }

    /// Backup retention after commit.
    #[must_use]
    pub const fn backup_retention(&self) -> BackupRetention {
        self.backup_retention
    }

    /// Suffix for backup side files.
    #[must_use]
    pub fn backup_suffix(&self) -> &str {
        &self.backup_suffix
    }

    /// Default lines per streamed chunk.
    #[must_use]
    pub const fn stream_chunk_lines(&self) -> usize {
        self.stream_chunk_lines
    }

    /// Default bytes per streamed chunk.
    #[must_use]
    pub const fn stream_chunk_bytes(&self) -> usize {
        self.stream_chunk_bytes
    }
}
