//! Tool handlers and the state they share.
//!
//! Each handler deserialises its arguments, resolves paths against the
//! configured base directory and calls into the core crates. Results are
//! returned as JSON values; streaming handlers also push chunks through a
//! [`ChunkSink`] before returning their summary.

pub(crate) mod read;
pub(crate) mod search;
pub(crate) mod stream;
pub(crate) mod write;

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use spiderfs_config::{Config, SearchBackendMode};
use spiderfs_file::{EncodingRequest, MutationEngine, MutationSettings, TextOptions};
use spiderfs_search::{BackendSelection, SearchDispatcher, SearchSettings};
use spiderfs_text::DecodePolicy;

use super::errors::DispatchError;

/// Receives streamed chunks as they are produced.
pub(crate) type ChunkSink<'a> = dyn FnMut(Value) -> Result<(), DispatchError> + 'a;

/// Long-lived state behind every tool call.
#[derive(Debug)]
pub struct ToolContext {
    base_dir: Option<PathBuf>,
    search: SearchDispatcher,
    engine: MutationEngine,
    decode_policy: DecodePolicy,
    max_matches_per_file: usize,
    locator_max_results: usize,
    stream_chunk_lines: usize,
    stream_chunk_bytes: usize,
}

impl ToolContext {
    /// Builds the context described by `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let selection = match config.search_backend() {
            SearchBackendMode::Auto => BackendSelection::Auto,
            SearchBackendMode::Fallback => BackendSelection::NativeOnly,
        };
        Self {
            base_dir: config.base_dir().map(|dir| dir.as_std_path().to_path_buf()),
            search: SearchDispatcher::new(SearchSettings {
                selection,
                ripgrep_command: config.ripgrep_command().to_owned(),
                fzf_command: config.fzf_command().to_owned(),
                timeout: config.search_timeout(),
            }),
            engine: MutationEngine::new(MutationSettings {
                retention: config.backup_retention(),
                backup_suffix: config.backup_suffix().to_owned(),
            }),
            decode_policy: config.decode_policy(),
            max_matches_per_file: config.max_matches_per_file(),
            locator_max_results: config.locator_max_results(),
            stream_chunk_lines: config.stream_chunk_lines(),
            stream_chunk_bytes: config.stream_chunk_bytes(),
        }
    }

    /// Replaces the mutation engine, e.g. with one backed by a test store.
    #[must_use]
    pub fn with_engine(mut self, engine: MutationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Resolves a request path. Absolute paths pass through; relative ones
    /// join the base directory when one is configured.
    pub(crate) fn resolve(&self, tool: &'static str, path: &str) -> Result<PathBuf, DispatchError> {
        if path.trim().is_empty() {
            return Err(DispatchError::invalid_arguments(tool, "path must not be empty"));
        }
        let requested = Path::new(path);
        Ok(match &self.base_dir {
            Some(base) if requested.is_relative() => base.join(requested),
            _ => requested.to_path_buf(),
        })
    }

    /// Text options for an optional encoding label under the configured
    /// decode policy.
    pub(crate) fn text_options(&self, encoding: Option<&str>) -> Result<TextOptions, DispatchError> {
        Ok(TextOptions::new(
            EncodingRequest::from_label(encoding)?,
            self.decode_policy,
        ))
    }

    pub(crate) const fn search(&self) -> &SearchDispatcher {
        &self.search
    }

    pub(crate) const fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    pub(crate) const fn max_matches_per_file(&self) -> usize {
        self.max_matches_per_file
    }

    pub(crate) const fn locator_max_results(&self) -> usize {
        self.locator_max_results
    }

    pub(crate) const fn stream_chunk_lines(&self) -> usize {
        self.stream_chunk_lines
    }

    pub(crate) const fn stream_chunk_bytes(&self) -> usize {
        self.stream_chunk_bytes
    }
}

/// Serialises a handler result.
pub(crate) fn to_result<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    Ok(serde_json::to_value(value)?)
}
