//! Backend selection and per-call fallback.
//!
//! Availability of the external tools is checked once per dispatcher, on
//! first use, and cached for its lifetime. A failed, missing or timed-out
//! external call is retried in process; only when the native backend also
//! fails does the caller see [`SearchError::Exhausted`].

use std::sync::OnceLock;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{Availability, ExternalBackend, NativeBackend, SearchBackend};
use crate::error::SearchError;
use crate::model::{ContentQuery, LocateQuery, LocatorHit, SearchResult};

const DISPATCH_TARGET: &str = "spiderfs_search::dispatcher";

/// Whether external tools may be used at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendSelection {
    /// Use `rg` and `fzf` when both answer `--version`.
    #[default]
    Auto,
    /// Always use the in-process backend.
    NativeOnly,
}

/// Construction parameters for [`SearchDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Backend selection policy.
    pub selection: BackendSelection,
    /// Ripgrep executable.
    pub ripgrep_command: String,
    /// Fzf executable.
    pub fzf_command: String,
    /// Budget for each external invocation.
    pub timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            selection: BackendSelection::Auto,
            ripgrep_command: String::from("rg"),
            fzf_command: String::from("fzf"),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Routes queries to the fastest backend that can serve them.
#[derive(Debug)]
pub struct SearchDispatcher {
    selection: BackendSelection,
    external: ExternalBackend,
    native: NativeBackend,
    availability: OnceLock<Availability>,
}

impl SearchDispatcher {
    /// Builds a dispatcher; no process is spawned until the first query.
    #[must_use]
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            selection: settings.selection,
            external: ExternalBackend::new(
                settings.ripgrep_command,
                settings.fzf_command,
                settings.timeout,
            ),
            native: NativeBackend,
            availability: OnceLock::new(),
        }
    }

    /// External tools usable by this dispatcher, probing on first call.
    #[must_use]
    pub fn availability(&self) -> Availability {
        match self.selection {
            BackendSelection::NativeOnly => Availability::default(),
            BackendSelection::Auto => *self.availability.get_or_init(|| self.external.detect_tools()),
        }
    }

    /// Regex content search.
    ///
    /// # Errors
    ///
    /// Returns validation and [`SearchError::NotFound`] errors as-is, and
    /// [`SearchError::Exhausted`] when no backend could complete.
    pub fn search(&self, query: &ContentQuery) -> Result<SearchResult, SearchError> {
        query.validate()?;
        if self.availability().ripgrep {
            match self.external.search(query) {
                Ok(result) => {
                    debug!(
                        target: DISPATCH_TARGET,
                        backend = self.external.name(),
                        matches = result.len(),
                        "content search served"
                    );
                    return Ok(result);
                }
                Err(error) if error.is_recoverable() => {
                    warn!(target: DISPATCH_TARGET, %error, "external search failed, falling back");
                }
                Err(error) => return Err(error),
            }
        }
        self.native.search(query).map_err(exhausted)
    }

    /// Fuzzy path location.
    ///
    /// # Errors
    ///
    /// As for [`SearchDispatcher::search`].
    pub fn locate(&self, query: &LocateQuery) -> Result<Vec<LocatorHit>, SearchError> {
        query.validate()?;
        if self.availability().fzf {
            match self.external.locate(query) {
                Ok(hits) => return Ok(hits),
                Err(error) if error.is_recoverable() => {
                    warn!(target: DISPATCH_TARGET, %error, "external locate failed, falling back");
                }
                Err(error) => return Err(error),
            }
        }
        self.native.locate(query).map_err(exhausted)
    }
}

fn exhausted(error: SearchError) -> SearchError {
    if error.is_recoverable() {
        SearchError::Exhausted {
            reason: error.to_string(),
        }
    } else {
        error
    }
}
