//! Content search and fuzzy file location behind one backend contract.
//!
//! Two implementations of [`SearchBackend`] exist: [`ExternalBackend`]
//! drives `rg` and `fzf` as short-lived child processes, [`NativeBackend`]
//! does the same work in process with `regex` and `ignore`. Both walk the
//! same tree, apply the same per-file cap and hand candidate paths to the
//! same ranking code, so their results are interchangeable.
//! [`SearchDispatcher`] checks for the external tools once, prefers them
//! when present and falls back per call on absence, failure or timeout.

mod backend;
mod dispatcher;
mod error;
mod locator;
mod model;
mod process;
mod walk;

pub use backend::{Availability, ExternalBackend, NativeBackend, SearchBackend};
pub use dispatcher::{BackendSelection, SearchDispatcher, SearchSettings};
pub use error::SearchError;
pub use locator::{DEFAULT_MAX_RESULTS, default_roots};
pub use model::{
    ContentQuery, DEFAULT_MAX_MATCHES_PER_FILE, LocateQuery, LocatorHit, SearchMatch, SearchResult,
};
