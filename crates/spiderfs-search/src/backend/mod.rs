//! The search backend contract and its two implementations.

mod external;
mod native;

pub use external::{Availability, ExternalBackend};
pub use native::NativeBackend;

use crate::error::SearchError;
use crate::model::{ContentQuery, LocateQuery, LocatorHit, SearchResult};

/// Content search and fuzzy location over a directory tree.
///
/// Implementations must agree exactly: for the same filesystem state and
/// query they return the same matches in the same order. Queries reaching a
/// backend have already passed validation.
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Runs a regex search over every file in the query scope.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the backend cannot complete the search.
    fn search(&self, query: &ContentQuery) -> Result<SearchResult, SearchError>;

    /// Finds the paths most resembling the query pattern.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the backend cannot complete the walk.
    fn locate(&self, query: &LocateQuery) -> Result<Vec<LocatorHit>, SearchError>;
}
