//! Enumerated operating modes.
//!
//! Backup retention lives with the mutation engine and is re-exported here
//! so configuration callers need a single import.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use spiderfs_file::BackupRetention;

/// Which search implementation the server may use.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SearchBackendMode {
    /// Check for `rg` and `fzf` and use them when present.
    #[default]
    Auto,
    /// Never spawn external tools.
    Fallback,
}
