use spiderfs_text::DecodePolicy;

use crate::logging::LogFormat;
use crate::modes::{BackupRetention, SearchBackendMode};

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Executable used for regex content search.
pub const DEFAULT_RIPGREP_COMMAND: &str = "rg";

/// Executable used to prefilter fuzzy path matches.
pub const DEFAULT_FZF_COMMAND: &str = "fzf";

/// Milliseconds an external search tool may run before it is killed.
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;

/// Matches reported per file before the search moves on.
pub const DEFAULT_MAX_MATCHES_PER_FILE: usize = 1000;

/// Hits returned by fuzzy file search when the caller gives no limit.
pub const DEFAULT_LOCATOR_MAX_RESULTS: usize = 5;

/// Suffix appended to a file name to form its backup path.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Lines per chunk for line streaming.
pub const DEFAULT_STREAM_CHUNK_LINES: usize = 1000;

/// Bytes per chunk for byte streaming.
pub const DEFAULT_STREAM_CHUNK_BYTES: usize = 8192;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default search backend selection.
#[must_use]
pub const fn default_search_backend() -> SearchBackendMode {
    SearchBackendMode::Auto
}

/// Owned ripgrep command for serde.
#[must_use]
pub fn default_ripgrep_command() -> String {
    DEFAULT_RIPGREP_COMMAND.to_owned()
}

/// Owned fzf command for serde.
#[must_use]
pub fn default_fzf_command() -> String {
    DEFAULT_FZF_COMMAND.to_owned()
}

/// Default external search timeout in milliseconds.
#[must_use]
pub const fn default_search_timeout_ms() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_MS
}

/// Default per-file match cap.
#[must_use]
pub const fn default_max_matches_per_file() -> usize {
    DEFAULT_MAX_MATCHES_PER_FILE
}

/// Default fuzzy search result count.
#[must_use]
pub const fn default_locator_max_results() -> usize {
    DEFAULT_LOCATOR_MAX_RESULTS
}

/// Default decoding policy for reads.
#[must_use]
pub const fn default_decode_policy() -> DecodePolicy {
    DecodePolicy::Strict
}

/// Default backup retention.
#[must_use]
pub const fn default_backup_retention() -> BackupRetention {
    BackupRetention::Keep
}

/// Owned backup suffix for serde.
#[must_use]
pub fn default_backup_suffix() -> String {
    DEFAULT_BACKUP_SUFFIX.to_owned()
}

/// Default lines per streamed chunk.
#[must_use]
pub const fn default_stream_chunk_lines() -> usize {
    DEFAULT_STREAM_CHUNK_LINES
}

/// Default bytes per streamed chunk.
#[must_use]
pub const fn default_stream_chunk_bytes() -> usize {
    DEFAULT_STREAM_CHUNK_BYTES
}
