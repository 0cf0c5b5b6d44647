//! `search_content` and `fuzzy_file_search`.

use serde::Deserialize;
use serde_json::Value;
use spiderfs_search::{ContentQuery, LocateQuery};
use spiderfs_text::TextEncoding;
use tracing::debug;

use super::{ToolContext, to_result};
use crate::dispatch::errors::DispatchError;
use crate::dispatch::router::DISPATCH_TARGET;

pub(crate) const SEARCH_CONTENT: &str = "search_content";
pub(crate) const FUZZY_FILE_SEARCH: &str = "fuzzy_file_search";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SearchContentArgs {
    path: String,
    pattern: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    max_matches: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FuzzyFileSearchArgs {
    pattern: String,
    #[serde(default)]
    root_path: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default = "include_dirs_default")]
    include_dirs: bool,
}

const fn include_dirs_default() -> bool {
    true
}

pub(crate) fn search_content(
    tools: &ToolContext,
    args: SearchContentArgs,
) -> Result<Value, DispatchError> {
    let scope = tools.resolve(SEARCH_CONTENT, &args.path)?;
    let encoding = args
        .encoding
        .as_deref()
        .map(TextEncoding::for_label)
        .transpose()
        .map_err(|error| DispatchError::invalid_arguments(SEARCH_CONTENT, error.to_string()))?;
    let query = ContentQuery::new(args.pattern, scope)
        .with_encoding(encoding)
        .with_max_matches_per_file(args.max_matches.unwrap_or(tools.max_matches_per_file()));
    let result = tools.search().search(&query)?;
    debug!(
        target: DISPATCH_TARGET,
        scope = %query.scope().display(),
        matches = result.len(),
        "content search finished"
    );
    to_result(&result)
}

pub(crate) fn fuzzy_file_search(
    tools: &ToolContext,
    args: FuzzyFileSearchArgs,
) -> Result<Value, DispatchError> {
    let root = args
        .root_path
        .as_deref()
        .map(|root| tools.resolve(FUZZY_FILE_SEARCH, root))
        .transpose()?;
    let query = LocateQuery::new(args.pattern)
        .with_root(root)
        .with_max_results(args.max_results.unwrap_or(tools.locator_max_results()))
        .with_include_dirs(args.include_dirs);
    let hits = tools.search().locate(&query)?;
    to_result(&hits)
}
