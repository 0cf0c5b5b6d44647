//! `read_range` and `read_context`.

use serde::Deserialize;
use serde_json::Value;
use spiderfs_file::{read_context, read_range};
use spiderfs_text::LineRange;

use super::{ToolContext, to_result};
use crate::dispatch::errors::DispatchError;

pub(crate) const READ_RANGE: &str = "read_range";
pub(crate) const READ_CONTEXT: &str = "read_context";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReadRangeArgs {
    path: String,
    line_start: usize,
    line_end: usize,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReadContextArgs {
    path: String,
    line: usize,
    #[serde(default)]
    before: usize,
    #[serde(default)]
    after: usize,
    #[serde(default)]
    encoding: Option<String>,
}

pub(crate) fn range(tools: &ToolContext, args: ReadRangeArgs) -> Result<Value, DispatchError> {
    let path = tools.resolve(READ_RANGE, &args.path)?;
    let options = tools.text_options(args.encoding.as_deref())?;
    let lines = LineRange::new(args.line_start, args.line_end)
        .map_err(|error| DispatchError::invalid_arguments(READ_RANGE, error.to_string()))?;
    to_result(&read_range(&path, lines, options)?)
}

pub(crate) fn context(tools: &ToolContext, args: ReadContextArgs) -> Result<Value, DispatchError> {
    let path = tools.resolve(READ_CONTEXT, &args.path)?;
    let options = tools.text_options(args.encoding.as_deref())?;
    to_result(&read_context(&path, args.line, args.before, args.after, options)?)
}
