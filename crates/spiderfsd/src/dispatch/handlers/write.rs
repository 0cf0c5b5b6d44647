//! `write_lines`, `write_replace` and `write_file`.
//!
//! Arguments are turned into validated edit values before the engine is
//! called, so a malformed request never reaches the write transaction.

use serde::Deserialize;
use serde_json::Value;
use spiderfs_file::{Edit, EncodingRequest, Replacement};
use spiderfs_text::LineRange;

use super::{ToolContext, to_result};
use crate::dispatch::errors::DispatchError;

pub(crate) const WRITE_LINES: &str = "write_lines";
pub(crate) const WRITE_REPLACE: &str = "write_replace";
pub(crate) const WRITE_FILE: &str = "write_file";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EditArgs {
    line_start: usize,
    line_end: usize,
    #[serde(default)]
    replacement: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WriteLinesArgs {
    path: String,
    edits: Vec<EditArgs>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WriteReplaceArgs {
    path: String,
    search_string: String,
    replacement: String,
    /// Zero or absent replaces every occurrence.
    #[serde(default)]
    max_replacements: usize,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WriteFileArgs {
    path: String,
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    create_parents: bool,
}

impl EditArgs {
    fn into_edit(self) -> Result<Edit, DispatchError> {
        let range = LineRange::new(self.line_start, self.line_end)
            .map_err(|error| DispatchError::invalid_arguments(WRITE_LINES, error.to_string()))?;
        Ok(Edit::new(range, self.replacement)?)
    }
}

pub(crate) fn lines(tools: &ToolContext, args: WriteLinesArgs) -> Result<Value, DispatchError> {
    let path = tools.resolve(WRITE_LINES, &args.path)?;
    let options = tools.text_options(args.encoding.as_deref())?;
    let edits = args
        .edits
        .into_iter()
        .map(EditArgs::into_edit)
        .collect::<Result<Vec<_>, _>>()?;
    to_result(&tools.engine().write_lines(&path, edits, options)?)
}

pub(crate) fn replace(tools: &ToolContext, args: WriteReplaceArgs) -> Result<Value, DispatchError> {
    let path = tools.resolve(WRITE_REPLACE, &args.path)?;
    let options = tools.text_options(args.encoding.as_deref())?;
    let request = Replacement::new(&args.search_string, &args.replacement, args.max_replacements)?;
    to_result(&tools.engine().write_replace(&path, &request, options)?)
}

pub(crate) fn file(tools: &ToolContext, args: WriteFileArgs) -> Result<Value, DispatchError> {
    let path = tools.resolve(WRITE_FILE, &args.path)?;
    let encoding = EncodingRequest::from_label(args.encoding.as_deref())?;
    to_result(&tools.engine().write_file(&path, &args.content, encoding, args.create_parents)?)
}
