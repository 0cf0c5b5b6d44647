//! Request envelope parsing for the dispatch loop.
//!
//! A request line must be a JSON object. Its fields are kept as raw values so
//! that a request with a bad `tool` or bad arguments is still answered under
//! the caller's `id`.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::errors::DispatchError;

/// One parsed request line.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    /// Caller-chosen correlation value, echoed on every response line.
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    tool: Value,
    #[serde(default = "empty_arguments")]
    arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

impl ToolRequest {
    /// Parses a request line. Trailing whitespace, including the newline
    /// delimiter, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedJsonl`] for an empty line, invalid
    /// JSON or a value that is not an object.
    pub fn parse(line: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("empty request line"));
        }
        serde_json::from_slice(trimmed).map_err(|error| DispatchError::malformed(error.to_string()))
    }

    /// Requested tool name, trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedJsonl`] when `tool` is missing,
    /// empty or not a string.
    pub fn tool_name(&self) -> Result<&str, DispatchError> {
        self.tool
            .as_str()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DispatchError::malformed("'tool' must be a non-empty string"))
    }

    /// Deserialises the arguments object for `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidArguments`] when the arguments do not
    /// match the tool's schema.
    pub fn arguments<T: DeserializeOwned>(&self, tool: &'static str) -> Result<T, DispatchError> {
        T::deserialize(&self.arguments)
            .map_err(|error| DispatchError::invalid_arguments(tool, error.to_string()))
    }
}

/// Trims trailing ASCII whitespace from a byte slice.
pub(crate) fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |position| position + 1);
    bytes.get(..end).unwrap_or_default()
}
