//! Tool routing for request dispatch.
//!
//! The router maps a request's `tool` onto its handler, writes the handler's
//! result (and any streamed chunks) and converts recoverable failures into
//! `error` lines. Only output failures propagate to the caller.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::{debug, warn};

use super::errors::DispatchError;
use super::handlers::{ToolContext, read, search, stream, to_result, write};
use super::request::ToolRequest;
use super::response::ResponseWriter;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Tools offered by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Tool {
    /// Regex search over a file or directory.
    SearchContent,
    /// Fuzzy path lookup.
    FuzzyFileSearch,
    /// Bounded line range read.
    ReadRange,
    /// Lines around a target line.
    ReadContext,
    /// Chunked line stream.
    StreamLines,
    /// Chunked raw byte stream.
    StreamBytes,
    /// Transactional line edits.
    WriteLines,
    /// Transactional literal replacement.
    WriteReplace,
    /// Transactional whole-file write.
    WriteFile,
    /// Lists the tools above.
    ListTools,
}

impl Tool {
    /// Parses a tool name (case-sensitive).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownTool`] for names this server does not
    /// offer.
    pub fn parse(name: &str) -> Result<Self, DispatchError> {
        name.parse().map_err(|_| DispatchError::unknown_tool(name))
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// One-line description shown by `list_tools`.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::SearchContent => "Search a file or directory for a regular expression.",
            Self::FuzzyFileSearch => "Find paths that fuzzily match a pattern.",
            Self::ReadRange => "Read an inclusive, one-based range of lines.",
            Self::ReadContext => "Read a line with surrounding context.",
            Self::StreamLines => "Stream a file as chunks of decoded lines.",
            Self::StreamBytes => "Stream a file as chunks of base64-encoded bytes.",
            Self::WriteLines => "Replace or delete line ranges atomically.",
            Self::WriteReplace => "Replace literal text atomically.",
            Self::WriteFile => "Create or overwrite a whole file atomically.",
            Self::ListTools => "List the available tools.",
        }
    }

    /// True for tools that answer with `chunk` lines before their result.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::StreamLines | Self::StreamBytes)
    }
}

#[derive(Debug, Serialize)]
struct ToolDescriptor {
    name: &'static str,
    description: &'static str,
    streaming: bool,
}

/// Routes requests to tool handlers.
#[derive(Debug)]
pub struct ToolRouter {
    tools: ToolContext,
}

impl ToolRouter {
    /// Creates a router over the given context.
    #[must_use]
    pub const fn new(tools: ToolContext) -> Self {
        Self { tools }
    }

    /// Handles one request, writing its response lines.
    ///
    /// # Errors
    ///
    /// Returns an error only when a response cannot be written; handler
    /// failures become `error` lines.
    pub fn route<W: Write>(
        &self,
        request: &ToolRequest,
        writer: &mut ResponseWriter<W>,
    ) -> Result<(), DispatchError> {
        let outcome = request
            .tool_name()
            .and_then(Tool::parse)
            .and_then(|tool| self.invoke(tool, request, writer));
        match outcome {
            Ok(result) => writer.write_ok(&request.id, result),
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    id = %request.id,
                    kind = %error.kind(),
                    %error,
                    "request failed"
                );
                writer.write_error(&request.id, &error)
            }
        }
    }

    fn invoke<W: Write>(
        &self,
        tool: Tool,
        request: &ToolRequest,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Value, DispatchError> {
        debug!(target: DISPATCH_TARGET, id = %request.id, tool = tool.as_str(), "routing request");
        let name = tool.as_str();
        let tools = &self.tools;
        match tool {
            Tool::SearchContent => search::search_content(tools, request.arguments(name)?),
            Tool::FuzzyFileSearch => search::fuzzy_file_search(tools, request.arguments(name)?),
            Tool::ReadRange => read::range(tools, request.arguments(name)?),
            Tool::ReadContext => read::context(tools, request.arguments(name)?),
            Tool::StreamLines => {
                let args = request.arguments(name)?;
                stream::lines(tools, args, &mut |chunk| writer.write_chunk(&request.id, chunk))
            }
            Tool::StreamBytes => {
                let args = request.arguments(name)?;
                stream::bytes(tools, args, &mut |chunk| writer.write_chunk(&request.id, chunk))
            }
            Tool::WriteLines => write::lines(tools, request.arguments(name)?),
            Tool::WriteReplace => write::replace(tools, request.arguments(name)?),
            Tool::WriteFile => write::file(tools, request.arguments(name)?),
            Tool::ListTools => list_tools(),
        }
    }
}

fn list_tools() -> Result<Value, DispatchError> {
    let descriptors: Vec<ToolDescriptor> = Tool::iter()
        .map(|tool| ToolDescriptor {
            name: tool.as_str(),
            description: tool.description(),
            streaming: tool.is_streaming(),
        })
        .collect();
    to_result(&descriptors)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;

    use rstest::rstest;
    use serde_json::json;
    use spiderfs_config::Config;
    use tempfile::TempDir;

    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn router(dir: &TempDir) -> ToolRouter {
        let base = dir.path().to_str().expect("utf8 temp path").to_owned();
        ToolRouter::new(ToolContext::from_config(&Config::default().with_base_dir(base)))
    }

    fn route(router: &ToolRouter, line: &str) -> Vec<Value> {
        let request = ToolRequest::parse(line.as_bytes()).expect("parse request");
        let mut output = Vec::new();
        router
            .route(&request, &mut ResponseWriter::new(&mut output))
            .expect("route");
        String::from_utf8(output)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("JSON line"))
            .collect()
    }

    #[rstest]
    #[case("search_content", Tool::SearchContent)]
    #[case("stream_bytes", Tool::StreamBytes)]
    #[case("list_tools", Tool::ListTools)]
    fn parses_tool_names(#[case] name: &str, #[case] expected: Tool) {
        assert_eq!(Tool::parse(name).expect("known tool"), expected);
        assert_eq!(expected.as_str(), name);
    }

    #[test]
    fn rejects_unknown_tools() {
        let error = Tool::parse("Read_Range").expect_err("names are case-sensitive");
        assert!(matches!(error, DispatchError::UnknownTool { .. }));
    }

    #[test]
    fn lists_every_tool() {
        let dir = TempDir::new().expect("temp dir");
        let lines = route(&router(&dir), r#"{"id":1,"tool":"list_tools"}"#);
        let names: Vec<&str> = lines[0]["result"]
            .as_array()
            .expect("tool array")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(names.len(), Tool::iter().count());
        assert!(names.contains(&"write_replace"));
    }

    #[test]
    fn unknown_tools_answer_with_the_request_id() {
        let dir = TempDir::new().expect("temp dir");
        let lines = route(&router(&dir), r#"{"id":"q","tool":"teleport"}"#);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["id"], "q");
        assert_eq!(lines[0]["status"], "error");
        assert_eq!(lines[0]["error"]["kind"], "validation_error");
    }

    #[test]
    fn unknown_argument_fields_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let lines = route(
            &router(&dir),
            r#"{"id":2,"tool":"read_range","arguments":{"path":"f","line_start":1,"line_end":1,"colour":"red"}}"#,
        );
        assert_eq!(lines[0]["error"]["kind"], "validation_error");
        assert!(
            lines[0]["error"]["message"]
                .as_str()
                .is_some_and(|message| message.contains("colour"))
        );
    }

    #[test]
    fn streams_chunks_before_the_result() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("f.txt"), "a\nb\nc\n").expect("seed");
        let lines = route(
            &router(&dir),
            r#"{"id":9,"tool":"stream_lines","arguments":{"path":"f.txt","chunk_lines":2}}"#,
        );
        let statuses: Vec<&str> = lines
            .iter()
            .filter_map(|line| line["status"].as_str())
            .collect();
        assert_eq!(statuses, vec!["chunk", "chunk", "ok"]);
        assert!(lines.iter().all(|line| line["id"] == json!(9)));
        assert_eq!(lines[2]["result"]["chunks"], 2);
    }

    #[test]
    fn output_failures_propagate() {
        let dir = TempDir::new().expect("temp dir");
        let request = ToolRequest::parse(br#"{"id":1,"tool":"list_tools"}"#).expect("parse");
        let error = router(&dir)
            .route(&request, &mut ResponseWriter::new(ClosedPipe))
            .expect_err("closed output");
        assert!(error.is_fatal());
    }
}
