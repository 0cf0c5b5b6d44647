//! Backend that drives `rg` and `fzf` as child processes.

use std::collections::HashSet;
use std::ffi::OsString;
use std::time::Duration;

use tracing::debug;

use crate::backend::SearchBackend;
use crate::error::SearchError;
use crate::locator::{self, Candidate};
use crate::model::{ContentQuery, LocateQuery, LocatorHit, SearchMatch, SearchResult};
use crate::process::{ToolOutput, run_tool};

const EXTERNAL_TARGET: &str = "spiderfs_search::external";

/// Exit status both tools use for "nothing matched".
const NO_MATCH: i32 = 1;

/// Which external tools answered `--version`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    /// `rg` is runnable.
    pub ripgrep: bool,
    /// `fzf` is runnable.
    pub fzf: bool,
}

/// Content search through ripgrep and path filtering through fzf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBackend {
    ripgrep: String,
    fzf: String,
    timeout: Duration,
}

impl ExternalBackend {
    /// Uses the given executables, killing either after `timeout`.
    pub fn new(ripgrep: impl Into<String>, fzf: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ripgrep: ripgrep.into(),
            fzf: fzf.into(),
            timeout,
        }
    }

    /// Runs `--version` on both tools.
    #[must_use]
    pub fn detect_tools(&self) -> Availability {
        let availability = Availability {
            ripgrep: self.responds(&self.ripgrep),
            fzf: self.responds(&self.fzf),
        };
        debug!(
            target: EXTERNAL_TARGET,
            ripgrep = availability.ripgrep,
            fzf = availability.fzf,
            "checked external search tools"
        );
        availability
    }

    fn responds(&self, program: &str) -> bool {
        run_tool(program, ["--version"], None, self.timeout)
            .is_ok_and(|output| output.status.success())
    }

    fn ripgrep_args(query: &ContentQuery) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--no-config",
            "--null",
            "--line-number",
            "--byte-offset",
            "--with-filename",
            "--no-heading",
            "--color=never",
            "--text",
            "--hidden",
            "--no-ignore",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(OsString::from(format!(
            "--max-count={}",
            query.max_matches_per_file()
        )));
        if let Some(encoding) = query.encoding() {
            args.push(OsString::from(format!("--encoding={}", encoding.name())));
        }
        args.push(OsString::from("--regexp"));
        args.push(OsString::from(query.pattern()));
        args.push(OsString::from("--"));
        args.push(query.scope().as_os_str().to_owned());
        args
    }

    fn fzf_args(query: &LocateQuery) -> Vec<OsString> {
        vec![
            OsString::from(format!("--filter={}", query.pattern())),
            OsString::from("-i"),
            OsString::from("+x"),
            OsString::from("--literal"),
            OsString::from("--no-sort"),
            OsString::from("--read0"),
            OsString::from("--print0"),
        ]
    }

    fn failure(program: &str, output: &ToolOutput) -> SearchError {
        SearchError::unavailable(
            program,
            format!("exited with status {:?}: {}", output.code(), output.stderr),
        )
    }
}

impl SearchBackend for ExternalBackend {
    fn name(&self) -> &'static str {
        "external"
    }

    fn search(&self, query: &ContentQuery) -> Result<SearchResult, SearchError> {
        query.validate()?;
        let output = run_tool(&self.ripgrep, Self::ripgrep_args(query), None, self.timeout)?;
        match output.code() {
            Some(0) => {
                let matches = output
                    .stdout
                    .split(|byte| *byte == b'\n')
                    .filter(|line| !line.is_empty())
                    .map(|line| {
                        parse_ripgrep_line(line).ok_or_else(|| {
                            SearchError::unavailable(
                                &self.ripgrep,
                                format!("unparseable output line: {}", String::from_utf8_lossy(line)),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SearchResult::from_unsorted(matches))
            }
            Some(NO_MATCH) => Ok(SearchResult::default()),
            _ => Err(Self::failure(&self.ripgrep, &output)),
        }
    }

    fn locate(&self, query: &LocateQuery) -> Result<Vec<LocatorHit>, SearchError> {
        query.validate()?;
        let all: Vec<Candidate> = locator::candidates(query)?.collect();
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let mut input = Vec::new();
        for candidate in &all {
            input.extend_from_slice(candidate.relative.as_bytes());
            input.push(0);
        }
        let output = run_tool(&self.fzf, Self::fzf_args(query), Some(input), self.timeout)?;
        match output.code() {
            Some(0) => {
                let selected: HashSet<String> = output
                    .stdout
                    .split(|byte| *byte == 0)
                    .filter(|item| !item.is_empty())
                    .map(|item| String::from_utf8_lossy(item).into_owned())
                    .collect();
                debug!(
                    target: EXTERNAL_TARGET,
                    candidates = all.len(),
                    selected = selected.len(),
                    "fzf filtered candidates"
                );
                let matched = all
                    .into_iter()
                    .filter(|candidate| selected.contains(&candidate.relative));
                Ok(locator::rank(query, matched))
            }
            Some(NO_MATCH) => Ok(Vec::new()),
            _ => Err(Self::failure(&self.fzf, &output)),
        }
    }
}

/// Parses `path NUL line:offset:content` as printed by
/// `rg --null --line-number --byte-offset`.
fn parse_ripgrep_line(raw: &[u8]) -> Option<SearchMatch> {
    let separator = memchr::memchr(0, raw)?;
    let (path, tail) = raw.split_at(separator);
    let mut fields = tail.get(1..)?.splitn(3, |byte| *byte == b':');
    let line_number = parse_number(fields.next()?)?;
    let byte_offset = parse_number(fields.next()?)?;
    let content = fields.next().unwrap_or_default();
    let trimmed = content.strip_suffix(b"\r").unwrap_or(content);
    Some(SearchMatch {
        path: String::from_utf8_lossy(path).into_owned(),
        line_number: usize::try_from(line_number).ok()?,
        line_content: String::from_utf8_lossy(trimmed).into_owned(),
        byte_offset: Some(byte_offset),
    })
}

fn parse_number(field: &[u8]) -> Option<u64> {
    std::str::from_utf8(field).ok()?.parse().ok()
}
