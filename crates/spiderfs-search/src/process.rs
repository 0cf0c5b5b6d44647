//! Short-lived external tool invocation with an enforced timeout.
//!
//! Stdin, stdout and stderr are serviced on helper threads so a chatty child
//! never blocks on a full pipe while the caller polls for exit. On timeout
//! the child is killed and the helper threads are detached: a grandchild
//! that inherited the pipes may keep them open after the child is gone.

use std::ffi::OsStr;
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::SearchError;

const PROCESS_TARGET: &str = "spiderfs_search::process";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished tool.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: String,
}

impl ToolOutput {
    pub(crate) fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Runs `program` with `args`, feeding `input` on stdin when given.
pub(crate) fn run_tool<I, S>(
    program: &str,
    args: I,
    input: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ToolOutput, SearchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(target: PROCESS_TARGET, program, "spawning search tool");

    let mut child = command.spawn().map_err(|error| {
        let reason = if error.kind() == ErrorKind::NotFound {
            String::from("executable not found")
        } else {
            error.to_string()
        };
        SearchError::unavailable(program, reason)
    })?;

    let writer = child.stdin.take().zip(input).map(|(mut stdin, bytes)| {
        thread::spawn(move || {
            // A tool that exits early closes its end; the broken pipe is
            // reported through its exit status instead.
            drop(stdin.write_all(&bytes));
        })
    });
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = match wait_with_timeout(program, &mut child, timeout) {
        Ok(status) => status,
        Err(error) => {
            drop((writer, stdout, stderr));
            return Err(error);
        }
    };

    if let Some(handle) = writer {
        drop(handle.join());
    }
    let stdout_bytes = join_reader(stdout);
    let stderr_bytes = join_reader(stderr);

    let output = ToolOutput {
        status,
        stdout: stdout_bytes,
        stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_owned(),
    };
    debug!(
        target: PROCESS_TARGET,
        program,
        code = output.code(),
        stdout_bytes = output.stdout.len(),
        "search tool finished"
    );
    Ok(output)
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            drop(reader.read_to_end(&mut buffer));
            buffer
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

fn wait_with_timeout(
    program: &str,
    child: &mut Child,
    timeout: Duration,
) -> Result<ExitStatus, SearchError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    warn!(
                        target: PROCESS_TARGET,
                        program,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "search tool timed out, killing process"
                    );
                    drop(child.kill());
                    drop(child.wait());
                    return Err(SearchError::Timeout {
                        backend: program.to_owned(),
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(error) => {
                drop(child.kill());
                drop(child.wait());
                return Err(SearchError::unavailable(program, error.to_string()));
            }
        }
    }
}
