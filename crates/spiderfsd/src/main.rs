//! Entrypoint for the spiderfs tool server.
//!
//! Requests arrive on stdin and responses leave on stdout; logs go to
//! stderr. See [`spiderfsd::run`].

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin: StdinLock<'static> = io::stdin().lock();
    let stdout: StdoutLock<'static> = io::stdout().lock();
    let mut stderr: StderrLock<'static> = io::stderr().lock();
    spiderfsd::run(std::env::args_os(), stdin, stdout, &mut stderr)
}
