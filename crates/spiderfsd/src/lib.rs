//! Tool server exposing bounded file reads, streaming, search and
//! transactional writes over JSON Lines.
//!
//! [`run`] loads the layered configuration, installs telemetry on stderr and
//! serves requests from the given input until it closes. The binary wires
//! it to the process's standard streams.

pub mod dispatch;
pub mod telemetry;

use std::ffi::OsString;
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use ortho_config::OrthoConfig;
use spiderfs_config::Config;
use tracing::{error, info};

use crate::dispatch::{Server, ToolContext};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Exit status for configuration and telemetry setup failures.
pub const CONFIG_FAILURE: u8 = 2;

/// Runs the server until `input` closes.
///
/// Exits with `0` after a clean end of input, `1` when reading requests or
/// writing responses fails and [`CONFIG_FAILURE`] when the configuration or
/// the log filter is invalid. Setup failures are reported on `errors`.
pub fn run<I, R, W, E>(args: I, input: R, output: W, errors: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let config = match load_config(args) {
        Ok(config) => config,
        Err(message) => {
            report(errors, message);
            return ExitCode::from(CONFIG_FAILURE);
        }
    };
    if let Err(failure) = telemetry::initialise(&config) {
        report(errors, failure);
        return ExitCode::from(CONFIG_FAILURE);
    }
    info!(
        target: SERVER_TARGET,
        base_dir = ?config.base_dir(),
        search_backend = %config.search_backend(),
        "serving requests"
    );
    let server = Server::new(ToolContext::from_config(&config));
    match server.serve(input, output) {
        Ok(_) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(target: SERVER_TARGET, error = %failure, "serve loop stopped");
            report(errors, failure);
            ExitCode::FAILURE
        }
    }
}

fn load_config<I>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = OsString>,
{
    let config = Config::load_from_iter(args).map_err(|failure| failure.to_string())?;
    config.validate().map_err(|failure| failure.to_string())?;
    Ok(config)
}

fn report<E: Write>(errors: &mut E, message: impl Display) {
    drop(writeln!(errors, "spiderfsd: {message}"));
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::fs;
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::*;

    fn invoke(args: &[&OsStr], input: &str) -> (ExitCode, String, String) {
        let mut output = Vec::new();
        let mut errors = Vec::new();
        let code = run(
            args.iter().map(OsString::from),
            Cursor::new(input.as_bytes()),
            &mut output,
            &mut errors,
        );
        (
            code,
            String::from_utf8(output).expect("utf8 output"),
            String::from_utf8(errors).expect("utf8 errors"),
        )
    }

    #[test]
    fn serves_until_end_of_input() {
        let (code, output, _) = invoke(
            &[OsStr::new("spiderfsd")],
            "{\"id\":1,\"tool\":\"list_tools\"}\n",
        );
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(output.contains("\"status\":\"ok\""));
    }

    #[test]
    fn invalid_configuration_exits_with_status_two() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("spiderfs.toml");
        fs::write(&path, "stream_chunk_lines = 0\n").expect("write config");
        let (code, output, errors) = invoke(
            &[
                OsStr::new("spiderfsd"),
                OsStr::new("--config-path"),
                path.as_os_str(),
            ],
            "",
        );
        assert_eq!(code, ExitCode::from(CONFIG_FAILURE));
        assert!(output.is_empty());
        assert!(errors.contains("stream_chunk_lines"));
    }
}
