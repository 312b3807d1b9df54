//! Thin wrapper around `std::process::Command` for drush, git, ssh and behat.

use crate::{Error, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// Render a command line for log output.
pub fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().to_string()];
    parts.extend(command.get_args().map(|a| {
        let arg = a.to_string_lossy();
        if arg.contains(' ') {
            format!("\"{}\"", arg)
        } else {
            arg.to_string()
        }
    }));
    parts.join(" ")
}

/// Run a command, inheriting stdio, and fail unless it exits successfully.
pub fn run(command: &mut Command) -> Result<()> {
    let line = describe(command);
    debug!("Executing: {}", line);

    let status = command
        .status()
        .map_err(|e| Error::Command(format!("{}: {}", line, e)))?;

    if !status.success() {
        error!("Command exited with {}: {}", status, line);
        return Err(Error::Command(format!("{} exited with {}", line, status)));
    }

    Ok(())
}

/// Run a command with stdin read from a file, e.g. `drush sqlc < database.sql`.
pub fn run_with_stdin(command: &mut Command, input: &Path) -> Result<()> {
    let file = File::open(input)?;
    command.stdin(Stdio::from(file));
    run(command)
}

/// Run a command and capture its stdout as lines.
pub fn output_lines(command: &mut Command) -> Result<Vec<String>> {
    let line = describe(command);
    debug!("Executing: {}", line);

    let output = command
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| Error::Command(format!("{}: {}", line, e)))?;

    if !output.status.success() {
        return Err(Error::Command(format!("{} exited with {}", line, output.status)));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
