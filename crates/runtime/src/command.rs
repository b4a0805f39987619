//! Helpers for running short-lived external commands without a console window.

use std::fmt;
use std::process::{Output, Stdio};

use tokio::process::Command;

use crate::error::RuntimeError;

/// `CREATE_NO_WINDOW`: keeps child processes from flashing a console.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Builds a command with stdin detached and no console window.
///
/// The child is killed if the returned command's child handle is dropped.
pub fn hidden_command(program: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Runs the command to completion, capturing stdout and stderr.
    pub async fn output(&self) -> Result<Output, RuntimeError> {
        run_captured(&self.program, &self.args).await
    }

    /// Runs the command and fails with [`RuntimeError::CommandFailed`] on a
    /// non-zero exit.
    pub async fn run_checked(&self) -> Result<Output, RuntimeError> {
        let output = self.output().await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(RuntimeError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                output: combined_output(&output),
            })
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs `program` with `args`, capturing its output.
pub async fn run_captured(program: &str, args: &[String]) -> Result<Output, RuntimeError> {
    hidden_command(program)
        .args(args)
        .output()
        .await
        .map_err(|source| RuntimeError::Spawn {
            program: program.to_string(),
            source,
        })
}

/// Stdout followed by stderr, lossily decoded and trimmed.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim().to_string()
}
