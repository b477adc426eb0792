//! External command execution
//!
//! Everything that talks to `git` (except the long-lived object reader) and
//! the tag filter goes through [`CommandRunner`], so tests can substitute
//! [`MockCommandRunner`] for the real process spawner.

pub mod mock;

pub use mock::{Invocation, MockCommandRunner};

use crate::error::{Result, TagverError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

/// Captured output of a successful command, whitespace trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        CommandOutput {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Runs a program to completion
///
/// A non-zero exit is reported as [`TagverError::Command`] carrying the exit
/// code and both output streams. Failing to start the program at all is an
/// [`TagverError::Io`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        dir: &Path,
        program: &str,
        args: &[&str],
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutput>;
}

/// Spawns real processes with tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        dir: &Path,
        program: &str,
        args: &[&str],
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutput> {
        trace!("running `{}` in {}", render_command_line(program, args), dir.display());

        let output = Command::new(program)
            .args(args)
            .envs(env)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(TagverError::Command {
                program: render_command_line(program, args),
                code: output.status.code().unwrap_or(-1),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Render a command line for logs and mock lookups
pub fn render_command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
