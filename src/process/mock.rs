use super::{render_command_line, CommandOutput, CommandRunner};
use crate::error::{Result, TagverError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One recorded call to [`MockCommandRunner::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub dir: PathBuf,
    pub command_line: String,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum Scripted {
    Success(CommandOutput),
    Failure { code: i32, stderr: String },
}

/// Command runner answering from a script instead of spawning processes
///
/// Responses are keyed by the rendered command line (`"program arg1 arg2"`).
/// Unscripted command lines succeed with empty output unless
/// [`MockCommandRunner::strict`] was requested.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    responses: Mutex<HashMap<String, Scripted>>,
    invocations: Mutex<Vec<Invocation>>,
    strict: bool,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        MockCommandRunner::default()
    }

    /// Unscripted command lines fail with exit code 127
    pub fn strict() -> Self {
        MockCommandRunner {
            strict: true,
            ..MockCommandRunner::default()
        }
    }

    /// Script a successful response
    pub fn on_success(&self, command_line: impl Into<String>, stdout: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(
                command_line.into(),
                Scripted::Success(CommandOutput::new(stdout, "")),
            );
        }
    }

    /// Script a non-zero exit
    pub fn on_failure(&self, command_line: impl Into<String>, code: i32, stderr: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(
                command_line.into(),
                Scripted::Failure {
                    code,
                    stderr: stderr.into(),
                },
            );
        }
    }

    /// All calls made so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Rendered command lines of all calls made so far
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|call| call.command_line)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(
        &self,
        dir: &Path,
        program: &str,
        args: &[&str],
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutput> {
        let command_line = render_command_line(program, args);

        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(Invocation {
                dir: dir.to_path_buf(),
                command_line: command_line.clone(),
                env: env.clone(),
            });
        }

        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(&command_line).cloned());

        match scripted {
            Some(Scripted::Success(output)) => Ok(output),
            Some(Scripted::Failure { code, stderr }) => Err(TagverError::Command {
                program: command_line,
                code,
                stdout: String::new(),
                stderr,
            }),
            None if self.strict => Err(TagverError::Command {
                program: command_line.clone(),
                code: 127,
                stdout: String::new(),
                stderr: format!("unscripted command: {}", command_line),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}
