use super::context::FilterContext;
use super::TagFilter;
use crate::domain::TaggedVersion;
use crate::error::{Result, TagverError};
use crate::process::CommandRunner;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"[{}].?").expect("placeholder pattern is valid"))
}

/// Replace `{}` with `tag`; `{{` and `}}` are literal braces
pub fn substitute_placeholders(arg: &str, tag: &str) -> Result<String> {
    let mut out = String::with_capacity(arg.len());
    let mut last = 0;

    for m in placeholder_regex().find_iter(arg) {
        out.push_str(&arg[last..m.start()]);
        match m.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            "{}" => out.push_str(tag),
            other => {
                return Err(TagverError::filter(format!(
                    "unexpected '{}' in filter argument '{}', use {{{{ or }}}} for literal braces",
                    other, arg
                )))
            }
        }
        last = m.end();
    }

    out.push_str(&arg[last..]);
    Ok(out)
}

/// Accepts a tag when a user command exits with status 0
///
/// The command line is split shell-style once. On every check `{}` in each
/// argument is replaced by the tag name and the `TAGVER_*` variables from
/// [`FilterContext`] are set.
pub struct CommandTagFilter {
    runner: Arc<dyn CommandRunner>,
    words: Vec<String>,
    repo_path: PathBuf,
}

impl CommandTagFilter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        command_line: &str,
        repo_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let words = shell_words::split(command_line).map_err(|e| {
            TagverError::invalid_argument(format!("cannot parse filter command '{}': {}", command_line, e))
        })?;

        if words.is_empty() {
            return Err(TagverError::invalid_argument("filter command is empty"));
        }

        Ok(CommandTagFilter {
            runner,
            words,
            repo_path: repo_path.into(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

#[async_trait]
impl TagFilter for CommandTagFilter {
    async fn passes(&self, candidate: &TaggedVersion) -> Result<bool> {
        let tag = &candidate.tag.name;
        let words = self
            .words
            .iter()
            .map(|word| substitute_placeholders(word, tag))
            .collect::<Result<Vec<_>>>()?;

        let Some((program, args)) = words.split_first() else {
            return Err(TagverError::invalid_argument("filter command is empty"));
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env = FilterContext::new(&self.repo_path, candidate.clone()).to_env_vars();

        match self.runner.run(&self.repo_path, program, &args, &env).await {
            Ok(output) => {
                trace!("filter stdout for {}: {}", tag, output.stdout);
                trace!("filter stderr for {}: {}", tag, output.stderr);
                debug!("Tag {} accepted by filter", tag);
                Ok(true)
            }
            Err(TagverError::Command {
                code,
                stdout,
                stderr,
                ..
            }) => {
                trace!("filter stdout for {}: {}", tag, stdout);
                trace!("filter stderr for {}: {}", tag, stderr);
                debug!("Tag {} rejected by filter (exit code {})", tag, code);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
