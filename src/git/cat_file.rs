//! Long-lived `git cat-file --batch` object reader

use crate::error::{Result, TagverError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

enum ReaderState {
    NotStarted,
    Ready(BatchProcess),
    /// A start or request failed; cleared by [`CatFileReader::restart`]
    Failed,
    Closed,
}

struct BatchProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl BatchProcess {
    async fn shutdown(self, name: &str) {
        let BatchProcess {
            mut child,
            stdin,
            stdout,
        } = self;
        drop(stdin);
        drop(stdout);
        // Already exited is fine
        if let Err(e) = child.kill().await {
            debug!("{} object reader: kill failed: {}", name, e);
        }
    }
}

/// Reads objects from one repository through a single batch subprocess
///
/// The subprocess is started on the first request and handshaken before use.
/// Requests are serialized. A protocol error or timeout stops the subprocess and
/// fails every later request until [`CatFileReader::restart`] is called; an
/// explicit [`CatFileReader::close`] is final.
pub struct CatFileReader {
    name: String,
    dir: PathBuf,
    program: String,
    args: Vec<String>,
    state: Mutex<ReaderState>,
}

impl CatFileReader {
    /// Reader for the repository at `dir`; `name` labels log and error output
    pub fn new(name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self::with_command(name, dir, "git", &["cat-file", "--batch"])
    }

    pub(crate) fn with_command(
        name: impl Into<String>,
        dir: impl AsRef<Path>,
        program: &str,
        args: &[&str],
    ) -> Self {
        CatFileReader {
            name: name.into(),
            dir: dir.as_ref().to_path_buf(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            state: Mutex::new(ReaderState::NotStarted),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read object `id`, which must be of `object_type`
    ///
    /// Returns `Ok(None)` when the object is not in the store.
    pub async fn read_object(&self, object_type: &str, id: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;

        if matches!(*state, ReaderState::NotStarted) {
            match self.start().await {
                Ok(process) => *state = ReaderState::Ready(process),
                Err(e) => {
                    *state = ReaderState::Failed;
                    return Err(e);
                }
            }
        }

        let process = match &mut *state {
            ReaderState::Ready(process) => process,
            ReaderState::Failed => {
                return Err(TagverError::protocol(
                    &self.name,
                    "reader is closed after an earlier failure",
                ))
            }
            _ => return Err(TagverError::protocol(&self.name, "reader is closed")),
        };

        let result = self.exchange(process, object_type, id).await;

        if result.is_err() {
            if let ReaderState::Ready(process) = std::mem::replace(&mut *state, ReaderState::Failed) {
                process.shutdown(&self.name).await;
            }
        }

        result
    }

    /// Like [`read_object`](Self::read_object), but a protocol failure restarts
    /// the subprocess and the request is tried once more
    pub async fn read_object_with_restart(
        &self,
        object_type: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>> {
        let err = match self.read_object(object_type, id).await {
            Err(e @ TagverError::Protocol { .. }) => e,
            result => return result,
        };
        if !self.restart().await {
            return Err(err);
        }
        info!("{} object reader failed ({}), restarting", self.name, err);
        self.read_object(object_type, id).await
    }

    /// Allow a failed reader to start a fresh subprocess on the next request
    ///
    /// Returns false once the reader has been closed.
    pub async fn restart(&self) -> bool {
        let mut state = self.state.lock().await;
        match *state {
            ReaderState::Closed => false,
            ReaderState::Failed => {
                debug!("{} object reader: restart requested", self.name);
                *state = ReaderState::NotStarted;
                true
            }
            ReaderState::NotStarted | ReaderState::Ready(_) => true,
        }
    }

    /// Stop the subprocess. Later reads fail and the reader cannot be restarted.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let ReaderState::Ready(process) = std::mem::replace(&mut *state, ReaderState::Closed) {
            trace!("{} object reader: closing", self.name);
            process.shutdown(&self.name).await;
        }
    }

    async fn start(&self) -> Result<BatchProcess> {
        debug!(
            "{} object reader: starting `{} {}` in {}",
            self.name,
            self.program,
            self.args.join(" "),
            self.dir.display()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(TagverError::protocol(&self.name, "subprocess pipes unavailable"));
        };

        let mut process = BatchProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        // A blank object name is always answered with "missing"
        let reply = timeout(HANDSHAKE_TIMEOUT, async {
            process.stdin.write_all(b" \n").await?;
            process.stdin.flush().await?;
            read_line(&mut process.stdout).await
        })
        .await
        .map_err(|_| TagverError::protocol(&self.name, "timed out waiting for handshake"))??;

        if reply.as_deref().map(str::trim) != Some("missing") {
            return Err(TagverError::protocol(
                &self.name,
                format!("unexpected handshake reply {:?}", reply.unwrap_or_default()),
            ));
        }

        Ok(process)
    }

    async fn exchange(
        &self,
        process: &mut BatchProcess,
        object_type: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>> {
        trace!("{} object reader: request {} {}", self.name, object_type, id);

        let request = format!("{}\n", id);
        let header = timeout(REQUEST_TIMEOUT, async {
            process.stdin.write_all(request.as_bytes()).await?;
            process.stdin.flush().await?;
            read_line(&mut process.stdout).await
        })
        .await
        .map_err(|_| TagverError::protocol(&self.name, format!("timed out requesting {}", id)))??;

        let Some(header) = header else {
            return Err(TagverError::protocol(&self.name, "unexpected end of stream"));
        };
        trace!("{} object reader: header {:?}", self.name, header);

        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.first() != Some(&id) {
            return Err(TagverError::protocol(
                &self.name,
                format!("requested {} but got header {:?}", id, header),
            ));
        }

        let (actual_type, length) = match fields.as_slice() {
            [_, "missing"] => return Ok(None),
            [_, kind, length] => (*kind, *length),
            _ => {
                return Err(TagverError::protocol(
                    &self.name,
                    format!("malformed header {:?}", header),
                ))
            }
        };

        if actual_type != object_type {
            return Err(TagverError::protocol(
                &self.name,
                format!("{} is a {}, expected {}", id, actual_type, object_type),
            ));
        }

        let length: usize = length.parse().map_err(|_| {
            TagverError::protocol(&self.name, format!("invalid object length {:?}", length))
        })?;

        let mut body = vec![0u8; length + 1];
        timeout(REQUEST_TIMEOUT, process.stdout.read_exact(&mut body))
            .await
            .map_err(|_| TagverError::protocol(&self.name, format!("timed out reading {}", id)))??;

        if body.pop() != Some(b'\n') {
            return Err(TagverError::protocol(
                &self.name,
                format!("object {} not terminated by newline", id),
            ));
        }

        Ok(Some(body))
    }
}

/// One line without its terminator, or `None` at end of stream
async fn read_line(stdout: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    if stdout.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(Some(line))
}
