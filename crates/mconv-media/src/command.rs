//! External tool invocation.
//!
//! Every tool call (ffmpeg, ffprobe, yt-dlp) goes through [`ToolRunner`].
//! Long-running calls are started with [`ToolRunner::spawn`] and their stdout
//! is consumed line by line; metadata calls use [`ToolRunner::output`] with a
//! deadline.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::ProgressDecoder;

/// A tool name plus its ordered argument list.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    /// Input this invocation works on, used only for logs
    input: String,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input: String::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Associate the invocation with the input it processes.
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn spawn_child(&self) -> MediaResult<Child> {
        debug!(input = %self.input, "Running {} {}", self.program, self.args.join(" "));
        self.to_command().spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::ToolNotFound(self.program.clone())
            } else {
                MediaError::from(e)
            }
        })
    }

    fn failure(&self, exit_code: Option<i32>) -> MediaError {
        MediaError::external_tool(self.program.clone(), self.args.clone(), exit_code)
    }
}

/// Runner for external tools with optional deadline and stderr diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    timeout: Option<Duration>,
    diagnostics: bool,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound [`ToolRunner::output`] calls by a deadline; the child is killed
    /// when it passes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Log the child's stderr at debug level instead of discarding it.
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Start a long-running tool. Not bounded by the deadline.
    pub fn spawn(&self, cmd: &ToolCommand) -> MediaResult<RunningTool> {
        let mut child = cmd.spawn_child()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        let tool = cmd.program.clone();
        let diagnostics = self.diagnostics;
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            while let Ok(Some(line)) = read_lossy_line(&mut reader).await {
                if diagnostics {
                    debug!(tool = %tool, "{}", line);
                }
            }
        });

        Ok(RunningTool {
            cmd: cmd.clone(),
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
        })
    }

    /// Run a short metadata call to completion and return its stdout.
    pub async fn output(&self, cmd: &ToolCommand) -> MediaResult<String> {
        let child = cmd.spawn_child()?;

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    // Dropping the future drops the child, which kills it.
                    warn!(
                        "{} timed out after {} seconds, killing process",
                        cmd.program,
                        timeout.as_secs()
                    );
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            if self.diagnostics {
                debug!(
                    tool = %cmd.program,
                    "stderr: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            return Err(cmd.failure(output.status.code()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A started child process whose stdout is read as lines.
pub struct RunningTool {
    cmd: ToolCommand,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: JoinHandle<()>,
}

impl RunningTool {
    /// Next stdout line, or `None` once the child closes stdout.
    ///
    /// Bytes that are not UTF-8 are replaced, never rejected.
    pub async fn next_line(&mut self) -> MediaResult<Option<String>> {
        Ok(read_lossy_line(&mut self.stdout).await?)
    }

    /// Read lines until one carries a progress marker for `decoder`.
    ///
    /// Returns `None` at end of stream.
    pub async fn next_progress(&mut self, decoder: &ProgressDecoder) -> MediaResult<Option<u8>> {
        while let Some(line) = self.next_line().await? {
            if let Some(percent) = decoder.decode(&line) {
                return Ok(Some(percent));
            }
        }
        Ok(None)
    }

    /// Wait for the child to exit. A non-zero exit is an error.
    pub async fn wait(mut self) -> MediaResult<()> {
        // Unread stdout would block a child writing into a full pipe.
        while let Ok(Some(_)) = read_lossy_line(&mut self.stdout).await {}

        let status = self.child.wait().await?;
        let _ = self.stderr_task.await;

        if status.success() {
            Ok(())
        } else {
            Err(self.cmd.failure(status.code()))
        }
    }
}

/// Read one line without its terminator, decoding it lossily.
async fn read_lossy_line<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Resolve a tool binary on PATH.
pub fn check_tool(name: &str) -> MediaResult<PathBuf> {
    which::which(name).map_err(|_| MediaError::ToolNotFound(name.to_string()))
}
