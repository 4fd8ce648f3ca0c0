//! Runs the infrastructure tool while mirroring its output to the job log.
//!
//! Both pipes are drained concurrently into their own buffer, so a child that
//! interleaves large writes on stdout and stderr never blocks on a full pipe.

pub mod runner;

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

use crate::error::AppError;

pub use runner::{CommandRunner, ConsoleRunner};

/// Exit code reported when the process never started or was killed by a signal.
pub const NOT_STARTED_EXIT_CODE: i32 = -1;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub tool: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
}

impl ExecutionRequest {
    pub fn display(&self) -> String {
        std::iter::once(self.tool.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to capture stdout: {0}")]
    Stdout(io::Error),
    #[error("failed to capture stderr: {0}")]
    Stderr(io::Error),
    #[error("failed to wait for command: {0}")]
    Wait(io::Error),
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub start_error: Option<io::Error>,
    pub capture_error: Option<CaptureError>,
}

impl ExecutionResult {
    fn not_started(error: io::Error) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: NOT_STARTED_EXIT_CODE,
            start_error: Some(error),
            capture_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.start_error.is_none() && self.capture_error.is_none() && self.exit_code == 0
    }

    /// Classify a failed run. `None` when the tool ran and exited 0.
    ///
    /// Start errors take precedence over capture errors, which take
    /// precedence over a non-zero exit code.
    pub fn failure(&self) -> Option<AppError> {
        if let Some(e) = &self.start_error {
            return Some(AppError::ProcessStart(e.to_string()));
        }
        if let Some(e) = &self.capture_error {
            return Some(AppError::StreamCapture(e.to_string()));
        }
        if self.exit_code != 0 {
            return Some(AppError::ToolExecution {
                code: self.exit_code,
            });
        }
        None
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run the request, teeing its output to this process's stdout and stderr.
pub async fn execute(request: &ExecutionRequest) -> ExecutionResult {
    execute_with(request, tokio::io::stdout(), tokio::io::stderr()).await
}

/// Run the request, teeing its output to the given mirrors.
///
/// Returns only after both pipes reached EOF and the process exited. Whatever
/// was captured is returned even when the run failed.
pub async fn execute_with<O, E>(request: &ExecutionRequest, out: O, err: E) -> ExecutionResult
where
    O: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    tracing::info!(command = %request.display(), dir = %request.work_dir.display(), "Starting command");

    let spawned = Command::new(&request.tool)
        .args(&request.args)
        .current_dir(&request.work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(tool = %request.tool, error = %e, "Command start failed");
            return ExecutionResult::not_started(e);
        }
    };

    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let ((stdout, stdout_err), (stderr, stderr_err)) = tokio::join!(
        tee(child_stdout, out, "stdout"),
        tee(child_stderr, err, "stderr"),
    );

    let status = child.wait().await;

    let mut capture_error = stdout_err
        .map(CaptureError::Stdout)
        .or(stderr_err.map(CaptureError::Stderr));

    let exit_code = match status {
        Ok(status) => status.code().unwrap_or(NOT_STARTED_EXIT_CODE),
        Err(e) => {
            if capture_error.is_none() {
                capture_error = Some(CaptureError::Wait(e));
            }
            NOT_STARTED_EXIT_CODE
        }
    };

    tracing::info!(
        exit_code,
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        "Command finished"
    );

    ExecutionResult {
        stdout,
        stderr,
        exit_code,
        start_error: None,
        capture_error,
    }
}

/// Copy `reader` to EOF into a buffer, mirroring each chunk to `mirror`.
///
/// A mirror failure only stops mirroring; a read failure ends the copy and is
/// returned next to the bytes captured so far.
async fn tee<R, W>(
    reader: Option<R>,
    mut mirror: W,
    stream: &'static str,
) -> (Vec<u8>, Option<io::Error>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut reader) = reader else {
        return (Vec::new(), None);
    };

    let mut captured = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut mirroring = true;

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (captured, Some(e)),
        };

        captured.extend_from_slice(&chunk[..n]);

        if mirroring {
            if let Err(e) = mirror_chunk(&mut mirror, &chunk[..n]).await {
                tracing::warn!(stream, error = %e, "Console mirror failed, capturing only");
                mirroring = false;
            }
        }
    }

    (captured, None)
}

async fn mirror_chunk<W: AsyncWrite + Unpin>(mirror: &mut W, chunk: &[u8]) -> io::Result<()> {
    mirror.write_all(chunk).await?;
    mirror.flush().await
}
