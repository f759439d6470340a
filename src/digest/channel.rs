//! One-shot child process channel: spawn, write all, read all, reap.

use crate::error::DigestError;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const READ_CHUNK: usize = 4096;

/// Bytes read back from a child, capped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CappedOutput {
    /// At most `cap` bytes, in order.
    pub bytes: Vec<u8>,
    /// Total bytes the child produced.
    pub total: usize,
}

impl CappedOutput {
    /// Whether output past the cap was dropped.
    pub fn truncated(&self) -> bool {
        self.total > self.bytes.len()
    }
}

/// A spawned child whose stdin/stdout are piped to this process.
#[derive(Debug)]
pub struct ChildProcessChannel {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl ChildProcessChannel {
    /// Spawn `program` (resolved through `PATH`) with piped stdin/stdout.
    /// Stderr is discarded. The child is killed if the channel is dropped
    /// before it was reaped.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, DigestError> {
        let spawn_failed = |source| DigestError::SpawnFailed {
            program: program.to_string(),
            source,
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        if stdin.is_none() || stdout.is_none() {
            return Err(spawn_failed(std::io::Error::other("child pipes not captured")));
        }
        tracing::trace!(program, pid = ?child.id(), "spawned digest process");
        Ok(Self {
            program: program.to_string(),
            child,
            stdin,
            stdout,
        })
    }

    /// Program this channel spawned.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Feed `payload` to the child and collect its output, keeping at most
    /// `cap` bytes. Writing and reading run concurrently. The child is
    /// reaped before returning.
    pub async fn round_trip(
        &mut self,
        payload: &[u8],
        cap: usize,
    ) -> Result<CappedOutput, DigestError> {
        let stdin = self.stdin.take();
        let stdout = self.stdout.take();
        let (written, output) = tokio::join!(
            async {
                match stdin {
                    Some(stdin) => write_all_counted(stdin, payload).await,
                    None => 0,
                }
            },
            async {
                match stdout {
                    Some(stdout) => read_capped(stdout, cap).await,
                    None => Ok(CappedOutput::default()),
                }
            }
        );

        let status = self.child.wait().await.map_err(DigestError::Read)?;
        if written < payload.len() {
            return Err(DigestError::WriteIncomplete {
                written,
                expected: payload.len(),
            });
        }
        let output = output.map_err(DigestError::Read)?;
        if !status.success() {
            return Err(DigestError::ExitStatus(status));
        }
        Ok(output)
    }

    /// Kill and reap the child. Errors are logged, not returned.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(program = %self.program, error = %e, "failed to kill digest process");
        }
    }
}

/// Write as much of `payload` as the reader accepts, then close the pipe.
/// Returns the number of bytes delivered.
pub(crate) async fn write_all_counted<W>(mut writer: W, payload: &[u8]) -> usize
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < payload.len() {
        match writer.write(&payload[written..]).await {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(written, error = %e, "digest input closed early");
                break;
            }
        }
    }
    let _ = writer.shutdown().await;
    written
}

/// Read until EOF, keeping the first `cap` bytes and draining the rest.
pub(crate) async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<CappedOutput>
where
    R: AsyncRead + Unpin,
{
    let mut out = CappedOutput::default();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(out);
        }
        let room = cap.saturating_sub(out.bytes.len());
        out.bytes.extend_from_slice(&chunk[..n.min(room)]);
        out.total += n;
    }
}
