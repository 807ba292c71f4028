//! Child process supervision: spawn, stream output to the log, enforce a timeout.
//!
//! Each call drives its child on a current-thread tokio runtime owned by the calling thread,
//! so a recipe worker stays one OS thread per execution.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use crate::utils::config::{OUTPUT_DRAIN_GRACE, TOOL_OUTPUT_TARGET};

/// What a finished (or killed) child left behind.
#[derive(Debug, Default)]
pub struct CommandOutput {
    /// None when the child was killed on timeout.
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    /// stdout followed by stderr, for callers that want the raw text.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Fail on timeout or non-zero exit. stderr (or the exit status) becomes the message.
    pub fn check(&self, label: &str) -> Result<()> {
        if self.timed_out {
            bail!("{label}: timed out after {:?}", self.elapsed);
        }
        match self.status {
            Some(s) if s.success() => Ok(()),
            Some(s) => {
                let stderr = self.stderr.trim();
                if stderr.is_empty() {
                    bail!("{label}: exited with {s}")
                }
                bail!("{label}: {stderr}")
            }
            None => bail!("{label}: no exit status"),
        }
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Log `pipe` line by line as it arrives; the task resolves to the full text once the pipe
/// closes.
fn spawn_reader<R>(pipe: Option<R>, label: String, stream: Stream) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = String::new();
        let Some(pipe) = pipe else {
            return collected;
        };
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let trimmed = line.trim_end();
                    match stream {
                        Stream::Stdout => info!(target: TOOL_OUTPUT_TARGET, "[{label}] {trimmed}"),
                        Stream::Stderr => {
                            debug!(target: TOOL_OUTPUT_TARGET, "[{label}] stderr: {trimmed}")
                        }
                    }
                    collected.push_str(&line);
                }
            }
        }
        collected
    })
}

/// Collect a reader's text. Grandchildren holding the pipe open must not hang the caller.
async fn drain(reader: JoinHandle<String>, label: &str) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, reader).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            debug!("[{label}] output reader failed: {e}");
            String::new()
        }
        Err(_) => {
            debug!("[{label}] output pipe still open after exit; dropping remainder");
            String::new()
        }
    }
}

async fn supervise(cmd: Command, label: &str, timeout: Duration) -> Result<CommandOutput> {
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let start = Instant::now();
    let mut child = cmd.spawn().with_context(|| format!("spawn {label}"))?;
    let stdout = spawn_reader(child.stdout.take(), label.to_string(), Stream::Stdout);
    let stderr = spawn_reader(child.stderr.take(), label.to_string(), Stream::Stderr);

    let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(waited) => (
            Some(waited.with_context(|| format!("wait for {label}"))?),
            false,
        ),
        Err(_) => {
            warn!("[{label}] exceeded {timeout:?}; killing");
            if let Err(e) = child.kill().await {
                debug!("[{label}] kill failed: {e}");
            }
            (None, true)
        }
    };

    Ok(CommandOutput {
        status,
        stdout: drain(stdout, label).await,
        stderr: drain(stderr, label).await,
        timed_out,
        elapsed: start.elapsed(),
    })
}

/// Run `cmd` to completion or until `timeout` elapses, in which case it is killed.
/// Only a spawn (or wait) failure is an `Err`; exit status and timeout are in the output.
///
/// Blocks the calling thread. Must not be called from inside an async task.
pub fn run_with_timeout(cmd: Command, label: &str, timeout: Duration) -> Result<CommandOutput> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| format!("build runtime for {label}"))?;
    runtime.block_on(supervise(cmd, label, timeout))
}
