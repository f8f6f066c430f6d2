//! Runs the hive-dump tool against one materialized hive.
//!
//! The child's stdout is appended to the hive's [`CaptureTarget`] and its
//! stderr to the run's [`ErrorCapture`]. Both pipes are drained by their
//! own thread while the parent waits, so a chatty tool cannot stall on a
//! full pipe buffer. The drains are joined before the outcome is reported,
//! so the capture file is complete once [`ToolInvoker::run`] returns.

mod terminate;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::capture::{CaptureTarget, ErrorCapture};
use crate::config::ModuleConfig;

/// Errors that stop an invocation before it produces an outcome.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("cannot open capture file {}: {source}", .path.display())]
    Capture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {}: {source}", .tool.display())]
    SpawnFailed {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for tool: {0}")]
    Wait(#[source] io::Error),

    #[error("failed copying tool {stream}: {source}")]
    Drain {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
}

/// How a tool run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// Exit code 0.
    Succeeded,
    /// Nonzero exit, or killed by a signal.
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<String>,
    },
    /// The bounded wait ran out and the tool was terminated.
    TimedOut { after_ms: u64 },
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Succeeded)
    }
}

/// A finished invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    #[serde(flatten)]
    pub outcome: InvocationOutcome,
    pub duration_ms: u64,
    /// Bytes appended to the capture file.
    pub stdout_bytes: u64,
    /// Bytes appended to the shared error capture.
    pub stderr_bytes: u64,
}

/// Invocation settings.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub tool_path: PathBuf,
    /// `None` blocks until the tool exits.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub termination_grace: Duration,
}

impl From<&ModuleConfig> for InvokerConfig {
    fn from(config: &ModuleConfig) -> Self {
        Self {
            tool_path: config.tool_path.clone(),
            timeout: config.tool_timeout,
            poll_interval: config.poll_interval,
            termination_grace: config.termination_grace,
        }
    }
}

/// Launches the tool, one process per hive file.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    config: InvokerConfig,
}

impl ToolInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        Self { config }
    }

    pub fn tool_path(&self) -> &Path {
        &self.config.tool_path
    }

    /// Arguments for one run: `-f <profile> -r <hive>`.
    pub fn arguments(profile: &str, hive_path: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-f".into(),
            profile.into(),
            "-r".into(),
            hive_path.as_os_str().to_os_string(),
        ]
    }

    /// Run the tool once and wait for it.
    ///
    /// A nonzero exit is an `Ok` outcome; only failures to capture, spawn or
    /// wait are errors.
    pub fn run(
        &self,
        profile: &str,
        hive_path: &Path,
        target: &CaptureTarget,
        errors: &ErrorCapture,
    ) -> Result<Invocation, InvokeError> {
        let stdout_sink = target.open().map_err(|source| InvokeError::Capture {
            path: target.path().to_path_buf(),
            source,
        })?;
        let stderr_sink = errors.open().map_err(|source| InvokeError::Capture {
            path: errors.path().to_path_buf(),
            source,
        })?;

        let start = Instant::now();
        tracing::debug!(
            tool = %self.config.tool_path.display(),
            profile,
            hive = %hive_path.display(),
            capture = %target.path().display(),
            "launching tool"
        );

        let mut command = Command::new(&self.config.tool_path);
        command
            .args(Self::arguments(profile, hive_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: terminal signals stay with us, and a timeout
        // can take down anything the tool left running on our pipes.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|source| InvokeError::SpawnFailed {
                tool: self.config.tool_path.clone(),
                source,
            })?;

        let stdout_drain = child.stdout.take().map(|pipe| drain(pipe, stdout_sink));
        let stderr_drain = child.stderr.take().map(|pipe| drain(pipe, stderr_sink));

        let waited = match self.config.timeout {
            None => child.wait().map(Waited::Exited),
            Some(limit) => self.wait_bounded(&mut child, start, limit),
        };
        let waited_ms = start.elapsed().as_millis() as u64;

        // Join the drains even if waiting failed, so no thread outlives the call.
        let stdout_bytes = join_drain(stdout_drain, "stdout");
        let stderr_bytes = join_drain(stderr_drain, "stderr");

        let waited = waited.map_err(InvokeError::Wait)?;
        let stdout_bytes = stdout_bytes?;
        let stderr_bytes = stderr_bytes?;

        let outcome = match waited {
            Waited::Exited(status) => classify(status),
            Waited::TimedOut => InvocationOutcome::TimedOut { after_ms: waited_ms },
        };

        Ok(Invocation {
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
            stdout_bytes,
            stderr_bytes,
        })
    }

    fn wait_bounded(
        &self,
        child: &mut std::process::Child,
        start: Instant,
        limit: Duration,
    ) -> io::Result<Waited> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Waited::Exited(status));
            }
            if start.elapsed() >= limit {
                tracing::warn!(
                    pid = child.id(),
                    limit_secs = limit.as_secs(),
                    "tool exceeded time limit, terminating"
                );
                terminate::terminate_child(child, self.config.termination_grace, self.config.poll_interval)?;
                return Ok(Waited::TimedOut);
            }
            thread::sleep(self.config.poll_interval);
        }
    }
}

enum Waited {
    Exited(ExitStatus),
    TimedOut,
}

fn drain<R: Read + Send + 'static>(mut pipe: R, mut sink: File) -> JoinHandle<io::Result<u64>> {
    thread::spawn(move || {
        let copied = io::copy(&mut pipe, &mut sink)?;
        sink.sync_data()?;
        Ok(copied)
    })
}

fn join_drain(handle: Option<JoinHandle<io::Result<u64>>>, stream: &'static str) -> Result<u64, InvokeError> {
    let Some(handle) = handle else {
        return Ok(0);
    };
    match handle.join() {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(source)) => Err(InvokeError::Drain { stream, source }),
        Err(_) => Err(InvokeError::Drain {
            stream,
            source: io::Error::new(io::ErrorKind::Other, "drain thread panicked"),
        }),
    }
}

fn classify(status: ExitStatus) -> InvocationOutcome {
    if status.success() {
        return InvocationOutcome::Succeeded;
    }
    let code = status.code();
    let signal = if code.is_none() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            status.signal().map(|s| format!("SIG{}", s))
        }
        #[cfg(not(unix))]
        {
            None
        }
    } else {
        None
    };
    InvocationOutcome::Failed { code, signal }
}
