//! Child process supervisor
//!
//! Launches the program under test in its own process group, captures its
//! output to a rolling log, and guarantees deterministic stop semantics:
//! after `stop` returns, no descendant of the original process is alive.
//! Polite termination first, then a hard kill of the group, then a by-name
//! fallback; the supervisor verifies rather than returning optimistically.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Running,
    Exited(i32),
    Killed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(i32),
    TimedOut,
}

/// How long the supervised program is driven
#[derive(Debug, Clone, Copy)]
pub enum RunMode {
    /// Run for the duration, then stop
    Fixed(Duration),
    /// Extended monitoring after an initial quiet period
    SuccessTimeout { initial: Duration, extended: Duration },
    /// Leave the program running after a health window; caller prints the
    /// stop command
    Detach { health_window: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Survived the monitoring window and was stopped cleanly
    CleanRun,
    /// Exited during monitoring with this code
    EarlyExit(i32),
    /// Left running on purpose
    Detached,
}

/// A supervised child and its process group
pub struct ChildHandle {
    child: Child,
    pgid: i32,
    command_name: String,
    pub log_path: PathBuf,
    killed: bool,
}

impl ChildHandle {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Shell command that kills the whole group, for `--detach` output
    pub fn stop_command(&self) -> String {
        format!("kill -TERM -{}", self.pgid)
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Launch `command_line` in its own process group under `working_dir`
    pub fn start(
        &self,
        command_line: &str,
        working_dir: &Path,
        env_vars: &[(String, String)],
        log_path: PathBuf,
    ) -> Result<ChildHandle, SupervisorError> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or(SupervisorError::EmptyCommand)?.to_string();
        let args: Vec<&str> = parts.collect();

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env_vars {
            command.env(key, value);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

        let pid = child.id().unwrap_or_default() as i32;
        // The child is its own group leader
        let pgid = pid;

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Output capture runs on its own worker
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log_max = self.config.log_max_bytes;
        let capture_path = log_path.clone();
        tokio::spawn(async move {
            capture_output(stdout, stderr, capture_path, log_max).await;
        });

        info!(pid, command = %command_line, "child started");
        Ok(ChildHandle {
            child,
            pgid,
            command_name: program,
            log_path,
            killed: false,
        })
    }

    /// Current status without blocking
    pub fn status(&self, handle: &mut ChildHandle) -> ChildStatus {
        if handle.killed {
            return ChildStatus::Killed;
        }
        match handle.child.try_wait() {
            Ok(Some(status)) => ChildStatus::Exited(status.code().unwrap_or(-1)),
            Ok(None) => ChildStatus::Running,
            Err(_) => ChildStatus::Killed,
        }
    }

    /// Wait for exit up to `timeout`
    pub async fn wait(&self, handle: &mut ChildHandle, timeout: Duration) -> WaitOutcome {
        match tokio::time::timeout(timeout, handle.child.wait()).await {
            Ok(Ok(status)) => WaitOutcome::Exited(status.code().unwrap_or(-1)),
            Ok(Err(e)) => {
                warn!(error = %e, "wait on child failed");
                WaitOutcome::Exited(-1)
            }
            Err(_) => WaitOutcome::TimedOut,
        }
    }

    /// Stop the whole process group; verifies no survivor remains
    pub async fn stop(&self, handle: &mut ChildHandle) -> Result<(), SupervisorError> {
        debug!(pgid = handle.pgid, "stopping child group");

        signal_group(handle.pgid, false);

        let polite = Duration::from_millis(self.config.stop_timeout_ms);
        if self.wait(handle, polite).await == WaitOutcome::TimedOut {
            warn!(pgid = handle.pgid, "polite stop timed out; hard-killing group");
            signal_group(handle.pgid, true);
            let _ = self.wait(handle, Duration::from_millis(self.config.kill_timeout_ms)).await;
        }

        // Reap and verify; retry the kill path instead of trusting it
        let _ = handle.child.try_wait();
        let mut remaining = 10;
        while group_alive(handle.pgid) && remaining > 0 {
            signal_group(handle.pgid, true);
            tokio::time::sleep(Duration::from_millis(100)).await;
            remaining -= 1;
        }

        if group_alive(handle.pgid) {
            // Last resort: kill by name
            warn!(name = %handle.command_name, "group survivors remain; falling back to by-name kill");
            kill_by_name(&handle.command_name).await;
        }

        handle.killed = true;
        info!(pgid = handle.pgid, "child group stopped");
        Ok(())
    }

    /// Drive the child according to the configured run mode
    pub async fn monitor(&self, handle: &mut ChildHandle, mode: RunMode) -> Result<MonitorVerdict, SupervisorError> {
        match mode {
            RunMode::Fixed(duration) => match self.wait(handle, duration).await {
                WaitOutcome::Exited(code) => Ok(MonitorVerdict::EarlyExit(code)),
                WaitOutcome::TimedOut => {
                    self.stop(handle).await?;
                    Ok(MonitorVerdict::CleanRun)
                }
            },
            RunMode::SuccessTimeout { initial, extended } => match self.wait(handle, initial).await {
                WaitOutcome::Exited(code) => Ok(MonitorVerdict::EarlyExit(code)),
                WaitOutcome::TimedOut => {
                    info!("initial window quiet; extending monitoring");
                    match self.wait(handle, extended).await {
                        WaitOutcome::Exited(code) => Ok(MonitorVerdict::EarlyExit(code)),
                        WaitOutcome::TimedOut => {
                            self.stop(handle).await?;
                            Ok(MonitorVerdict::CleanRun)
                        }
                    }
                }
            },
            RunMode::Detach { health_window } => match self.wait(handle, health_window).await {
                WaitOutcome::Exited(code) => Ok(MonitorVerdict::EarlyExit(code)),
                WaitOutcome::TimedOut => Ok(MonitorVerdict::Detached),
            },
        }
    }
}

/// SIGTERM (polite) or SIGKILL to the whole group
fn signal_group(pgid: i32, hard: bool) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;
        let signal = if hard { Signal::SIGKILL } else { Signal::SIGTERM };
        if let Err(e) = kill(Pid::from_raw(-pgid), signal) {
            debug!(pgid, ?signal, error = %e, "group signal failed (group may be gone)");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (pgid, hard);
    }
}

/// Probe the group with signal 0
fn group_alive(pgid: i32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        kill(Pid::from_raw(-pgid), None).is_ok()
    }
    #[cfg(not(unix))]
    {
        let _ = pgid;
        false
    }
}

async fn kill_by_name(name: &str) {
    let _ = Command::new("pkill")
        .args(["-KILL", "-f", name])
        .status()
        .await;
}

/// Reads both output streams into a single rolling log file
async fn capture_output(
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    log_path: PathBuf,
    max_bytes: u64,
) {
    let file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %log_path.display(), error = %e, "cannot open child log");
            return;
        }
    };
    let file = std::sync::Arc::new(tokio::sync::Mutex::new(file));

    let mut writers = Vec::new();
    if let Some(stdout) = stdout {
        writers.push(tokio::spawn(pump(BufReader::new(stdout).lines(), file.clone(), log_path.clone(), max_bytes, "out")));
    }
    if let Some(stderr) = stderr {
        writers.push(tokio::spawn(pump(BufReader::new(stderr).lines(), file.clone(), log_path.clone(), max_bytes, "err")));
    }
    for writer in writers {
        let _ = writer.await;
    }
}

async fn pump<R>(
    mut lines: tokio::io::Lines<R>,
    file: std::sync::Arc<tokio::sync::Mutex<tokio::fs::File>>,
    log_path: PathBuf,
    max_bytes: u64,
    stream: &'static str,
) where
    R: tokio::io::AsyncBufRead + Unpin,
{
    while let Ok(Some(line)) = lines.next_line().await {
        let entry = format!("[{}] {}\n", stream, line);
        let mut file = file.lock().await;

        // Roll when over budget: move aside and start fresh
        if let Ok(meta) = tokio::fs::metadata(&log_path).await
            && meta.len() + entry.len() as u64 > max_bytes
        {
            let rolled = log_path.with_extension("log.1");
            let _ = tokio::fs::rename(&log_path, &rolled).await;
            if let Ok(fresh) = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .await
            {
                *file = fresh;
            }
        }

        let _ = file.write_all(entry.as_bytes()).await;
    }
}
