// src/exec/process.rs

//! A child process running in its own process group.

use std::fmt;
use std::process::Stdio;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, getpgid};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{DevloopError, Result};

/// Observable lifecycle of a [`ManagedProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: u32, pgid: i32 },
    Exited,
}

enum Slot {
    NotStarted,
    Running { child: Child, pid: u32, pgid: i32 },
    /// The leader is gone. `pgid` is kept until the group has been killed,
    /// since children of the leader may still be in it.
    Exited { pgid: Option<i32> },
}

/// Owner of at most one live process of a given role (`app`, `debugger`).
///
/// The process is started as the leader of a new process group, and
/// termination signals the whole group so anything it spawned goes too.
pub struct ManagedProcess {
    role: &'static str,
    slot: Slot,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("role", &self.role)
            .field("state", &self.peek_state())
            .finish()
    }
}

impl ManagedProcess {
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            slot: Slot::NotStarted,
        }
    }

    fn peek_state(&self) -> ProcessState {
        match &self.slot {
            Slot::NotStarted => ProcessState::NotStarted,
            Slot::Running { pid, pgid, .. } => ProcessState::Running {
                pid: *pid,
                pgid: *pgid,
            },
            Slot::Exited { .. } => ProcessState::Exited,
        }
    }

    /// Current state; notices a process that exited on its own.
    pub fn state(&mut self) -> ProcessState {
        if let Slot::Running { child, pid, pgid } = &mut self.slot {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(process = self.role, pid = *pid, %status, "process exited");
                    self.slot = Slot::Exited { pgid: Some(*pgid) };
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(process = self.role, error = %err, "failed to poll process status")
                }
            }
        }
        self.peek_state()
    }

    /// Pid of the live process, if any.
    pub fn pid(&mut self) -> Option<u32> {
        match self.state() {
            ProcessState::Running { pid, .. } => Some(pid),
            _ => None,
        }
    }

    /// Spawn `cmd` as the leader of a new process group, streaming its
    /// stdout/stderr into the log line by line.
    ///
    /// Any previous process must already have been terminated.
    pub fn start(&mut self, mut cmd: Command) -> Result<u32> {
        debug_assert!(
            !matches!(self.slot, Slot::Running { .. }),
            "start called while {} is running",
            self.role
        );

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| DevloopError::ProcessStart {
            what: self.role,
            source,
        })?;

        let pid = child.id().ok_or_else(|| DevloopError::ProcessStart {
            what: self.role,
            source: std::io::Error::other("process exited before its pid was read"),
        })?;
        let pgid = pid as i32;

        if let Some(stdout) = child.stdout.take() {
            stream_lines(self.role, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            stream_lines(self.role, "stderr", stderr);
        }

        info!(process = self.role, pid, "process started");
        self.slot = Slot::Running { child, pid, pgid };
        Ok(pid)
    }

    /// Kill the whole process group and reap the leader.
    ///
    /// A leader that already exited on its own may have left children in
    /// its group; those are killed too. Returns once the leader has been
    /// waited on, so the pair can be safely replaced afterwards.
    pub async fn terminate(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Exited { pgid: None }) {
            Slot::Running { mut child, pid, pgid } => {
                let group = getpgid(Some(Pid::from_raw(pid as i32))).unwrap_or(Pid::from_raw(pgid));
                if !self.kill_group(group) {
                    if let Err(err) = child.start_kill() {
                        warn!(process = self.role, pid, error = %err, "failed to kill process");
                    }
                }

                match child.wait().await {
                    Ok(status) => info!(process = self.role, pid, %status, "process stopped"),
                    Err(err) => warn!(process = self.role, pid, error = %err, "failed to reap process"),
                }
            }
            Slot::Exited { pgid: Some(pgid) } => {
                self.kill_group(Pid::from_raw(pgid));
            }
            idle => self.slot = idle,
        }
    }

    /// SIGKILL every member of `group`. False only if the signal could not
    /// be delivered to a group that still exists.
    fn kill_group(&self, group: Pid) -> bool {
        match killpg(group, Signal::SIGKILL) {
            Ok(()) => {
                debug!(process = self.role, pgid = group.as_raw(), "killed process group");
                true
            }
            Err(Errno::ESRCH) => {
                debug!(process = self.role, pgid = group.as_raw(), "process group already gone");
                true
            }
            Err(err) => {
                warn!(process = self.role, pgid = group.as_raw(), error = %err, "failed to kill process group");
                false
            }
        }
    }
}

fn stream_lines<R>(role: &'static str, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stream == "stderr" {
                warn!(process = role, stream, "{}", line);
            } else {
                info!(process = role, stream, "{}", line);
            }
        }
        debug!(process = role, stream, "output stream closed");
    });
}
