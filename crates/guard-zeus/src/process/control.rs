//! The seam between the supervisor and the operating system.

use crate::error::Result;
use crate::platform::{self, ReapStatus, SignalDelivery};
use std::path::{Path, PathBuf};

/// Everything the supervisor asks the OS to do to a process.
///
/// [`SystemProcessControl`] is the real implementation;
/// [`DryRunControl`](super::DryRunControl) records calls instead.
pub trait ProcessControl: Send + Sync {
    /// Start `command` detached from the caller and return its PID.
    fn spawn_detached(&self, command: &str) -> Result<u32>;

    /// Run `command` to completion. Returns the exit code if it had one.
    fn run(&self, command: &str) -> Result<Option<i32>>;

    /// Send the graceful stop signal (SIGINT).
    fn interrupt(&self, pid: u32) -> Result<SignalDelivery>;

    /// Send SIGKILL.
    fn kill(&self, pid: u32) -> Result<SignalDelivery>;

    /// Non-blocking wait.
    fn try_wait(&self, pid: u32) -> Result<ReapStatus>;
}

/// Runs commands through `sh -c` in the project root.
#[derive(Debug, Clone)]
pub struct SystemProcessControl {
    cwd: PathBuf,
}

impl SystemProcessControl {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
        }
    }
}

impl ProcessControl for SystemProcessControl {
    fn spawn_detached(&self, command: &str) -> Result<u32> {
        platform::spawn_detached(command, &self.cwd)
    }

    fn run(&self, command: &str) -> Result<Option<i32>> {
        platform::run_blocking(command, &self.cwd)
    }

    fn interrupt(&self, pid: u32) -> Result<SignalDelivery> {
        platform::send_interrupt(pid)
    }

    fn kill(&self, pid: u32) -> Result<SignalDelivery> {
        platform::send_kill(pid)
    }

    fn try_wait(&self, pid: u32) -> Result<ReapStatus> {
        platform::try_reap(pid)
    }
}
