//! A [`ProcessControl`] that records instead of executing.
//!
//! Backs the CLI's `--dry-run` flag and the test suites.

use super::control::ProcessControl;
use crate::error::{Result, ZeusError};
use crate::platform::{ReapStatus, SignalDelivery};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    Spawn(String),
    Run(String),
    Interrupt(u32),
    Kill(u32),
    TryWait(u32),
}

/// Records every call. Spawned PIDs count up from `first_pid`; waits
/// answer from a script, then report [`ReapStatus::Exited`].
#[derive(Debug)]
pub struct DryRunControl {
    calls: Mutex<Vec<ControlCall>>,
    wait_script: Mutex<VecDeque<ReapStatus>>,
    interrupt_script: Mutex<VecDeque<SignalDelivery>>,
    next_pid: AtomicU32,
    fail_spawn: bool,
    fail_interrupt: bool,
}

impl Default for DryRunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunControl {
    pub fn new() -> Self {
        Self::starting_at(123)
    }

    /// First spawned PID is `first_pid`.
    pub fn starting_at(first_pid: u32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            wait_script: Mutex::new(VecDeque::new()),
            interrupt_script: Mutex::new(VecDeque::new()),
            next_pid: AtomicU32::new(first_pid),
            fail_spawn: false,
            fail_interrupt: false,
        }
    }

    /// Answers for successive `try_wait` calls.
    pub fn with_wait_results(self, results: impl IntoIterator<Item = ReapStatus>) -> Self {
        lock(&self.wait_script).extend(results);
        self
    }

    /// Answers for successive `interrupt` calls.
    pub fn with_interrupt_results(
        self,
        results: impl IntoIterator<Item = SignalDelivery>,
    ) -> Self {
        lock(&self.interrupt_script).extend(results);
        self
    }

    /// Make every spawn fail as if `sh` were missing.
    pub fn failing_spawn(mut self) -> Self {
        self.fail_spawn = true;
        self
    }

    /// Make every SIGINT fail as if the process belonged to another user.
    pub fn failing_interrupt(mut self) -> Self {
        self.fail_interrupt = true;
        self
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        lock(&self.calls).clone()
    }

    /// Commands passed to `run`, in order.
    pub fn runs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ControlCall::Run(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Commands passed to `spawn_detached`, in order.
    pub fn spawns(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ControlCall::Spawn(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Number of signals of either kind sent.
    pub fn signal_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ControlCall::Interrupt(_) | ControlCall::Kill(_)))
            .count()
    }

    fn record(&self, call: ControlCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProcessControl for DryRunControl {
    fn spawn_detached(&self, command: &str) -> Result<u32> {
        self.record(ControlCall::Spawn(command.to_string()));
        if self.fail_spawn {
            return Err(ZeusError::SpawnFailed {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "dry run spawn failure"),
            });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        info!("[dry run] spawn `{}` as PID {}", command, pid);
        Ok(pid)
    }

    fn run(&self, command: &str) -> Result<Option<i32>> {
        info!("[dry run] run `{}`", command);
        self.record(ControlCall::Run(command.to_string()));
        Ok(Some(0))
    }

    fn interrupt(&self, pid: u32) -> Result<SignalDelivery> {
        self.record(ControlCall::Interrupt(pid));
        if self.fail_interrupt {
            return Err(ZeusError::Signal {
                pid,
                signal: "SIGINT",
                message: "EPERM: Operation not permitted".to_string(),
            });
        }
        Ok(lock(&self.interrupt_script)
            .pop_front()
            .unwrap_or(SignalDelivery::Delivered))
    }

    fn kill(&self, pid: u32) -> Result<SignalDelivery> {
        self.record(ControlCall::Kill(pid));
        Ok(SignalDelivery::Delivered)
    }

    fn try_wait(&self, pid: u32) -> Result<ReapStatus> {
        self.record(ControlCall::TryWait(pid));
        Ok(lock(&self.wait_script)
            .pop_front()
            .unwrap_or(ReapStatus::Exited))
    }
}
