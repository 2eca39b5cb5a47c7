//! Lifecycle of the one Zeus process a runner owns.

use super::control::ProcessControl;
use crate::config::PreloaderPaths;
use crate::dispatch::CommandLine;
use crate::error::{Result, ZeusError};
use crate::platform::{self, ReapStatus, SignalDelivery, SocketProbe};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settle time for reaping a SIGKILLed child.
const KILL_REAP_ATTEMPTS: u32 = 10;
const KILL_REAP_INTERVAL: Duration = Duration::from_millis(20);

/// What `attach_existing` found at the socket path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// No `.zeus.sock`.
    NoSocket,
    /// A live instance answered; its PID came from the PID file if readable.
    Reused { pid: Option<u32> },
    /// The socket refused connections and was deleted.
    StaleRemoved,
}

/// Result of the mechanical stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No PID was tracked; nothing was signalled.
    NotTracked,
    Terminated { pid: u32, escalated: bool },
}

/// Owns the PID of the supervised Zeus process and the files it shares
/// with it.
pub struct ProcessSupervisor {
    paths: PreloaderPaths,
    control: Arc<dyn ProcessControl>,
    pid: Mutex<Option<u32>>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("paths", &self.paths)
            .field("pid", &self.pid())
            .finish()
    }
}

impl ProcessSupervisor {
    pub fn new(paths: PreloaderPaths, control: Arc<dyn ProcessControl>) -> Self {
        Self {
            paths,
            control,
            pid: Mutex::new(None),
        }
    }

    fn lock_pid(&self) -> MutexGuard<'_, Option<u32>> {
        self.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn paths(&self) -> &PreloaderPaths {
        &self.paths
    }

    /// PID of the tracked process, if any.
    pub fn pid(&self) -> Option<u32> {
        *self.lock_pid()
    }

    /// Probe an existing `.zeus.sock` and either adopt the live instance or
    /// delete the stale socket.
    pub fn attach_existing(&self) -> Result<Attach> {
        let socket = &self.paths.socket;
        if !socket.exists() {
            return Ok(Attach::NoSocket);
        }
        info!("Guard::Zeus found an existing .zeus.sock");

        match platform::probe_socket(socket)? {
            SocketProbe::Live => {
                let pid = self.read_pid_file();
                if let Some(pid) = pid.filter(|&pid| !platform::is_process_alive(pid)) {
                    warn!("PID file names process {}, which is not running", pid);
                }
                *self.lock_pid() = pid;
                info!("Guard::Zeus is re-using an existing .zeus.sock (PID {:?})", pid);
                Ok(Attach::Reused { pid })
            }
            SocketProbe::Stale => {
                info!("Guard::Zeus is deleting an unusable .zeus.sock");
                remove_strict(socket)?;
                Ok(Attach::StaleRemoved)
            }
        }
    }

    /// Delete a log left over from a previous run so old `SReady` lines do
    /// not count towards readiness.
    pub fn clear_stale_log(&self) -> Result<()> {
        if self.paths.log_file.exists() {
            info!("Guard::Zeus is deleting an existing logfile");
            remove_strict(&self.paths.log_file)?;
        }
        Ok(())
    }

    /// Spawn Zeus and record its PID in memory and in the PID file.
    pub fn spawn(&self, command: &CommandLine) -> Result<u32> {
        ensure_parent(&self.paths.pid_file)?;
        ensure_parent(&self.paths.log_file)?;

        debug!("About to spawn zeus: {}", command);
        let pid = self.control.spawn_detached(&command.to_string())?;

        if let Err(e) = fs::write(&self.paths.pid_file, pid.to_string()) {
            warn!("Failed to write PID file {:?}: {}", self.paths.pid_file, e);
        }

        *self.lock_pid() = Some(pid);
        debug!("Zeus has PID {}", pid);
        Ok(pid)
    }

    /// Run a workload to completion. The exit status is only logged.
    pub fn run(&self, command: &CommandLine) -> Result<()> {
        let line = command.to_string();
        info!("Running: {}", line);
        match self.control.run(&line)? {
            Some(0) => debug!("`{}` succeeded", line),
            Some(code) => debug!("`{}` exited with status {}", line, code),
            None => debug!("`{}` was terminated by a signal", line),
        }
        Ok(())
    }

    /// SIGINT, a non-blocking wait, SIGKILL if still running, then delete
    /// the PID file, log and socket.
    ///
    /// Takes the PID under the lock, so concurrent callers signal at most
    /// once; the loser sees [`Termination::NotTracked`].
    pub fn terminate(&self) -> Result<Termination> {
        let pid = self.lock_pid().take();
        self.terminate_taken(pid)
    }

    /// Like [`terminate`](Self::terminate), but only if `expected` is still
    /// the tracked PID. A process spawned since then is left alone.
    pub fn terminate_if_tracking(&self, expected: u32) -> Result<Termination> {
        let pid = {
            let mut guard = self.lock_pid();
            if *guard == Some(expected) {
                guard.take()
            } else {
                None
            }
        };
        self.terminate_taken(pid)
    }

    fn terminate_taken(&self, pid: Option<u32>) -> Result<Termination> {
        let Some(pid) = pid else {
            debug!("No Zeus PID tracked, nothing to stop");
            return Ok(Termination::NotTracked);
        };

        debug!("Stopping Zeus using PID {}", pid);
        let escalated = match self.signal(pid) {
            Ok(escalated) => escalated,
            Err(e) => {
                self.restore_pid(pid);
                return Err(e);
            }
        };

        self.cleanup_files();
        info!("Zeus Stopped");
        Ok(Termination::Terminated { pid, escalated })
    }

    fn signal(&self, pid: u32) -> Result<bool> {
        match self.control.interrupt(pid)? {
            SignalDelivery::NoSuchProcess => {
                debug!("Process {} was already gone", pid);
                Ok(false)
            }
            SignalDelivery::Delivered => self.escalate_if_running(pid),
        }
    }

    /// Track `pid` again after a failed stop, unless a newer process took
    /// the slot meanwhile.
    fn restore_pid(&self, pid: u32) {
        let mut guard = self.lock_pid();
        if guard.is_none() {
            warn!("Stopping Zeus PID {} failed, still tracking it", pid);
            *guard = Some(pid);
        }
    }

    fn escalate_if_running(&self, pid: u32) -> Result<bool> {
        match self.control.try_wait(pid)? {
            ReapStatus::Running => {
                debug!("Killing process {} after wait", pid);
                self.control.kill(pid)?;
                info!("Killed process {} after wait", pid);
                self.reap_after_kill(pid);
                Ok(true)
            }
            ReapStatus::Exited => Ok(false),
            ReapStatus::NotChild => {
                debug!("Process {} is not our child; treating it as exited", pid);
                Ok(false)
            }
        }
    }

    /// Best effort: keep a killed child from lingering as a zombie.
    fn reap_after_kill(&self, pid: u32) {
        for _ in 0..KILL_REAP_ATTEMPTS {
            match self.control.try_wait(pid) {
                Ok(ReapStatus::Running) => std::thread::sleep(KILL_REAP_INTERVAL),
                Ok(_) => return,
                Err(e) => {
                    debug!("waitpid after SIGKILL failed for {}: {}", pid, e);
                    return;
                }
            }
        }
        warn!("Process {} still not reaped after SIGKILL", pid);
    }

    fn cleanup_files(&self) {
        remove_best_effort(&self.paths.pid_file, "pidfile");
        remove_best_effort(&self.paths.log_file, "logfile");
        remove_best_effort(&self.paths.socket, ".zeus.sock");
    }

    /// PID recorded by whoever spawned the live instance. A missing or
    /// garbled file yields `None`.
    fn read_pid_file(&self) -> Option<u32> {
        let path = &self.paths.pid_file;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot read Zeus PID file {:?}: {}", path, e);
                return None;
            }
        };
        match raw.trim().parse() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Invalid PID in {:?}: {}", path, e);
                None
            }
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ZeusError::io_with_path(e, parent))?;
        }
    }
    Ok(())
}

/// Delete a file that must go before relaunch. Only "already gone" is
/// tolerated.
fn remove_strict(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ZeusError::io_with_path(e, path)),
    }
}

fn remove_best_effort(path: &Path, what: &str) {
    if !path.exists() {
        return;
    }
    info!("Guard::Zeus is deleting an existing {}", what);
    if let Err(e) = fs::remove_file(path) {
        debug!("Could not delete {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use crate::process::{ControlCall, DryRunControl};
    use tempfile::TempDir;

    fn supervisor(
        dir: &TempDir,
        control: DryRunControl,
    ) -> (ProcessSupervisor, Arc<DryRunControl>) {
        let control = Arc::new(control);
        let paths = SupervisorConfig::new(dir.path()).paths();
        (ProcessSupervisor::new(paths, control.clone()), control)
    }

    fn zeus_start() -> CommandLine {
        CommandLine::new().part("zeus start")
    }

    #[test]
    fn test_terminate_without_pid_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let (sup, control) = supervisor(&dir, DryRunControl::new());

        assert_eq!(sup.terminate().unwrap(), Termination::NotTracked);
        assert!(control.calls().is_empty());
    }

    #[test]
    fn test_spawn_writes_pid_file() {
        let dir = TempDir::new().unwrap();
        let (sup, _control) = supervisor(&dir, DryRunControl::new());

        let pid = sup.spawn(&zeus_start()).unwrap();

        assert_eq!(pid, 123);
        assert_eq!(sup.pid(), Some(123));
        let written = fs::read_to_string(&sup.paths().pid_file).unwrap();
        assert_eq!(written, "123");
        assert!(sup.paths().log_file.parent().unwrap().is_dir());
    }

    #[test]
    fn test_terminate_reaped_process_is_not_killed() {
        let dir = TempDir::new().unwrap();
        let (sup, control) =
            supervisor(&dir, DryRunControl::new().with_wait_results([ReapStatus::Exited]));
        sup.spawn(&zeus_start()).unwrap();

        let outcome = sup.terminate().unwrap();

        assert_eq!(outcome, Termination::Terminated { pid: 123, escalated: false });
        assert_eq!(
            control.calls()[1..],
            [ControlCall::Interrupt(123), ControlCall::TryWait(123)]
        );
    }

    #[test]
    fn test_terminate_running_process_is_killed() {
        let dir = TempDir::new().unwrap();
        let (sup, control) =
            supervisor(&dir, DryRunControl::new().with_wait_results([ReapStatus::Running]));
        sup.spawn(&zeus_start()).unwrap();

        let outcome = sup.terminate().unwrap();

        assert_eq!(outcome, Termination::Terminated { pid: 123, escalated: true });
        assert!(control.calls().contains(&ControlCall::Kill(123)));
    }

    #[test]
    fn test_terminate_not_child_is_not_killed() {
        let dir = TempDir::new().unwrap();
        let (sup, control) =
            supervisor(&dir, DryRunControl::new().with_wait_results([ReapStatus::NotChild]));
        sup.spawn(&zeus_start()).unwrap();

        assert!(sup.terminate().is_ok());
        assert!(!control.calls().contains(&ControlCall::Kill(123)));
    }

    #[test]
    fn test_terminate_vanished_process_skips_wait() {
        let dir = TempDir::new().unwrap();
        let (sup, control) = supervisor(
            &dir,
            DryRunControl::new().with_interrupt_results([SignalDelivery::NoSuchProcess]),
        );
        sup.spawn(&zeus_start()).unwrap();

        assert!(sup.terminate().is_ok());
        assert_eq!(control.calls()[1..], [ControlCall::Interrupt(123)]);
    }

    #[test]
    fn test_failed_interrupt_keeps_process_tracked() {
        let dir = TempDir::new().unwrap();
        let (sup, control) = supervisor(&dir, DryRunControl::new().failing_interrupt());
        sup.spawn(&zeus_start()).unwrap();
        fs::write(&sup.paths().socket, "").unwrap();

        assert!(matches!(sup.terminate(), Err(ZeusError::Signal { pid: 123, .. })));

        assert_eq!(sup.pid(), Some(123));
        assert!(sup.paths().pid_file.exists());
        assert!(sup.paths().socket.exists());

        assert!(sup.terminate().is_err());
        assert_eq!(control.signal_count(), 2);
    }

    #[test]
    fn test_terminate_removes_files_and_is_one_shot() {
        let dir = TempDir::new().unwrap();
        let (sup, control) = supervisor(&dir, DryRunControl::new());
        sup.spawn(&zeus_start()).unwrap();
        fs::write(&sup.paths().socket, "").unwrap();
        fs::write(&sup.paths().log_file, "boot\n").unwrap();

        sup.terminate().unwrap();

        assert!(!sup.paths().socket.exists());
        assert!(!sup.paths().log_file.exists());
        assert!(!sup.paths().pid_file.exists());
        assert_eq!(sup.pid(), None);

        assert_eq!(sup.terminate().unwrap(), Termination::NotTracked);
        assert_eq!(control.signal_count(), 1);
    }

    #[test]
    fn test_terminate_if_tracking_skips_newer_process() {
        let dir = TempDir::new().unwrap();
        let (sup, control) = supervisor(&dir, DryRunControl::new());
        let first = sup.spawn(&zeus_start()).unwrap();
        sup.terminate().unwrap();
        let second = sup.spawn(&zeus_start()).unwrap();

        assert_eq!(sup.terminate_if_tracking(first).unwrap(), Termination::NotTracked);
        assert_eq!(sup.pid(), Some(second));
        assert_eq!(control.signal_count(), 1);
    }

    #[test]
    fn test_attach_without_socket() {
        let dir = TempDir::new().unwrap();
        let (sup, _control) = supervisor(&dir, DryRunControl::new());
        assert_eq!(sup.attach_existing().unwrap(), Attach::NoSocket);
    }

    #[cfg(unix)]
    #[test]
    fn test_attach_live_socket_reads_pid_file() {
        use std::os::unix::net::UnixListener;

        let dir = TempDir::new().unwrap();
        let (sup, _control) = supervisor(&dir, DryRunControl::new());
        let _listener = UnixListener::bind(&sup.paths().socket).unwrap();
        ensure_parent(&sup.paths().pid_file).unwrap();
        fs::write(&sup.paths().pid_file, "4242\n").unwrap();

        assert_eq!(sup.attach_existing().unwrap(), Attach::Reused { pid: Some(4242) });
        assert_eq!(sup.pid(), Some(4242));
        assert!(sup.paths().socket.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_attach_live_socket_with_garbled_pid_file() {
        use std::os::unix::net::UnixListener;

        let dir = TempDir::new().unwrap();
        let (sup, _control) = supervisor(&dir, DryRunControl::new());
        let _listener = UnixListener::bind(&sup.paths().socket).unwrap();
        ensure_parent(&sup.paths().pid_file).unwrap();
        fs::write(&sup.paths().pid_file, "not a pid").unwrap();

        assert_eq!(sup.attach_existing().unwrap(), Attach::Reused { pid: None });
        assert_eq!(sup.pid(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_attach_stale_socket_deletes_it() {
        use std::os::unix::net::UnixListener;

        let dir = TempDir::new().unwrap();
        let (sup, _control) = supervisor(&dir, DryRunControl::new());
        drop(UnixListener::bind(&sup.paths().socket).unwrap());

        assert_eq!(sup.attach_existing().unwrap(), Attach::StaleRemoved);
        assert!(!sup.paths().socket.exists());
        assert_eq!(sup.pid(), None);
    }

    #[test]
    fn test_run_ignores_exit_status() {
        let dir = TempDir::new().unwrap();
        let (sup, control) = supervisor(&dir, DryRunControl::new());
        sup.run(&CommandLine::new().part("zeus test").part("abacus")).unwrap();
        assert_eq!(control.runs(), vec!["zeus test abacus".to_string()]);
    }
}
