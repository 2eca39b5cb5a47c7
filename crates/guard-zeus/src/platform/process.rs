//! Platform-specific process and socket primitives.
//!
//! Everything that talks to the kernel lives here. Zeus itself only runs on
//! Unix, so the non-Unix branches report an error instead of guessing.

use crate::error::{Result, ZeusError};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Result of a non-blocking wait on a tracked PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapStatus {
    /// The child exited and has been reaped.
    Exited,
    /// The child is still running.
    Running,
    /// The PID is not our child (ECHILD), e.g. it was reaped already or was
    /// started by another runner. Treated as exited.
    NotChild,
}

/// Whether a signal reached its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    Delivered,
    /// ESRCH: no process with that PID exists any more.
    NoSuchProcess,
}

/// State of an existing `.zeus.sock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketProbe {
    /// Something accepted the connection.
    Live,
    /// Connection refused: nobody is listening.
    Stale,
}

#[cfg(unix)]
fn nix_pid(pid: u32) -> Result<nix::unistd::Pid> {
    let raw = i32::try_from(pid)
        .map_err(|_| ZeusError::Other(format!("PID {} does not fit in pid_t", pid)))?;
    Ok(nix::unistd::Pid::from_raw(raw))
}

/// Check if a process with the given PID is alive (`kill(pid, 0)`).
///
/// EPERM means the process exists but belongs to another user.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;

        let Ok(nix_pid) = nix_pid(pid) else {
            return false;
        };
        match nix::sys::signal::kill(nix_pid, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

#[cfg(unix)]
fn send(pid: u32, signal: nix::sys::signal::Signal) -> Result<SignalDelivery> {
    use nix::errno::Errno;

    debug!("Sending {} to process {}", signal.as_str(), pid);
    match nix::sys::signal::kill(nix_pid(pid)?, signal) {
        Ok(()) => Ok(SignalDelivery::Delivered),
        Err(Errno::ESRCH) => Ok(SignalDelivery::NoSuchProcess),
        Err(e) => Err(ZeusError::Signal {
            pid,
            signal: signal.as_str(),
            message: e.to_string(),
        }),
    }
}

/// Send SIGINT, Zeus's graceful shutdown signal.
pub fn send_interrupt(pid: u32) -> Result<SignalDelivery> {
    #[cfg(unix)]
    {
        send(pid, nix::sys::signal::Signal::SIGINT)
    }

    #[cfg(not(unix))]
    {
        Err(unsupported(pid, "SIGINT"))
    }
}

/// Send SIGKILL.
pub fn send_kill(pid: u32) -> Result<SignalDelivery> {
    #[cfg(unix)]
    {
        send(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(not(unix))]
    {
        Err(unsupported(pid, "SIGKILL"))
    }
}

#[cfg(not(unix))]
fn unsupported(pid: u32, signal: &'static str) -> ZeusError {
    ZeusError::Signal {
        pid,
        signal,
        message: "signals are only supported on Unix".into(),
    }
}

/// Non-blocking `waitpid(pid, WNOHANG)`.
pub fn try_reap(pid: u32) -> Result<ReapStatus> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};

        match waitpid(nix_pid(pid)?, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(ReapStatus::Running),
            Ok(status) => {
                debug!("Reaped process {}: {:?}", pid, status);
                Ok(ReapStatus::Exited)
            }
            Err(Errno::ECHILD) => Ok(ReapStatus::NotChild),
            Err(e) => Err(ZeusError::Other(format!("waitpid({}) failed: {}", pid, e))),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Ok(ReapStatus::NotChild)
    }
}

/// Try to connect to a Unix socket.
///
/// Only "connection refused" counts as stale; any other failure is an
/// environment problem and is returned.
pub fn probe_socket(path: &Path) -> Result<SocketProbe> {
    #[cfg(unix)]
    {
        match std::os::unix::net::UnixStream::connect(path) {
            Ok(_stream) => Ok(SocketProbe::Live),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => Ok(SocketProbe::Stale),
            Err(e) => Err(ZeusError::io_with_path(e, path)),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(SocketProbe::Stale)
    }
}

fn shell(command_line: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line).current_dir(cwd);
    cmd
}

/// Start `command_line` through the shell as a detached child and return
/// its PID.
///
/// The shell `exec`s the command so the PID is the command itself, not an
/// intermediate `sh`. The child gets its own process group so a Ctrl-C aimed
/// at the watcher does not reach it; the supervisor signals it explicitly.
pub fn spawn_detached(command_line: &str, cwd: &Path) -> Result<u32> {
    let mut cmd = shell(&format!("exec {}", command_line), cwd);
    cmd.stdin(Stdio::null());

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|source| ZeusError::SpawnFailed {
        command: command_line.to_string(),
        source,
    })?;
    // The child is reaped later through `try_reap`; dropping the handle
    // neither waits nor kills.
    Ok(child.id())
}

/// Run `command_line` through the shell and block until it finishes.
///
/// Returns the exit code, `None` when the command died from a signal.
pub fn run_blocking(command_line: &str, cwd: &Path) -> Result<Option<i32>> {
    let status = shell(command_line, cwd)
        .status()
        .map_err(|source| ZeusError::SpawnFailed {
            command: command_line.to_string(),
            source,
        })?;
    Ok(status.code())
}
