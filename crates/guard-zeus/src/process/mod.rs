//! Process supervision.
//!
//! Handles reuse detection, spawning and stopping of the shared Zeus
//! process.
//!
//! # Reuse Strategy
//!
//! 1. **Socket probe** - a connectable `.zeus.sock` means someone already
//!    runs Zeus; its PID is read from the PID file and nothing is spawned.
//! 2. **Stale socket** - connection refused means the socket is left over;
//!    it is deleted and a fresh Zeus is spawned.
//!
//! OS access goes through [`ProcessControl`] so the supervisor can be
//! driven by [`DryRunControl`] in tests and in `--dry-run` mode.

mod control;
mod dry_run;
mod supervisor;

pub use control::{ProcessControl, SystemProcessControl};
pub use dry_run::{ControlCall, DryRunControl};
pub use supervisor::{Attach, ProcessSupervisor, Termination};
