//! Boot readiness.
//!
//! Zeus boots the stages named in `zeus.json` and logs an `SReady` line for
//! each one. The preloader counts as ready once every stage has been seen.

mod boot_plan;
mod log_scan;
mod monitor;

pub use boot_plan::BootPlan;
pub use log_scan::{scan_log, LogScan, READY_MARKER, UNBOOTED_MARKER};
pub use monitor::ReadinessMonitor;
