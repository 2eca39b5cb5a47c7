//! guard-zeus - supervisor for a shared Zeus preloader.
//!
//! Several file watchers can share one Zeus process per project. A
//! [`Runner`] reuses a live instance when `.zeus.sock` answers, otherwise
//! spawns `zeus start` and waits until every stage of the boot plan has
//! logged `SReady`. Test runs go through `zeus test`. Stopping is either
//! immediate or deferred until the last consumer in the [`PeerRegistry`]
//! has gone.
//!
//! # Example
//!
//! ```rust,ignore
//! use guard_zeus::{NoPeers, Runner, SupervisorConfig};
//! use std::sync::Arc;
//!
//! fn main() -> guard_zeus::Result<()> {
//!     let config = SupervisorConfig::new("/path/to/app").with_timeout(60.0);
//!     let runner = Runner::new(config, Arc::new(NoPeers))?;
//!
//!     if runner.launch("Start")? {
//!         runner.run(&["spec/models/user_spec.rb"])?;
//!     }
//!     runner.stop(true)?;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod platform;
pub mod poll;
pub mod process;
pub mod readiness;
pub mod runner;
pub mod shutdown;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{Detect, PreloaderPaths, SupervisorConfig};
pub use error::{Result, ZeusError};
pub use guard::ZeusGuard;
pub use poll::{BoundedPoll, PollOutcome};
pub use process::{Attach, DryRunControl, ProcessControl, SystemProcessControl, Termination};
pub use readiness::{BootPlan, ReadinessMonitor};
pub use runner::Runner;
pub use shutdown::{
    ConsumerStatus, DeferredResult, DeferredStop, NoPeers, PeerRegistry, StaticPeers, StopOutcome,
    StopState,
};
