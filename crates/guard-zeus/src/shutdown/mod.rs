//! Stopping the shared preloader.
//!
//! Several watchers may drive the same Zeus instance. With `exit_last` set,
//! a graceful stop waits on a background [`DeferredStop`] until no other
//! consumer in the [`PeerRegistry`] is running, then stops Zeus.

mod coordinator;
mod deferred;
mod peers;

pub use coordinator::{ShutdownCoordinator, StopOutcome, StopState};
pub use deferred::{DeferredResult, DeferredStop, WORKER_NAME};
pub use peers::{active_peers, ConsumerStatus, NoPeers, PeerRegistry, StaticPeers};
