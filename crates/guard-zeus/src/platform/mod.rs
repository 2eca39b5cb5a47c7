//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered through the supervisor.

pub mod process;

pub use process::{
    is_process_alive, probe_socket, run_blocking, send_interrupt, send_kill, spawn_detached,
    try_reap, ReapStatus, SignalDelivery, SocketProbe,
};
