//! The watcher-facing plugin.

use crate::error::Result;
use crate::runner::Runner;
use crate::shutdown::{ConsumerStatus, StopOutcome};
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle hooks a file watcher calls, backed by a [`Runner`].
///
/// A `ZeusGuard` is itself a consumer of the preloader, so several guards
/// can list each other in their peer registries.
#[derive(Debug)]
pub struct ZeusGuard {
    name: String,
    runner: Runner,
    running: AtomicBool,
}

impl ZeusGuard {
    pub fn new(name: impl Into<String>, runner: Runner) -> Self {
        Self {
            name: name.into(),
            runner,
            running: AtomicBool::new(false),
        }
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    /// Replace whatever this guard ran before with a booted Zeus.
    pub fn start(&self) -> Result<bool> {
        self.restart("Start")
    }

    pub fn reload(&self) -> Result<bool> {
        self.restart("Reload")
    }

    fn restart(&self, action: &str) -> Result<bool> {
        self.runner.stop(true)?;
        self.running.store(true, Ordering::SeqCst);
        self.runner.launch(action)
    }

    pub fn run_all(&self) -> Result<bool> {
        self.runner.run_all()
    }

    pub fn run_on_modifications<S: AsRef<str>>(&self, paths: &[S]) -> Result<()> {
        self.runner.run(paths)
    }

    /// Graceful stop: with `exit_last` the preloader outlives this guard
    /// until its peers are gone too.
    pub fn stop(&self) -> Result<StopOutcome> {
        self.running.store(false, Ordering::SeqCst);
        self.runner.stop(false)
    }
}

impl ConsumerStatus for ZeusGuard {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_preloader_consumer(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
