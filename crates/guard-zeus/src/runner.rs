//! One watcher's handle on the shared Zeus preloader.

use crate::config::{PreloaderPaths, SupervisorConfig};
use crate::dispatch::{Environment, ZeusCommand};
use crate::error::Result;
use crate::poll::BoundedPoll;
use crate::process::{Attach, ProcessControl, ProcessSupervisor, SystemProcessControl};
use crate::readiness::ReadinessMonitor;
use crate::shutdown::{DeferredStop, PeerRegistry, ShutdownCoordinator, StopOutcome};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Starts or reuses Zeus, runs tests through it and stops it.
#[derive(Debug)]
pub struct Runner {
    config: SupervisorConfig,
    environment: Environment,
    poll: BoundedPoll,
    supervisor: Arc<ProcessSupervisor>,
    readiness: Mutex<ReadinessMonitor>,
    shutdown: ShutdownCoordinator,
}

impl Runner {
    /// A runner that spawns real processes in `config.root`.
    pub fn new(config: SupervisorConfig, registry: Arc<dyn PeerRegistry>) -> Result<Self> {
        let control = Arc::new(SystemProcessControl::new(&config.root));
        Self::with_control(config, control, registry)
    }

    /// A runner that goes through `control` for every process operation.
    pub fn with_control(
        config: SupervisorConfig,
        control: Arc<dyn ProcessControl>,
        registry: Arc<dyn PeerRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let paths = config.paths();
        let poll = BoundedPoll::from_config(&config);
        let supervisor = Arc::new(ProcessSupervisor::new(paths.clone(), control));
        let shutdown =
            ShutdownCoordinator::new(Arc::clone(&supervisor), registry, poll, config.exit_last);

        Ok(Self {
            environment: Environment::new(&config),
            readiness: Mutex::new(ReadinessMonitor::new(&paths)),
            config,
            poll,
            supervisor,
            shutdown,
        })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn paths(&self) -> &PreloaderPaths {
        self.supervisor.paths()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// PID of the Zeus process this runner tracks.
    pub fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    fn readiness(&self) -> MutexGuard<'_, ReadinessMonitor> {
        self.readiness.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn command(&self) -> ZeusCommand {
        ZeusCommand::new(self.environment.bundler())
    }

    /// Make sure a booted Zeus is available.
    ///
    /// Returns `true` when a live instance was reused or a new one reported
    /// every boot-plan stage ready in time. A boot timeout is `Ok(false)`.
    pub fn launch(&self, action: &str) -> Result<bool> {
        info!("{}ing Zeus...", action);

        if let Attach::Reused { .. } = self.supervisor.attach_existing()? {
            return Ok(true);
        }
        self.supervisor.clear_stale_log()?;

        let paths = self.supervisor.paths();
        let log_flag = (!paths.log_from_cli).then_some(paths.log_file.as_path());
        let start = self.command().start(log_flag, self.config.cli.as_deref());
        self.supervisor.spawn(&start)?;
        self.shutdown.reset_for_new_process();

        let mut readiness = self.readiness();
        readiness.reset();
        readiness.wait_until_ready(&self.poll)
    }

    /// Adopt a Zeus started elsewhere without spawning one.
    pub fn attach(&self) -> Result<Attach> {
        self.supervisor.attach_existing()
    }

    /// Run the given test files through `zeus test`.
    pub fn run<S: AsRef<str>>(&self, paths: &[S]) -> Result<()> {
        self.supervisor.run(&self.command().test(paths))
    }

    /// Run the whole suite if enabled and a framework was detected. Returns
    /// whether anything ran.
    pub fn run_all(&self) -> Result<bool> {
        if !self.config.run_all {
            debug!("run_all is disabled");
            return Ok(false);
        }
        match self.environment.suite_targets() {
            Some(targets) => {
                self.run(&targets)?;
                Ok(true)
            }
            None => {
                debug!("Neither RSpec nor Test::Unit detected, nothing to run");
                Ok(false)
            }
        }
    }

    /// Stop now (`force`) or once the other consumers are gone.
    pub fn stop(&self, force: bool) -> Result<StopOutcome> {
        self.shutdown.request_stop(force)
    }

    /// Handle of a deferred stop scheduled by [`stop`](Self::stop).
    pub fn take_deferred_stop(&self) -> Option<DeferredStop> {
        self.shutdown.take_deferred_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::DryRunControl;
    use crate::shutdown::NoPeers;
    use std::fs;
    use tempfile::TempDir;

    fn runner(config: SupervisorConfig) -> (Runner, Arc<DryRunControl>) {
        let control = Arc::new(DryRunControl::new());
        let runner = Runner::with_control(config, control.clone(), Arc::new(NoPeers)).unwrap();
        (runner, control)
    }

    #[test]
    fn test_launch_passes_log_and_cli() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Gemfile"), "").unwrap();
        let config = SupervisorConfig::new(dir.path())
            .with_timeout(0.0)
            .with_cli("--verbose");
        let (runner, control) = runner(config);

        assert!(!runner.launch("Start").unwrap());

        let log = dir.path().join("log").join("zeus_output.log");
        assert_eq!(
            control.spawns(),
            vec![format!(
                "bundle exec zeus start --log {} --verbose",
                log.display()
            )]
        );
        assert_eq!(runner.pid(), Some(123));
    }

    #[test]
    fn test_launch_with_log_in_cli() {
        let dir = TempDir::new().unwrap();
        let config = SupervisorConfig::new(dir.path())
            .with_timeout(0.0)
            .with_cli("--log custom.log");
        let (runner, control) = runner(config);

        runner.launch("Start").unwrap();

        assert_eq!(control.spawns(), vec!["zeus start --log custom.log".to_string()]);
        assert_eq!(runner.paths().log_file, dir.path().join("custom.log"));
    }

    #[test]
    fn test_launch_removes_old_log() {
        let dir = TempDir::new().unwrap();
        let (runner, _control) = runner(SupervisorConfig::new(dir.path()).with_timeout(0.0));
        fs::create_dir_all(dir.path().join("log")).unwrap();
        fs::write(&runner.paths().log_file, "a b c boot/1 SReady\n").unwrap();

        runner.launch("Start").unwrap();

        assert!(!runner.paths().log_file.exists());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SupervisorConfig::new("/app").with_timeout(-1.0);
        let control = Arc::new(DryRunControl::new());
        let result = Runner::with_control(config, control, Arc::new(NoPeers));
        assert!(result.is_err());
    }
}
