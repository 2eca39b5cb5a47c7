//! The "has Zeus finished booting" predicate.

use super::boot_plan::BootPlan;
use super::log_scan::{scan_log, LogScan};
use crate::config::PreloaderPaths;
use crate::error::{Result, ZeusError};
use crate::poll::BoundedPoll;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Compares the components announced in the Zeus log against the boot plan.
///
/// The plan is read lazily on first use. Once every component has been seen
/// ready the answer stays `true` until [`reset`](Self::reset) is called for
/// a new process.
#[derive(Debug)]
pub struct ReadinessMonitor {
    boot_plan_path: PathBuf,
    log_file: PathBuf,
    plan: Option<BootPlan>,
    ready: bool,
}

impl ReadinessMonitor {
    pub fn new(paths: &PreloaderPaths) -> Self {
        Self {
            boot_plan_path: paths.boot_plan.clone(),
            log_file: paths.log_file.clone(),
            plan: None,
            ready: false,
        }
    }

    /// Use `plan` instead of reading `zeus.json`.
    pub fn with_plan(mut self, plan: BootPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// The expected component set, loading it on first call.
    pub fn plan(&mut self) -> Result<&BootPlan> {
        if self.plan.is_none() {
            self.plan = Some(BootPlan::load(&self.boot_plan_path)?);
        }
        self.plan
            .as_ref()
            .ok_or_else(|| ZeusError::Other("boot plan was not loaded".to_string()))
    }

    /// Forget a previous `true`; the next process has to boot again.
    pub fn reset(&mut self) {
        self.ready = false;
    }

    pub fn is_ready(&mut self) -> Result<bool> {
        if self.ready {
            return Ok(true);
        }
        let expected = self.plan()?.components().clone();
        let scan = scan_log(&self.log_file)?;
        log_unbooted(&scan);

        self.ready = !expected.is_empty() && expected.is_subset(&scan.ready);
        Ok(self.ready)
    }

    /// Components of the plan not yet reported ready.
    pub fn missing_components(&mut self) -> Result<BTreeSet<String>> {
        let expected = self.plan()?.components().clone();
        let scan = scan_log(&self.log_file)?;
        Ok(expected.difference(&scan.ready).cloned().collect())
    }

    /// Poll until ready or `poll` runs out. A timeout is a warning, not an
    /// error.
    pub fn wait_until_ready(&mut self, poll: &BoundedPoll) -> Result<bool> {
        let mut failure = None;
        let ready = poll.wait_until(|| match self.is_ready() {
            Ok(ready) => ready,
            Err(e) => {
                failure = Some(e);
                true
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        if ready {
            info!("Zeus is ready");
        } else {
            let missing: Vec<String> = self.missing_components()?.into_iter().collect();
            warn!(
                "Zeus did not finish booting within the timeout, still waiting on: {}",
                missing.join(", ")
            );
        }
        Ok(ready)
    }
}

fn log_unbooted(scan: &LogScan) {
    if !scan.unbooted.is_empty() {
        debug!("Zeus processes not booted yet: {:?}", scan.unbooted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn monitor(dir: &TempDir, plan: BootPlan) -> (ReadinessMonitor, PathBuf) {
        let paths = SupervisorConfig::new(dir.path()).paths();
        fs::create_dir_all(paths.log_file.parent().unwrap()).unwrap();
        let log = paths.log_file.clone();
        (ReadinessMonitor::new(&paths).with_plan(plan), log)
    }

    #[test]
    fn test_ready_only_when_all_components_are() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, log) = monitor(&dir, BootPlan::from_components(["a", "b"]));

        assert!(!monitor.is_ready().unwrap());

        fs::write(&log, "t t x a/12 SReady\n").unwrap();
        assert!(!monitor.is_ready().unwrap());
        assert_eq!(
            monitor.missing_components().unwrap(),
            BTreeSet::from(["b".to_string()])
        );

        fs::write(&log, "t t x a/12 SReady\nt t x b/13 SReady\n").unwrap();
        assert!(monitor.is_ready().unwrap());
    }

    #[test]
    fn test_ready_is_memoized() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, log) = monitor(&dir, BootPlan::from_components(["a", "b"]));
        fs::write(&log, "t t x a/1 SReady\nt t x b/2 SReady\n").unwrap();
        assert!(monitor.is_ready().unwrap());

        fs::write(&log, "").unwrap();
        assert!(monitor.is_ready().unwrap());

        monitor.reset();
        assert!(!monitor.is_ready().unwrap());
    }

    #[test]
    fn test_empty_plan_never_ready() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, log) = monitor(&dir, BootPlan::default());
        fs::write(&log, "t t x a/1 SReady\n").unwrap();
        assert!(!monitor.is_ready().unwrap());
    }

    #[test]
    fn test_unbooted_lines_do_not_count() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, log) = monitor(&dir, BootPlan::from_components(["a"]));
        fs::write(&log, "t t x a/1 unbooted\n").unwrap();
        assert!(!monitor.is_ready().unwrap());
    }

    #[test]
    fn test_wait_times_out_without_error() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, _log) = monitor(&dir, BootPlan::from_components(["a"]));
        let poll = BoundedPoll::new(3, Duration::ZERO);
        assert!(!monitor.wait_until_ready(&poll).unwrap());
    }

    #[test]
    fn test_wait_surfaces_bad_boot_plan() {
        let dir = TempDir::new().unwrap();
        let paths = SupervisorConfig::new(dir.path()).paths();
        fs::write(&paths.boot_plan, "{ not json").unwrap();
        let mut monitor = ReadinessMonitor::new(&paths);

        let poll = BoundedPoll::new(3, Duration::ZERO);
        let err = monitor.wait_until_ready(&poll).unwrap_err();
        assert!(matches!(err, ZeusError::BootPlan { .. }));
    }

    #[test]
    fn test_plan_loaded_from_project() {
        let dir = TempDir::new().unwrap();
        let paths = SupervisorConfig::new(dir.path()).paths();
        fs::write(&paths.boot_plan, r#"{"plan": {"boot": {}}}"#).unwrap();
        let mut monitor = ReadinessMonitor::new(&paths);

        assert_eq!(monitor.plan().unwrap(), &BootPlan::from_components(["boot"]));
    }
}
