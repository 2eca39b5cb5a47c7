//! Configuration for the Zeus supervisor.
//!
//! Fixed file names and poll limits live in unit structs; everything a user
//! can change is in [`SupervisorConfig`], which deserializes from the same
//! option names the Guardfile used (`run_all`, `exit_last`, `cli`, ...).

use crate::dispatch::log_path_from_cli;
use crate::error::{Result, ZeusError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names Zeus and the supervisor share, relative to the project root.
pub struct ZeusFiles;

impl ZeusFiles {
    pub const SOCKET_FILE: &'static str = ".zeus.sock";
    pub const BOOT_PLAN_FILE: &'static str = "zeus.json";
    pub const DEFAULT_LOG_DIR: &'static str = "log";
    pub const DEFAULT_LOG_FILE: &'static str = "zeus_output.log";
    pub const DEFAULT_PID_DIR: [&'static str; 2] = ["tmp", "pids"];
    pub const DEFAULT_PID_FILE: &'static str = "zeus_wrapper.pid";
    pub const GEMFILE: &'static str = "Gemfile";
    pub const RSPEC_DIR: &'static str = "spec";
    pub const TEST_UNIT_HELPER: [&'static str; 2] = ["test", "test_helper.rb"];
}

/// Bounded polling used for both boot readiness and peer shutdown.
pub struct PollConfig;

impl PollConfig {
    /// Number of sleeps before a wait gives up.
    pub const MAX_WAIT_COUNT: u32 = 10;
    pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
}

/// Three-way override for an auto-detected environment flag.
///
/// Serialized as `true`, `false` or absent/`null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Detect {
    /// Look at the filesystem.
    #[default]
    Auto,
    On,
    Off,
}

impl From<Option<bool>> for Detect {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Detect::On,
            Some(false) => Detect::Off,
            None => Detect::Auto,
        }
    }
}

impl From<Detect> for Option<bool> {
    fn from(value: Detect) -> Self {
        match value {
            Detect::On => Some(true),
            Detect::Off => Some(false),
            Detect::Auto => None,
        }
    }
}

/// Runner configuration, resolved once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Project root; every default path is derived from it.
    pub root: PathBuf,
    /// Run the whole suite when the watcher asks for `run_all`.
    pub run_all: bool,
    /// Defer a graceful stop until no peer consumer is active.
    pub exit_last: bool,
    pub log_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    /// Seconds shared by the readiness wait and the peer wait.
    pub timeout: f64,
    /// Extra arguments appended to `zeus start`.
    pub cli: Option<String>,
    pub bundler: Detect,
    pub rspec: Detect,
    pub test_unit: Detect,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            run_all: true,
            exit_last: true,
            log_file: None,
            pid_file: None,
            timeout: PollConfig::DEFAULT_TIMEOUT_SECS,
            cli: None,
            bundler: Detect::Auto,
            rspec: Detect::Auto,
            test_unit: Detect::Auto,
        }
    }
}

impl SupervisorConfig {
    /// Create a config rooted at `root` with default options.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load options from a JSON file. A relative or missing `root` is
    /// resolved against the current directory.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ZeusError::io_with_path(e, path))?;
        let mut config: SupervisorConfig = serde_json::from_str(&raw)?;
        if config.root.is_relative() {
            let cwd = std::env::current_dir()?;
            config.root = cwd.join(&config.root);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_run_all(mut self, run_all: bool) -> Self {
        self.run_all = run_all;
        self
    }

    pub fn with_exit_last(mut self, exit_last: bool) -> Self {
        self.exit_last = exit_last;
        self
    }

    pub fn with_log_file(mut self, path: impl AsRef<Path>) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_pid_file(mut self, path: impl AsRef<Path>) -> Self {
        self.pid_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_cli(mut self, args: impl Into<String>) -> Self {
        self.cli = Some(args.into());
        self
    }

    pub fn with_bundler(mut self, detect: Detect) -> Self {
        self.bundler = detect;
        self
    }

    pub fn with_rspec(mut self, detect: Detect) -> Self {
        self.rspec = detect;
        self
    }

    pub fn with_test_unit(mut self, detect: Detect) -> Self {
        self.test_unit = detect;
        self
    }

    /// Reject values the poll loop cannot turn into a sleep interval.
    pub fn validate(&self) -> Result<()> {
        if !self.timeout.is_finite() || self.timeout < 0.0 {
            return Err(ZeusError::Config {
                message: format!("timeout must be a non-negative number, got {}", self.timeout),
            });
        }
        Ok(())
    }

    /// Sleep between two poll attempts: `timeout / MAX_WAIT_COUNT`.
    pub fn poll_interval(&self) -> Duration {
        let secs = self.timeout / f64::from(PollConfig::MAX_WAIT_COUNT);
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }

    /// Resolve the files this runner shares with Zeus.
    pub fn paths(&self) -> PreloaderPaths {
        PreloaderPaths::resolve(self)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Filesystem locations shared between the supervisor and Zeus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloaderPaths {
    pub socket: PathBuf,
    pub log_file: PathBuf,
    pub pid_file: PathBuf,
    pub boot_plan: PathBuf,
    /// True when `log_file` came from a `--log` flag in the extra CLI args.
    pub log_from_cli: bool,
}

impl PreloaderPaths {
    /// A `--log` passed through `cli` wins over `log_file`, which wins over
    /// `<root>/log/zeus_output.log`.
    pub fn resolve(config: &SupervisorConfig) -> Self {
        let cli_log = config.cli.as_deref().and_then(log_path_from_cli);
        let log_from_cli = cli_log.is_some();
        let log_file = match (cli_log, &config.log_file) {
            (Some(path), _) => config.absolute(&path),
            (None, Some(path)) => config.absolute(path),
            (None, None) => config
                .root
                .join(ZeusFiles::DEFAULT_LOG_DIR)
                .join(ZeusFiles::DEFAULT_LOG_FILE),
        };

        let pid_file = match &config.pid_file {
            Some(path) => config.absolute(path),
            None => {
                let [tmp, pids] = ZeusFiles::DEFAULT_PID_DIR;
                config.root.join(tmp).join(pids).join(ZeusFiles::DEFAULT_PID_FILE)
            }
        };

        Self {
            socket: config.root.join(ZeusFiles::SOCKET_FILE),
            log_file,
            pid_file,
            boot_plan: config.root.join(ZeusFiles::BOOT_PLAN_FILE),
            log_from_cli,
        }
    }
}
