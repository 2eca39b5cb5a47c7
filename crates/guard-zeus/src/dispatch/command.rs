//! Command-line construction for `zeus start` and `zeus test`.

use std::fmt;
use std::path::{Path, PathBuf};

/// A shell command assembled from space-joined parts.
///
/// Empty parts are dropped. Nothing is escaped: paths come from the watcher,
/// not from untrusted input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    parts: Vec<String>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part, ignoring it when blank.
    pub fn part(mut self, part: impl Into<String>) -> Self {
        let part = part.into();
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Append a part only when `condition` holds.
    pub fn part_if(self, condition: bool, part: impl Into<String>) -> Self {
        if condition {
            self.part(part)
        } else {
            self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(" "))
    }
}

/// Builds the two Zeus invocations, with or without `bundle exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeusCommand {
    bundler: bool,
}

impl ZeusCommand {
    pub const BUNDLE_EXEC: &'static str = "bundle exec";

    pub fn new(bundler: bool) -> Self {
        Self { bundler }
    }

    fn base(&self, subcommand: &str) -> CommandLine {
        CommandLine::new()
            .part_if(self.bundler, Self::BUNDLE_EXEC)
            .part(format!("zeus {}", subcommand))
    }

    /// `[bundle exec] zeus start [--log <log_file>] [cli]`.
    ///
    /// `log_file` is `None` when `cli` already carries its own `--log`.
    pub fn start(&self, log_file: Option<&Path>, cli: Option<&str>) -> CommandLine {
        let mut cmd = self.base("start");
        if let Some(log) = log_file {
            cmd = cmd.part(format!("--log {}", log.display()));
        }
        cmd.part(cli.unwrap_or_default())
    }

    /// `[bundle exec] zeus test <paths...>`.
    pub fn test<S: AsRef<str>>(&self, paths: &[S]) -> CommandLine {
        let joined = paths
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        self.base("test").part(joined)
    }
}

/// Find the log path in extra CLI args (`--log <path>` or `--log=<path>`).
/// The last occurrence wins.
pub fn log_path_from_cli(cli: &str) -> Option<PathBuf> {
    let mut found = None;
    let mut tokens = cli.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "--log" {
            if let Some(path) = tokens.next() {
                found = Some(PathBuf::from(path));
            }
        } else if let Some(path) = token.strip_prefix("--log=") {
            if !path.is_empty() {
                found = Some(PathBuf::from(path));
            }
        }
    }
    found
}
