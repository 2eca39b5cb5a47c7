//! Scraping component states out of the Zeus log.

use crate::error::{Result, ZeusError};
use std::collections::BTreeSet;
use std::path::Path;

/// Marker on lines announcing a process that has not booted yet.
pub const UNBOOTED_MARKER: &str = "unbooted";
/// Marker on lines announcing a process reached the ready state.
pub const READY_MARKER: &str = "SReady";

/// Component names found in one pass over the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogScan {
    pub ready: BTreeSet<String>,
    pub unbooted: BTreeSet<String>,
}

impl LogScan {
    pub fn parse(contents: &str) -> Self {
        let mut scan = LogScan::default();
        for line in contents.lines() {
            if line.contains(READY_MARKER) {
                scan.ready.extend(component_name(line));
            }
            if line.contains(UNBOOTED_MARKER) {
                scan.unbooted.extend(component_name(line));
            }
        }
        scan
    }
}

/// Fourth whitespace-separated field, up to the first `/`.
fn component_name(line: &str) -> Option<String> {
    let field = line.split_whitespace().nth(3)?;
    let name = field.split('/').next().unwrap_or(field);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Scan the log at `path`. A log that does not exist yet has no matches.
pub fn scan_log(path: &Path) -> Result<LogScan> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(LogScan::parse(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LogScan::default()),
        Err(e) => Err(ZeusError::io_with_path(e, path)),
    }
}
