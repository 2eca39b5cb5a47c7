//! Detection of the project's dependency manager and test framework.
//!
//! Each answer is computed once per runner; the project layout is assumed
//! not to change while a watcher is running.

use crate::config::{Detect, SupervisorConfig, ZeusFiles};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Target that runs the entire RSpec suite.
pub const RSPEC_SUITE: &str = "spec";

/// Memoized view of the project environment.
#[derive(Debug)]
pub struct Environment {
    root: PathBuf,
    bundler_override: Detect,
    rspec_override: Detect,
    test_unit_override: Detect,
    bundler: OnceLock<bool>,
    rspec: OnceLock<bool>,
    test_unit: OnceLock<bool>,
}

impl Environment {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            root: config.root.clone(),
            bundler_override: config.bundler,
            rspec_override: config.rspec,
            test_unit_override: config.test_unit,
            bundler: OnceLock::new(),
            rspec: OnceLock::new(),
            test_unit: OnceLock::new(),
        }
    }

    /// `Gemfile` present, so commands go through `bundle exec`.
    pub fn bundler(&self) -> bool {
        *self.bundler.get_or_init(|| {
            resolve(self.bundler_override, &self.root.join(ZeusFiles::GEMFILE))
        })
    }

    /// `spec/` present.
    pub fn rspec(&self) -> bool {
        *self.rspec.get_or_init(|| {
            resolve(self.rspec_override, &self.root.join(ZeusFiles::RSPEC_DIR))
        })
    }

    /// `test/test_helper.rb` present.
    pub fn test_unit(&self) -> bool {
        *self.test_unit.get_or_init(|| {
            let [dir, helper] = ZeusFiles::TEST_UNIT_HELPER;
            resolve(self.test_unit_override, &self.root.join(dir).join(helper))
        })
    }

    /// What a whole-suite run should pass to `zeus test`.
    ///
    /// RSpec wins when both frameworks are present. `None` means neither
    /// was detected.
    pub fn suite_targets(&self) -> Option<Vec<String>> {
        if self.rspec() {
            Some(vec![RSPEC_SUITE.to_string()])
        } else if self.test_unit() {
            Some(discover_test_unit_files(&self.root))
        } else {
            None
        }
    }
}

fn resolve(detect: Detect, marker: &Path) -> bool {
    match detect {
        Detect::On => true,
        Detect::Off => false,
        Detect::Auto => {
            let found = marker.exists();
            debug!("Detected {:?}: {}", marker, found);
            found
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Test::Unit files under `test/`: every `*_test.rb`, then every
/// `test_*.rb`. A file matching both patterns appears twice.
pub fn discover_test_unit_files(root: &Path) -> Vec<String> {
    let test_dir = root.join("test");
    let files: Vec<PathBuf> = WalkDir::new(&test_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let name_of = |path: &PathBuf| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let relative = |path: &PathBuf| {
        path.strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    };

    let suffixed = files
        .iter()
        .filter(|p| name_of(p).ends_with("_test.rb"))
        .map(relative);
    let prefixed = files
        .iter()
        .filter(|p| {
            let name = name_of(p);
            name.starts_with("test_") && name.ends_with(".rb")
        })
        .map(relative);

    suffixed.chain(prefixed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_bundler_auto_detection() {
        let dir = TempDir::new().unwrap();
        let config = SupervisorConfig::new(dir.path());
        assert!(!Environment::new(&config).bundler());

        touch(dir.path(), "Gemfile");
        assert!(Environment::new(&config).bundler());
    }

    #[test]
    fn test_overrides_skip_filesystem() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Gemfile");
        touch(dir.path(), "test/test_helper.rb");

        let config = SupervisorConfig::new(dir.path())
            .with_bundler(Detect::Off)
            .with_rspec(Detect::On)
            .with_test_unit(Detect::Off);
        let env = Environment::new(&config);

        assert!(!env.bundler());
        assert!(env.rspec());
        assert!(!env.test_unit());
    }

    #[test]
    fn test_detection_is_memoized() {
        let dir = TempDir::new().unwrap();
        let env = Environment::new(&SupervisorConfig::new(dir.path()));
        assert!(!env.rspec());

        fs::create_dir(dir.path().join("spec")).unwrap();
        assert!(!env.rspec());
    }

    #[test]
    fn test_suite_targets_prefers_rspec() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("spec")).unwrap();
        touch(dir.path(), "test/test_helper.rb");
        touch(dir.path(), "test/unit/foo_test.rb");

        let env = Environment::new(&SupervisorConfig::new(dir.path()));
        assert_eq!(env.suite_targets(), Some(vec!["spec".to_string()]));
    }

    #[test]
    fn test_suite_targets_none_without_framework() {
        let dir = TempDir::new().unwrap();
        let env = Environment::new(&SupervisorConfig::new(dir.path()));
        assert_eq!(env.suite_targets(), None);
    }

    #[test]
    fn test_discover_suffix_then_prefix() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "test/test_helper.rb");
        touch(dir.path(), "test/unit/foo_test.rb");
        touch(dir.path(), "test/functional/bar_test.rb");
        touch(dir.path(), "test/unit/test_baz.rb");
        touch(dir.path(), "test/unit/helper.rb");
        touch(dir.path(), "test/.hidden/skip_test.rb");

        let files = discover_test_unit_files(dir.path());
        assert_eq!(
            files,
            vec![
                "test/functional/bar_test.rb",
                "test/unit/foo_test.rb",
                "test/test_helper.rb",
                "test/unit/test_baz.rb",
            ]
        );
    }

    #[test]
    fn test_discover_without_test_dir() {
        let dir = TempDir::new().unwrap();
        assert!(discover_test_unit_files(dir.path()).is_empty());
    }
}
