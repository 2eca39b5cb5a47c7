//! Boot plan parsing.
//!
//! `zeus.json` describes the preloader's stages as nested JSON objects under
//! `plan`. Every key whose value is itself an object is a process Zeus boots
//! and must later report ready; keys mapping to arrays are commands.

use crate::error::{Result, ZeusError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// The plan used when the project has no `zeus.json`.
const BUNDLED_PLAN: &str = include_str!("default_plan.json");

#[derive(Debug, Deserialize)]
struct PlanFile {
    plan: Map<String, Value>,
}

/// Component names that must all report ready.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootPlan {
    components: BTreeSet<String>,
}

impl BootPlan {
    /// Load `path`, or the bundled example plan when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No {:?}, using the bundled example boot plan", path);
            return Self::from_json_str(BUNDLED_PLAN, Path::new("<bundled zeus.json>"));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ZeusError::io_with_path(e, path))?;
        Self::from_json_str(&raw, path)
    }

    /// Parse plan JSON; `origin` is only used in error messages.
    pub fn from_json_str(raw: &str, origin: &Path) -> Result<Self> {
        let file: PlanFile = serde_json::from_str(raw).map_err(|e| ZeusError::BootPlan {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut components = BTreeSet::new();
        collect_components(&file.plan, &mut components);
        debug!("Boot plan {:?} expects {:?}", origin, components);
        Ok(Self { components })
    }

    pub fn from_components<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn components(&self) -> &BTreeSet<String> {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

fn collect_components(stage: &Map<String, Value>, out: &mut BTreeSet<String>) {
    for (name, value) in stage {
        if let Value::Object(children) = value {
            out.insert(name.clone());
            collect_components(children, out);
        }
    }
}
