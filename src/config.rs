use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_MAX_DEPTH: usize = 32;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Project orderings used to choose between competing sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    /// Which project's copy of a transcluded URN wins.
    #[serde(default)]
    pub transclusion: Vec<String>,
    /// Which project's instruction note replaces a placeholder instruction.
    #[serde(default)]
    pub instructions: Vec<String>,
}

/// Compilation settings, read from a YAML file such as:
///
/// ```yaml
/// priority:
///   transclusion: [wlc, jps1917]
///   instructions: [rubrics]
/// annotations: [commentary]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub priority: Priority,
    /// Projects whose commentary notes are inserted, in insertion order.
    #[serde(default)]
    pub annotations: Vec<String>,
    /// Maximum transclusion nesting before compilation fails as cyclic.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Settings {
    /// Settings that only trust the project being compiled.
    pub fn for_project(project: &str) -> Self {
        Self {
            priority: Priority {
                transclusion: vec![project.to_string()],
                instructions: vec![project.to_string()],
            },
            annotations: vec![project.to_string()],
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Every listed project must exist under the project root.
    pub fn validate(&self, project_directory: &Path) -> Result<(), ConfigError> {
        let listed = self
            .priority
            .transclusion
            .iter()
            .chain(&self.priority.instructions)
            .chain(&self.annotations);
        for project in listed {
            let directory: PathBuf = project_directory.join(project);
            if !directory.exists() {
                return Err(ConfigError::UnknownProject {
                    project: project.clone(),
                    directory,
                });
            }
        }
        Ok(())
    }
}
