use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a file sync did.
///
/// - `Added`: the file was not in the index and was scanned
/// - `Updated`: the file changed on disk and was rescanned
/// - `Removed`: the file is gone from disk and its rows were deleted
/// - `Skipped`: the file is unchanged since it was last indexed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Added,
    Updated,
    Removed,
    Skipped,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSync {
    pub action: SyncAction,
    /// Rows written (added/updated) or deleted (removed); zero when skipped.
    pub references: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectAction {
    Synced,
    Removed,
}

/// Per-project totals. `added`, `updated` and `removed` count rows; `skipped` counts files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSync {
    pub action: ProjectAction,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
}

impl ProjectSync {
    pub fn synced() -> Self {
        Self {
            action: ProjectAction::Synced,
            added: 0,
            updated: 0,
            removed: 0,
            skipped: 0,
        }
    }

    pub fn record(&mut self, file: &FileSync) {
        match file.action {
            SyncAction::Added => self.added += file.references,
            SyncAction::Updated => self.updated += file.references,
            SyncAction::Removed => self.removed += file.references,
            SyncAction::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectsSync {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub orphaned_projects_removed: usize,
    pub projects: BTreeMap<String, ProjectSync>,
}

impl ProjectsSync {
    pub fn record(&mut self, project: &str, result: ProjectSync) {
        self.added += result.added;
        self.updated += result.updated;
        self.removed += result.removed;
        self.skipped += result.skipped;
        self.projects.insert(project.to_string(), result);
    }
}

/// Row counts for one indexed project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStats {
    pub project: String,
    pub files: usize,
    pub urns: usize,
    pub references: usize,
}
