//! URN resolution against the cross-reference store.
//!
//! A URN may carry a trailing `@project` qualifier. It denotes a range when a
//! path component after the first `/` contains `-`: the rightmost such component
//! is split at its first dash, the text before it completes the start URN, and
//! the text after it (with any components that follow) replaces the same number
//! of trailing components of the start to form the end.
//!
//! ```text
//! urn:x-opensiddur:text:bible:genesis/1/1-2    start .../genesis/1/1  end .../genesis/1/2
//! urn:x-opensiddur:text:bible:genesis/1/1-2/3  start .../genesis/1/1  end .../genesis/2/3
//! ```

use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::IndexError;
use crate::models::*;

type Result<T> = std::result::Result<T, IndexError>;

/// The two ends of a ranged URN, each still carrying the project qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrnRange {
    pub start: String,
    pub end: String,
}

/// Splits a ranged URN into its endpoints; `None` when the URN is not a range.
pub fn split_range(urn: &str) -> Option<UrnRange> {
    let (body, project) = match urn.rsplit_once('@') {
        Some((body, project)) => (body, Some(project)),
        None => (urn, None),
    };

    let parts: Vec<&str> = body.split('/').collect();
    // Component 0 holds the scheme, whose own dashes never mark a range.
    let index = (1..parts.len()).rev().find(|&i| parts[i].contains('-'))?;
    let (start_value, end_value) = parts[index].split_once('-')?;

    let mut start_parts = parts[..index].to_vec();
    start_parts.push(start_value);

    let end_spec: Vec<&str> = std::iter::once(end_value)
        .chain(parts[index + 1..].iter().copied())
        .collect();
    let keep = (index + 1).saturating_sub(end_spec.len());
    let mut end_parts = parts[..keep].to_vec();
    end_parts.extend(end_spec);

    let qualify = |path: String| match project {
        Some(project) => format!("{}@{}", path, project),
        None => path,
    };
    Some(UrnRange {
        start: qualify(start_parts.join("/")),
        end: qualify(end_parts.join("/")),
    })
}

/// Anything that belongs to a project and can therefore be ranked by priority.
pub trait HasProject {
    fn project(&self) -> &str;
}

impl HasProject for ResolvedUrn {
    fn project(&self) -> &str {
        &self.project
    }
}

impl HasProject for Resolution {
    fn project(&self) -> &str {
        Resolution::project(self)
    }
}

impl HasProject for UrnMapping {
    fn project(&self) -> &str {
        &self.project
    }
}

impl HasProject for ElementReference {
    fn project(&self) -> &str {
        &self.project
    }
}

/// Candidates whose project is listed, in priority order. Unlisted projects are dropped.
pub fn prioritize_all<T: HasProject>(candidates: Vec<T>, priority: &[String]) -> Vec<T> {
    let mut ranked: Vec<(usize, T)> = candidates
        .into_iter()
        .filter_map(|c| {
            priority
                .iter()
                .position(|p| p == c.project())
                .map(|rank| (rank, c))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, c)| c).collect()
}

/// The highest-priority candidate, if any candidate's project is listed.
pub fn prioritize<T: HasProject>(candidates: Vec<T>, priority: &[String]) -> Option<T> {
    prioritize_all(candidates, priority).into_iter().next()
}

pub struct UrnResolver<'a> {
    db: &'a Database,
}

impl<'a> UrnResolver<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Exact lookup; an unknown URN yields an empty list.
    pub fn resolve(&self, urn: &str) -> Result<Vec<ResolvedUrn>> {
        let (urn, project) = match urn.rsplit_once('@') {
            Some((urn, project)) => (urn, Some(project)),
            None => (urn, None),
        };
        let resolved = self
            .db
            .get_urn_mappings(Some(urn), project)?
            .into_iter()
            .map(ResolvedUrn::from)
            .collect();
        Ok(resolved)
    }

    /// Resolves a possibly-ranged URN. Range ends are paired per (project, file);
    /// a project that defines only one end contributes nothing.
    pub fn resolve_range(&self, urn: &str) -> Result<Vec<Resolution>> {
        let Some(range) = split_range(urn) else {
            return Ok(self
                .resolve(urn)?
                .into_iter()
                .map(Resolution::Single)
                .collect());
        };

        let starts = self.resolve(&range.start)?;
        let ends = self.resolve(&range.end)?;

        let resolutions = starts
            .into_iter()
            .filter_map(|start| {
                ends.iter()
                    .find(|end| end.project == start.project && end.file_name == start.file_name)
                    .map(|end| {
                        Resolution::Range(ResolvedUrnRange {
                            start,
                            end: end.clone(),
                        })
                    })
            })
            .collect();
        Ok(resolutions)
    }

    /// Both ends of a range, each resolved independently and not yet paired.
    pub fn resolve_endpoints(&self, range: &UrnRange) -> Result<(Vec<ResolvedUrn>, Vec<ResolvedUrn>)> {
        Ok((self.resolve(&range.start)?, self.resolve(&range.end)?))
    }

    pub fn get_urns_by_project(&self, project: &str) -> Result<Vec<String>> {
        self.db.get_urns_by_project(project)
    }

    /// Location of the file that defines a resolved URN.
    pub fn path_of(resolved: &ResolvedUrn, project_directory: &Path) -> PathBuf {
        project_directory
            .join(&resolved.project)
            .join(&resolved.file_name)
    }
}
