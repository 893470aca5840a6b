use serde::{Deserialize, Serialize};

/// A record that a project's file defines an element carrying `corresp="urn"`.
///
/// At most one file per project may claim a given URN; re-indexing a later
/// claimant replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrnMapping {
    pub urn: String,
    pub project: String,
    pub file_name: String,
    /// Path of the defining element within its file.
    pub element_path: Option<String>,
    /// Clark-notation tag of the defining element.
    pub element_tag: Option<String>,
    /// The defining element's `type` attribute, if any.
    pub element_type: Option<String>,
}

/// A URN located in one project's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrn {
    pub project: String,
    pub file_name: String,
    pub urn: String,
    pub element_path: Option<String>,
}

impl From<UrnMapping> for ResolvedUrn {
    fn from(mapping: UrnMapping) -> Self {
        Self {
            project: mapping.project,
            file_name: mapping.file_name,
            urn: mapping.urn,
            element_path: mapping.element_path,
        }
    }
}

/// Both ends of a ranged URN, always in the same (project, file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrnRange {
    pub start: ResolvedUrn,
    pub end: ResolvedUrn,
}

/// Result of resolving a possibly-ranged URN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Single(ResolvedUrn),
    Range(ResolvedUrnRange),
}

impl Resolution {
    pub fn start(&self) -> &ResolvedUrn {
        match self {
            Self::Single(urn) => urn,
            Self::Range(range) => &range.start,
        }
    }

    /// The end of a range; a single URN is its own end.
    pub fn end(&self) -> &ResolvedUrn {
        match self {
            Self::Single(urn) => urn,
            Self::Range(range) => &range.end,
        }
    }

    pub fn project(&self) -> &str {
        &self.start().project
    }

    pub fn file_name(&self) -> &str {
        &self.start().file_name
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range(_))
    }
}
