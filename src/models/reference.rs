use serde::{Deserialize, Serialize};

/// One outbound reference: an element whose `target` names another element.
///
/// An element with several whitespace-separated targets yields one record per token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementReference {
    pub element_path: String,
    /// Clark-notation tag of the referencing element.
    pub element_tag: String,
    pub element_type: Option<String>,
    pub target_start: String,
    pub target_end: String,
    /// True when the target is a local `#id` fragment.
    pub target_is_id: bool,
    /// The referencing element's own `corresp`, if it has one.
    pub corresponding_urn: Option<String>,
    pub project: String,
    pub file_name: String,
}
