use crate::xml::{Node, JLPTEI_NS, TEI_NS};

/// What the compiler does with an element, decided once from its tag and `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    /// `j:transclude`: replaced by the content it points at.
    Transclude,
    /// `tei:note type="instruction"`: may be swapped for a higher-priority instruction.
    InstructionNote,
    /// Any other `tei:note`.
    CommentaryNote,
    Plain,
}

impl ElementRole {
    pub fn of(node: &Node) -> Self {
        if node.name.is(JLPTEI_NS, "transclude") {
            Self::Transclude
        } else if node.name.is(TEI_NS, "note") {
            match node.attr("type") {
                Some("instruction") => Self::InstructionNote,
                _ => Self::CommentaryNote,
            }
        } else {
            Self::Plain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransclusionType {
    External,
    Inline,
}

impl TransclusionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Inline => "inline",
        }
    }

    /// Reads a directive's `type`; anything but `inline` is external.
    pub fn of(node: &Node) -> Self {
        match node.attr("type") {
            Some("inline") => Self::Inline,
            _ => Self::External,
        }
    }
}
