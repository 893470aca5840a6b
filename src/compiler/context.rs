use crate::error::CompileError;
use crate::xml::{Document, Node, NodeId, TEI_NS};

/// What a walker does with the element it is entering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Copy the element with its text and annotations, then descend.
    CopyAndRecurse,
    /// Copy only the tag and attributes, then descend.
    CopyElementAndRecurse,
    /// Produce nothing for this element but descend into it.
    Recurse,
    /// Produce nothing for this element or anything beneath it.
    Skip,
    /// Emit the element's text (inline extraction), then descend.
    CopyTextAndRecurse,
}

/// One frame of the processing stack: the document being walked and, for
/// bounded walks, where the walk stands relative to its range.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub project: String,
    pub file_name: String,
    pub from_start: Option<String>,
    pub to_end: Option<String>,
    pub before_start: bool,
    pub after_end: bool,
    pub inside_dca: bool,
    pub command: Command,
}

impl ProcessingContext {
    /// A frame for copying a whole document or subtree.
    pub fn whole(project: &str, file_name: &str) -> Self {
        Self {
            project: project.to_string(),
            file_name: file_name.to_string(),
            from_start: None,
            to_end: None,
            before_start: false,
            after_end: false,
            inside_dca: false,
            command: Command::CopyAndRecurse,
        }
    }

    /// A frame for a walk bounded by two markers; nothing is in range yet.
    pub fn bounded(project: &str, file_name: &str, from_start: &str, to_end: &str) -> Self {
        Self {
            from_start: Some(from_start.to_string()),
            to_end: Some(to_end.to_string()),
            before_start: true,
            command: Command::Recurse,
            ..Self::whole(project, file_name)
        }
    }

    pub fn is_home(&self, project: &str, file_name: &str) -> bool {
        self.project == project && self.file_name == file_name
    }

    pub fn in_range(&self) -> bool {
        !self.before_start && !self.after_end
    }
}

/// The located markers of a bounded walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub start: NodeId,
    pub end: NodeId,
    /// Deepest common ancestor: the outermost element the output may contain.
    pub dca: NodeId,
}

impl Bounds {
    /// Finds both markers and their deepest common ancestor.
    ///
    /// A missing marker is `NotFound`; an end marker that precedes the start
    /// (without enclosing it) is `InvalidRange`.
    pub fn locate(doc: &Document, from_start: &str, to_end: &str) -> Result<Self, CompileError> {
        let start = find_marker(doc, from_start).ok_or_else(|| {
            CompileError::NotFound(format!("start marker {} in target document", from_start))
        })?;
        let end = find_marker(doc, to_end).ok_or_else(|| {
            CompileError::NotFound(format!("end marker {} in target document", to_end))
        })?;

        if end < start && !doc.contains(end, start) {
            return Err(CompileError::InvalidRange(format!(
                "{} comes before {}",
                to_end, from_start
            )));
        }

        let dca = if start == end || doc.node(start).parent == doc.node(end).parent {
            start
        } else {
            std::iter::once(start)
                .chain(doc.ancestors(start))
                .find(|&a| doc.contains(a, end))
                .ok_or_else(|| {
                    CompileError::InvalidRange(format!(
                        "{} and {} share no ancestor",
                        from_start, to_end
                    ))
                })?
        };

        Ok(Self { start, end, dca })
    }
}

/// The element a target names: `#id` matches `xml:id`, anything else matches
/// `corresp`. The first match in document order wins.
pub fn find_marker(doc: &Document, target: &str) -> Option<NodeId> {
    match target.strip_prefix('#') {
        Some(id) => doc.find(|node| node.xml_id() == Some(id)),
        None => doc.find(|node| node.corresp() == Some(target)),
    }
}

pub fn is_milestone(node: &Node) -> bool {
    node.name.is(TEI_NS, "milestone")
}

/// Which commands a bounded walk hands out for elements in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Copy structure: `CopyAndRecurse`, with shells for the start's ancestors.
    External,
    /// Copy text only: `CopyTextAndRecurse`.
    Inline,
}

/// The range state machine shared by the external and inline walkers.
///
/// The range opens on entering the start marker and closes on leaving the end
/// marker. When the end marker is a `tei:milestone`, the range instead runs on
/// until the next milestone that is not part of the end URN's hierarchy, or
/// until the milestone's parent closes.
#[derive(Debug)]
pub struct RangeWalk {
    pub bounds: Bounds,
    extraction: Extraction,
    end_urn: Option<String>,
    milestone_parent: Option<NodeId>,
    milestone_open: bool,
}

impl RangeWalk {
    pub fn new(doc: &Document, bounds: Bounds, extraction: Extraction) -> Self {
        Self {
            bounds,
            extraction,
            end_urn: doc.node(bounds.end).corresp().map(str::to_string),
            milestone_parent: None,
            milestone_open: false,
        }
    }

    pub fn enter(&mut self, ctx: &mut ProcessingContext, doc: &Document, id: NodeId) -> Command {
        let node = doc.node(id);
        let in_range = match self.extraction {
            Extraction::External => Command::CopyAndRecurse,
            Extraction::Inline => Command::CopyTextAndRecurse,
        };

        let command = if ctx.after_end {
            Command::Skip
        } else if self.milestone_open && is_milestone(node) && !self.continues_end(node) {
            ctx.after_end = true;
            Command::Skip
        } else if id == self.bounds.start {
            ctx.before_start = false;
            in_range
        } else if ctx.before_start {
            match self.extraction {
                Extraction::External if id == self.bounds.dca => {
                    ctx.inside_dca = true;
                    Command::CopyElementAndRecurse
                }
                Extraction::External if ctx.inside_dca && doc.contains(id, self.bounds.start) => {
                    Command::CopyElementAndRecurse
                }
                _ => Command::Recurse,
            }
        } else {
            in_range
        };

        ctx.command = command;
        command
    }

    pub fn leave(&mut self, ctx: &mut ProcessingContext, doc: &Document, id: NodeId) {
        if id == self.bounds.dca {
            ctx.inside_dca = false;
        }

        if self.milestone_open && Some(id) == self.milestone_parent {
            self.milestone_open = false;
            ctx.after_end = true;
            return;
        }

        if ctx.in_range() && !self.milestone_open && id == self.bounds.end {
            let node = doc.node(id);
            match node.parent.filter(|_| is_milestone(node)) {
                Some(parent) => {
                    self.milestone_open = true;
                    self.milestone_parent = Some(parent);
                }
                None => ctx.after_end = true,
            }
        }
    }

    /// A later milestone stays in range while it is a descendant of the end URN.
    fn continues_end(&self, node: &Node) -> bool {
        match (&self.end_urn, node.corresp()) {
            (Some(end), Some(corresp)) => corresp
                .strip_prefix(end.as_str())
                .is_some_and(|rest| rest.starts_with('/')),
            _ => false,
        }
    }
}
