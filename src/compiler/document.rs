//! The whole-document walker and transclusion directives.

use super::annotate::Annotation;
use super::context::{find_marker, ProcessingContext};
use super::role::{ElementRole, TransclusionType};
use super::{stamp_language, stamp_provenance, Result, Session};
use crate::error::CompileError;
use crate::models::Resolution;
use crate::urn::{prioritize, prioritize_all, split_range, UrnResolver};
use crate::xml::{Document, Element, NodeId, QName};

/// Where a transclusion's content lives and the markers that bound it.
#[derive(Debug)]
struct Located {
    project: String,
    file_name: String,
    start: String,
    end: String,
}

impl Session<'_> {
    /// Copies a document, or the subtree rooted at `root`, applying
    /// transclusions and annotations throughout. A subtree root has already
    /// been annotated by its caller and is not annotated again.
    ///
    /// The result is stamped with its provenance when it comes from a different
    /// file than the frame that asked for it.
    pub(crate) fn process_document(
        &mut self,
        project: &str,
        file_name: &str,
        root: Option<NodeId>,
    ) -> Result<Element> {
        let doc = self.compiler.cache.get(project, file_name)?;
        let walk_root = root;
        let root = root.unwrap_or(doc.root());
        let foreign = self.home() != Some((project, file_name));

        let mut element = self.within(ProcessingContext::whole(project, file_name), |s, depth| {
            s.copy_element(depth, &doc, root, walk_root)
        })?;
        if foreign {
            stamp_provenance(&mut element, project, file_name);
        }
        Ok(element)
    }

    fn copy_element(
        &mut self,
        depth: usize,
        doc: &Document,
        id: NodeId,
        walk_root: Option<NodeId>,
    ) -> Result<Element> {
        if ElementRole::of(doc.node(id)) == ElementRole::Transclude {
            return self.transclude(depth, doc, id, false);
        }

        match self.annotate(depth, doc, id, walk_root)? {
            Annotation::Replace(replacement) => Ok(replacement),
            Annotation::Insert(notes) => {
                let mut element = self.copy_children(depth, doc, id, walk_root)?;
                insert_notes(&mut element, notes);
                Ok(element)
            }
            Annotation::Keep | Annotation::None => self.copy_children(depth, doc, id, walk_root),
        }
    }

    fn copy_children(
        &mut self,
        depth: usize,
        doc: &Document,
        id: NodeId,
        walk_root: Option<NodeId>,
    ) -> Result<Element> {
        let node = doc.node(id);
        let mut element = Element::shell(node);
        element.text = node.text.clone();
        for &child in &node.children {
            let mut copy = self.copy_element(depth, doc, child, walk_root)?;
            copy.tail = doc.node(child).tail.clone();
            element.push(copy);
        }
        Ok(element)
    }

    /// Replaces a `j:transclude` directive with a `p:transclude` wrapper
    /// holding the target content. `force_inline` applies inside inline
    /// extraction, where nested structure cannot be copied.
    pub(crate) fn transclude(
        &mut self,
        depth: usize,
        doc: &Document,
        id: NodeId,
        force_inline: bool,
    ) -> Result<Element> {
        let node = doc.node(id);
        let target = node.attr("target").ok_or_else(|| {
            CompileError::NotFound(format!("target of transclusion at {}", node.path))
        })?;
        let target_end = node.attr("targetEnd");
        let kind = if force_inline {
            TransclusionType::Inline
        } else {
            TransclusionType::of(node)
        };

        let located = self.locate(depth, target, target_end)?;
        tracing::debug!(
            "Transcluding {} from {}/{} ({})",
            target,
            located.project,
            located.file_name,
            kind.as_str()
        );

        let mut wrapper = Element::new(QName::processing("transclude"));
        wrapper.set_attribute(QName::local("target"), target);
        if let Some(target_end) = target_end {
            wrapper.set_attribute(QName::local("targetEnd"), target_end);
        }
        wrapper.set_attribute(QName::local("type"), kind.as_str());

        match kind {
            TransclusionType::External => {
                wrapper.children = self.process_external(
                    &located.project,
                    &located.file_name,
                    &located.start,
                    &located.end,
                )?;
            }
            TransclusionType::Inline => {
                let inline = self.process_inline(
                    &located.project,
                    &located.file_name,
                    &located.start,
                    &located.end,
                )?;
                wrapper.text = inline.text;
                wrapper.children = inline.children;
            }
        }

        if !self.stack[depth].is_home(&located.project, &located.file_name) {
            stamp_provenance(&mut wrapper, &located.project, &located.file_name);
        }
        let source = self.compiler.cache.get(&located.project, &located.file_name)?;
        let target_lang = find_marker(&source, &located.start).and_then(|m| source.lang(m));
        stamp_language(&mut wrapper, target_lang, doc.lang(id));

        Ok(wrapper)
    }

    /// Resolves a directive's target to a file and a pair of markers.
    ///
    /// `#id` targets stay in the current document. URN targets go through the
    /// index and the transclusion priority list; an explicit `targetEnd` must
    /// land in the same file as the start.
    fn locate(&self, depth: usize, target: &str, target_end: Option<&str>) -> Result<Located> {
        let frame = &self.stack[depth];
        if target.starts_with('#') {
            let end = target_end.unwrap_or(target);
            if !end.starts_with('#') {
                return Err(CompileError::InvalidRange(format!(
                    "local target {} cannot end at {}",
                    target, end
                )));
            }
            return Ok(Located {
                project: frame.project.clone(),
                file_name: frame.file_name.clone(),
                start: target.to_string(),
                end: end.to_string(),
            });
        }

        let resolver = UrnResolver::new(&self.compiler.db);
        let priority = &self.compiler.settings.priority.transclusion;

        let candidates = resolver.resolve_range(target)?;
        if candidates.is_empty() {
            if let Some(range) = split_range(target) {
                let (starts, ends) = resolver.resolve_endpoints(&range)?;
                let starts = prioritize_all(starts, priority);
                let ends = prioritize_all(ends, priority);
                let split = starts.iter().any(|s| {
                    ends.iter()
                        .any(|e| e.project == s.project && e.file_name != s.file_name)
                });
                if split {
                    return Err(CompileError::InvalidRange(format!(
                        "{} starts and ends in different files",
                        target
                    )));
                }
            }
            return Err(CompileError::NotFound(format!("transclusion target {}", target)));
        }

        let best = prioritize(candidates, priority).ok_or_else(|| {
            CompileError::NotFound(format!(
                "transclusion target {} in any prioritized project",
                target
            ))
        })?;

        match best {
            Resolution::Range(range) => {
                if target_end.is_some() {
                    return Err(CompileError::InvalidRange(format!(
                        "ranged target {} cannot also have a targetEnd",
                        target
                    )));
                }
                Ok(Located {
                    project: range.start.project,
                    file_name: range.start.file_name,
                    start: range.start.urn,
                    end: range.end.urn,
                })
            }
            Resolution::Single(start) => {
                let end = match target_end {
                    None => start.urn.clone(),
                    Some(target_end) => {
                        let ends = resolver.resolve_range(target_end)?;
                        let end = prioritize(ends, std::slice::from_ref(&start.project))
                            .ok_or_else(|| {
                                CompileError::NotFound(format!(
                                    "targetEnd {} in project {}",
                                    target_end, start.project
                                ))
                            })?;
                        if end.file_name() != start.file_name {
                            return Err(CompileError::InvalidRange(format!(
                                "{} and {} are in different files",
                                target, target_end
                            )));
                        }
                        end.end().urn.clone()
                    }
                };
                Ok(Located {
                    project: start.project,
                    file_name: start.file_name,
                    start: start.urn,
                    end,
                })
            }
        }
    }
}

/// Puts notes ahead of an element's content. The element's own text moves
/// into the tail of the last note so reading order is preserved.
pub(crate) fn insert_notes(element: &mut Element, mut notes: Vec<Element>) {
    if let Some(last) = notes.last_mut() {
        last.tail = std::mem::take(&mut element.text);
    }
    element.children.splice(0..0, notes);
}
