//! External extraction: the structure between two markers.
//!
//! Output never reaches above the markers' deepest common ancestor. Between the
//! common ancestor and the start marker only the start's own ancestors are
//! reproduced, as attribute-bearing shells; content that precedes the start is
//! dropped.

use super::annotate::Annotation;
use super::context::{Bounds, Command, Extraction, ProcessingContext, RangeWalk};
use super::document::insert_notes;
use super::role::ElementRole;
use super::{Result, Session};
use crate::xml::{Document, Element, NodeId};

impl Session<'_> {
    pub(crate) fn process_external(
        &mut self,
        project: &str,
        file_name: &str,
        from_start: &str,
        to_end: &str,
    ) -> Result<Vec<Element>> {
        let doc = self.compiler.cache.get(project, file_name)?;
        let bounds = Bounds::locate(&doc, from_start, to_end)?;
        let mut walk = RangeWalk::new(&doc, bounds, Extraction::External);

        self.within(
            ProcessingContext::bounded(project, file_name, from_start, to_end),
            |s, depth| s.external_element(depth, &doc, &mut walk, doc.root()),
        )
    }

    /// Output for one element: itself (possibly a shell), or for elements that
    /// are only descended through, whatever their children produced.
    fn external_element(
        &mut self,
        depth: usize,
        doc: &Document,
        walk: &mut RangeWalk,
        id: NodeId,
    ) -> Result<Vec<Element>> {
        let command = walk.enter(&mut self.stack[depth], doc, id);
        if command == Command::Skip {
            return Ok(Vec::new());
        }
        let node = doc.node(id);

        let mut notes = None;
        if command == Command::CopyAndRecurse {
            if ElementRole::of(node) == ElementRole::Transclude {
                let wrapper = self.transclude(depth, doc, id, false)?;
                walk.leave(&mut self.stack[depth], doc, id);
                return Ok(vec![wrapper]);
            }
            match self.annotate(depth, doc, id, None)? {
                Annotation::Replace(replacement) => {
                    walk.leave(&mut self.stack[depth], doc, id);
                    return Ok(vec![replacement]);
                }
                Annotation::Insert(inserted) => notes = Some(inserted),
                Annotation::Keep | Annotation::None => {}
            }
        }

        let mut shell = match command {
            Command::CopyAndRecurse => {
                let mut element = Element::shell(node);
                element.text = node.text.clone();
                Some(element)
            }
            Command::CopyElementAndRecurse => Some(Element::shell(node)),
            _ => None,
        };
        let mut passed = Vec::new();

        for &child in &node.children {
            let produced = self.external_element(depth, doc, walk, child)?;
            let tail = &doc.node(child).tail;
            let keep_tail = self.stack[depth].in_range() && !tail.is_empty();
            match shell.as_mut() {
                Some(element) => {
                    element.children.extend(produced);
                    if keep_tail {
                        element.push_text(tail);
                    }
                }
                None => {
                    passed.extend(produced);
                    // A tail with nothing before it at this level has no home.
                    if let Some(last) = passed.last_mut().filter(|_| keep_tail) {
                        last.tail.push_str(tail);
                    }
                }
            }
        }

        walk.leave(&mut self.stack[depth], doc, id);

        Ok(match shell {
            Some(mut element) => {
                if let Some(notes) = notes {
                    insert_notes(&mut element, notes);
                }
                vec![element]
            }
            None => passed,
        })
    }
}
