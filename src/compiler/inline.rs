//! Inline extraction: the text between two markers, without their structure.
//!
//! Only a few elements survive: nested transclusions (themselves inline),
//! notes, and `p:transcludeInline` containers that mark a change of language.
//! Each tail in range is joined to the text before it with a single space.

use super::annotate::Annotation;
use super::context::{Bounds, Command, Extraction, ProcessingContext, RangeWalk};
use super::document::insert_notes;
use super::role::ElementRole;
use super::{Result, Session};
use crate::xml::{Document, Element, NodeId, QName};

impl Session<'_> {
    /// Returns a `p:transcludeInline` holding the extracted text, carrying the
    /// language in scope at the start marker.
    pub(crate) fn process_inline(
        &mut self,
        project: &str,
        file_name: &str,
        from_start: &str,
        to_end: &str,
    ) -> Result<Element> {
        let doc = self.compiler.cache.get(project, file_name)?;
        let bounds = Bounds::locate(&doc, from_start, to_end)?;
        let mut walk = RangeWalk::new(&doc, bounds, Extraction::Inline);

        let lang = doc.lang(bounds.start);
        let mut buffer = Element::new(QName::processing("transcludeInline"));
        if let Some(lang) = lang {
            buffer.set_attribute(QName::xml("lang"), lang);
        }

        self.within(
            ProcessingContext::bounded(project, file_name, from_start, to_end),
            |s, depth| s.inline_element(depth, &doc, &mut walk, doc.root(), &mut buffer, lang),
        )?;
        Ok(buffer)
    }

    fn inline_element(
        &mut self,
        depth: usize,
        doc: &Document,
        walk: &mut RangeWalk,
        id: NodeId,
        buffer: &mut Element,
        lang: Option<&str>,
    ) -> Result<()> {
        let command = walk.enter(&mut self.stack[depth], doc, id);
        if command == Command::Skip {
            return Ok(());
        }
        let node = doc.node(id);

        if command == Command::CopyTextAndRecurse {
            match ElementRole::of(node) {
                ElementRole::Transclude => {
                    let wrapper = self.transclude(depth, doc, id, true)?;
                    buffer.push(wrapper);
                    walk.leave(&mut self.stack[depth], doc, id);
                    return Ok(());
                }
                ElementRole::InstructionNote => {
                    let note = match self.annotate(depth, doc, id, None)? {
                        Annotation::Replace(replacement) => replacement,
                        annotation => {
                            let frame = &self.stack[depth];
                            let (project, file_name) =
                                (frame.project.clone(), frame.file_name.clone());
                            let mut note = self.process_document(&project, &file_name, Some(id))?;
                            if let Annotation::Insert(notes) = annotation {
                                insert_notes(&mut note, notes);
                            }
                            note
                        }
                    };
                    buffer.push(note);
                    walk.leave(&mut self.stack[depth], doc, id);
                    return Ok(());
                }
                _ => {}
            }

            let own = node.attribute(&QName::xml("lang"));
            if let Some(own) = own.filter(|&own| Some(own) != lang) {
                let mut nested = Element::new(QName::processing("transcludeInline"));
                nested.set_attribute(QName::xml("lang"), own);
                self.inline_content(depth, doc, walk, id, command, &mut nested, Some(own))?;
                buffer.push(nested);
                walk.leave(&mut self.stack[depth], doc, id);
                return Ok(());
            }
        }

        self.inline_content(depth, doc, walk, id, command, buffer, lang)?;
        walk.leave(&mut self.stack[depth], doc, id);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn inline_content(
        &mut self,
        depth: usize,
        doc: &Document,
        walk: &mut RangeWalk,
        id: NodeId,
        command: Command,
        buffer: &mut Element,
        lang: Option<&str>,
    ) -> Result<()> {
        let node = doc.node(id);
        if command == Command::CopyTextAndRecurse {
            // Inserted notes come first, so the element's text follows them.
            if let Annotation::Insert(notes) = self.annotate(depth, doc, id, None)? {
                for note in notes {
                    buffer.push(note);
                }
            }
            buffer.push_text(&node.text);
        }

        for &child in &node.children {
            self.inline_element(depth, doc, walk, child, buffer, lang)?;
            let tail = &doc.node(child).tail;
            if self.stack[depth].in_range() && !tail.is_empty() {
                buffer.push_text(" ");
                buffer.push_text(tail);
            }
        }
        Ok(())
    }
}
