//! Notes that attach to content from elsewhere in the corpus.

use super::role::ElementRole;
use super::{stamp_language, Result, Session};
use crate::error::CompileError;
use crate::urn::{prioritize, prioritize_all};
use crate::xml::{Document, Element, NodeId, QName};

/// The outcome of annotating one element.
#[derive(Debug)]
pub(crate) enum Annotation {
    /// Not annotatable, or nothing applies.
    None,
    /// An instruction note that is already the preferred one.
    Keep,
    /// An instruction note superseded by the preferred project's note.
    Replace(Element),
    /// Commentary notes that target this element, in priority order.
    Insert(Vec<Element>),
}

impl Session<'_> {
    /// Decides how notes apply to `id`. `walk_root` is the element a note
    /// compilation started from and is never annotated again.
    pub(crate) fn annotate(
        &mut self,
        depth: usize,
        doc: &Document,
        id: NodeId,
        walk_root: Option<NodeId>,
    ) -> Result<Annotation> {
        if walk_root == Some(id) {
            return Ok(Annotation::None);
        }

        let node = doc.node(id);
        let role = ElementRole::of(node);
        let corresp = node.corresp();
        let xml_id = node.xml_id();

        if role == ElementRole::InstructionNote {
            if let Some(urn) = corresp {
                return self.replace_instruction(depth, doc, id, urn);
            }
        }
        if corresp.is_none() && xml_id.is_none() {
            return Ok(Annotation::None);
        }

        let frame = &self.stack[depth];
        let (project, file_name) = (frame.project.clone(), frame.file_name.clone());
        let note_tag = QName::tei("note").clark();
        let references: Vec<_> = self
            .compiler
            .db
            .get_references_to(
                corresp,
                xml_id,
                xml_id.map(|_| project.as_str()),
                xml_id.map(|_| file_name.as_str()),
            )?
            .into_iter()
            .filter(|r| r.element_tag == note_tag)
            .collect();
        let references = prioritize_all(references, &self.compiler.settings.annotations);

        let mut notes = Vec::with_capacity(references.len());
        for reference in references {
            let source = self
                .compiler
                .cache
                .get(&reference.project, &reference.file_name)?;
            let note_id = source.by_path(&reference.element_path).ok_or_else(|| {
                CompileError::NotFound(format!(
                    "note {} in {}/{}",
                    reference.element_path, reference.project, reference.file_name
                ))
            })?;
            let mut note =
                self.process_document(&reference.project, &reference.file_name, Some(note_id))?;
            stamp_language(&mut note, source.lang(note_id), doc.lang(id));
            notes.push(note);
        }

        if notes.is_empty() {
            Ok(Annotation::None)
        } else {
            tracing::debug!("Inserting {} notes at {}", notes.len(), node.path);
            Ok(Annotation::Insert(notes))
        }
    }

    /// Looks for the preferred instruction note sharing this note's URN.
    fn replace_instruction(
        &mut self,
        depth: usize,
        doc: &Document,
        id: NodeId,
        urn: &str,
    ) -> Result<Annotation> {
        let note_tag = QName::tei("note").clark();
        let candidates: Vec<_> = self
            .compiler
            .db
            .get_urn_mappings(Some(urn), None)?
            .into_iter()
            .filter(|m| m.element_tag.as_deref() == Some(note_tag.as_str()))
            .collect();
        let Some(best) = prioritize(candidates, &self.compiler.settings.priority.instructions)
        else {
            return Ok(Annotation::Keep);
        };

        let node = doc.node(id);
        let is_self = self.stack[depth].is_home(&best.project, &best.file_name)
            && best.element_path.as_deref() == Some(node.path.as_str());
        if is_self {
            return Ok(Annotation::Keep);
        }

        let path = best.element_path.as_deref().ok_or_else(|| {
            CompileError::NotFound(format!("location of instruction {}", urn))
        })?;
        let source = self.compiler.cache.get(&best.project, &best.file_name)?;
        let note_id = source.by_path(path).ok_or_else(|| {
            CompileError::NotFound(format!(
                "instruction {} at {} in {}/{}",
                urn, path, best.project, best.file_name
            ))
        })?;

        tracing::debug!("Replacing instruction {} from {}", urn, best.project);
        let mut note = self.process_document(&best.project, &best.file_name, Some(note_id))?;
        stamp_language(&mut note, source.lang(note_id), doc.lang(id));
        Ok(Annotation::Replace(note))
    }
}
