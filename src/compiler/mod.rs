//! Linearization of a source document: transclusions are replaced by the
//! content they point at and notes are inserted or substituted according to
//! the project priorities in [`Settings`].
//!
//! A compilation is a recursive walk driven by a stack of
//! [`ProcessingContext`] frames. Three walkers share it: the whole-document
//! walker copies a document or subtree, the external walker copies the
//! structure between two markers, and the inline walker copies only their text.

mod annotate;
mod context;
mod document;
mod external;
mod inline;
mod role;

pub use context::{find_marker, Bounds, Command, ProcessingContext};
pub use role::{ElementRole, TransclusionType};

use std::sync::Arc;

use crate::cache::DocumentCache;
use crate::config::Settings;
use crate::db::Database;
use crate::error::CompileError;
use crate::xml::{Element, QName, Serializer};

type Result<T> = std::result::Result<T, CompileError>;

pub struct Compiler {
    cache: Arc<DocumentCache>,
    db: Database,
    settings: Settings,
}

impl Compiler {
    pub fn new(cache: Arc<DocumentCache>, db: Database, settings: Settings) -> Self {
        Self { cache, db, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Compiles one source file into a self-contained tree.
    pub fn compile(&self, project: &str, file_name: &str) -> Result<Element> {
        tracing::info!("Compiling {}/{}", project, file_name);
        Session::new(self).process_document(project, file_name, None)
    }

    /// Compiles and serializes, reusing the source root's namespace prefixes.
    pub fn compile_to_string(&self, project: &str, file_name: &str) -> Result<String> {
        let tree = self.compile(project, file_name)?;
        let source = self.cache.get(project, file_name)?;
        Ok(Serializer::new()
            .with_declarations(source.namespaces())
            .serialize(&tree))
    }
}

/// State owned by one compilation.
pub(crate) struct Session<'c> {
    compiler: &'c Compiler,
    stack: Vec<ProcessingContext>,
}

impl<'c> Session<'c> {
    fn new(compiler: &'c Compiler) -> Self {
        Self {
            compiler,
            stack: Vec::new(),
        }
    }

    /// Pushes a frame and returns its depth, refusing to nest past the limit.
    fn push(&mut self, frame: ProcessingContext) -> Result<usize> {
        let limit = self.compiler.settings.max_depth;
        if self.stack.len() >= limit {
            tracing::warn!(
                "Depth limit reached at {}/{}",
                frame.project,
                frame.file_name
            );
            return Err(CompileError::CyclicTransclusion {
                project: frame.project,
                file_name: frame.file_name,
                limit,
            });
        }
        self.stack.push(frame);
        Ok(self.stack.len() - 1)
    }

    /// Runs `walk` inside a new frame, popping it however the walk ends.
    fn within<T>(
        &mut self,
        frame: ProcessingContext,
        walk: impl FnOnce(&mut Self, usize) -> Result<T>,
    ) -> Result<T> {
        let depth = self.push(frame)?;
        let result = walk(self, depth);
        self.stack.truncate(depth);
        result
    }

    /// The (project, file) of the innermost frame, if any.
    fn home(&self) -> Option<(&str, &str)> {
        self.stack
            .last()
            .map(|frame| (frame.project.as_str(), frame.file_name.as_str()))
    }
}

/// Records where content came from.
fn stamp_provenance(element: &mut Element, project: &str, file_name: &str) {
    element.set_attribute(QName::processing("project"), project);
    element.set_attribute(QName::processing("file_name"), file_name);
}

/// Marks content whose language differs from the language where it lands.
fn stamp_language(element: &mut Element, source: Option<&str>, in_scope: Option<&str>) {
    if let Some(lang) = source {
        if Some(lang) != in_scope {
            element.set_attribute(QName::xml("lang"), lang);
        }
    }
}
