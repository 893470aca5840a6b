use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CompileError;
use crate::xml::Document;

/// Parsed source documents, loaded on first use and shared for the life of the cache.
///
/// Entries are keyed by (project, file) and never refreshed; evict or drop the
/// cache to pick up changes on disk.
pub struct DocumentCache {
    base_path: PathBuf,
    documents: RwLock<HashMap<(String, String), Arc<Document>>>,
}

impl DocumentCache {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            documents: RwLock::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_of(&self, project: &str, file_name: &str) -> PathBuf {
        self.base_path.join(project).join(file_name)
    }

    pub fn get(&self, project: &str, file_name: &str) -> Result<Arc<Document>, CompileError> {
        let key = (project.to_string(), file_name.to_string());
        if let Some(doc) = self.documents.read().get(&key) {
            return Ok(doc.clone());
        }

        let path = self.path_of(project, file_name);
        if !path.is_file() {
            return Err(CompileError::NotFound(format!(
                "document {}/{} ({})",
                project,
                file_name,
                path.display()
            )));
        }

        // Parsed outside the lock: concurrent first loads may both parse, and the first insert wins.
        let doc = Document::from_file(&path)
            .map_err(|source| CompileError::Xml { path, source })?;
        tracing::debug!("Loaded {}/{}", project, file_name);

        let mut documents = self.documents.write();
        Ok(documents.entry(key).or_insert_with(|| Arc::new(doc)).clone())
    }

    pub fn evict(&self, project: &str, file_name: &str) -> bool {
        self.documents
            .write()
            .remove(&(project.to_string(), file_name.to_string()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}
