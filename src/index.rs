//! Scanning source files into the cross-reference store and keeping the store
//! in step with the project directory.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::error::IndexError;
use crate::models::*;
use crate::xml::{Document, QName, URN_PREFIX};

type Result<T> = std::result::Result<T, IndexError>;

/// Everything a single file contributes to the store.
#[derive(Debug, Default)]
pub struct FileScan {
    pub mappings: Vec<UrnMapping>,
    pub references: Vec<ElementReference>,
}

/// Collects URN definitions (`corresp` in the corpus scheme) and `target`
/// references from a parsed document.
pub fn scan_document(doc: &Document, project: &str, file_name: &str) -> FileScan {
    let mut scan = FileScan::default();
    let type_attr = QName::local("type");

    for (_, node) in doc.nodes() {
        let tag = node.name.clark();
        let element_type = node.attribute(&type_attr).map(str::to_string);

        if let Some(urn) = node.corresp().filter(|c| c.starts_with(URN_PREFIX)) {
            // Later definitions in the same file win, as they would on upsert.
            scan.mappings.retain(|m| m.urn != urn);
            scan.mappings.push(UrnMapping {
                urn: urn.to_string(),
                project: project.to_string(),
                file_name: file_name.to_string(),
                element_path: Some(node.path.clone()),
                element_tag: Some(tag.clone()),
                element_type: element_type.clone(),
            });
        }

        if let Some(target) = node.attr("target") {
            let target_end = node.attr("targetEnd");
            for token in target.split_whitespace() {
                scan.references.push(ElementReference {
                    element_path: node.path.clone(),
                    element_tag: tag.clone(),
                    element_type: element_type.clone(),
                    target_start: token.to_string(),
                    target_end: target_end.unwrap_or(token).to_string(),
                    target_is_id: token.starts_with('#'),
                    corresponding_urn: node.corresp().map(str::to_string),
                    project: project.to_string(),
                    file_name: file_name.to_string(),
                });
            }
        }
    }

    scan
}

/// Maintains the store for a directory of projects laid out as
/// `<project_directory>/<project>/<file>.xml`.
pub struct Indexer<'a> {
    db: &'a Database,
}

impl<'a> Indexer<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Scans one file into the store and returns the number of rows written.
    ///
    /// A file that cannot be read or parsed is logged and recorded in the
    /// ledger with no rows, so an unchanged bad file is skipped on resync.
    /// Only store failures are returned as errors.
    pub fn index_file(&self, path: &Path, project: &str, file_name: &str) -> Result<usize> {
        let doc = match Document::from_file(path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                return Ok(self.db.store_file(project, file_name, &[], &[])?);
            }
        };

        let scan = scan_document(&doc, project, file_name);
        let count = self
            .db
            .store_file(project, file_name, &scan.mappings, &scan.references)?;
        tracing::debug!("Indexed {}/{}: {} rows", project, file_name, count);
        Ok(count)
    }

    pub fn index_project(&self, project: &str, project_directory: &Path) -> Result<usize> {
        let directory = project_directory.join(project);
        let mut total = 0;
        for file_name in xml_files(&directory)? {
            total += self.index_file(&directory.join(&file_name), project, &file_name)?;
        }
        tracing::info!("Indexed project {}: {} rows", project, total);
        Ok(total)
    }

    pub fn sync_file(
        &self,
        file_name: &str,
        project: &str,
        project_directory: &Path,
    ) -> Result<FileSync> {
        let path = project_directory.join(project).join(file_name);

        if !path.is_file() {
            let removed = self.db.remove_file(file_name, project)?;
            tracing::debug!("Removed {}/{}: {} rows", project, file_name, removed);
            return Ok(FileSync {
                action: SyncAction::Removed,
                references: removed,
            });
        }

        let modified: DateTime<Utc> = std::fs::metadata(&path)?.modified()?.into();
        match self.db.file_last_indexed(file_name, project)? {
            None => {
                let references = self.index_file(&path, project, file_name)?;
                Ok(FileSync {
                    action: SyncAction::Added,
                    references,
                })
            }
            Some(indexed) if modified > indexed => {
                self.db.remove_file(file_name, project)?;
                let references = self.index_file(&path, project, file_name)?;
                Ok(FileSync {
                    action: SyncAction::Updated,
                    references,
                })
            }
            Some(_) => Ok(FileSync {
                action: SyncAction::Skipped,
                references: 0,
            }),
        }
    }

    pub fn sync_project(&self, project: &str, project_directory: &Path) -> Result<ProjectSync> {
        let directory = project_directory.join(project);
        if !directory.is_dir() {
            let removed = self.db.remove_project(project)?;
            tracing::info!("Project {} no longer exists, removed {} rows", project, removed);
            return Ok(ProjectSync {
                action: ProjectAction::Removed,
                added: 0,
                updated: 0,
                removed,
                skipped: 0,
            });
        }

        let on_disk: BTreeSet<String> = xml_files(&directory)?.into_iter().collect();
        let mut result = ProjectSync::synced();

        for file_name in self.db.get_files_by_project(project)? {
            if !on_disk.contains(&file_name) {
                result.record(&self.sync_file(&file_name, project, project_directory)?);
            }
        }
        for file_name in &on_disk {
            result.record(&self.sync_file(file_name, project, project_directory)?);
        }

        tracing::info!(
            "Synced project {}: {} added, {} updated, {} removed, {} skipped",
            project,
            result.added,
            result.updated,
            result.removed,
            result.skipped
        );
        Ok(result)
    }

    pub fn sync_projects(&self, project_directory: &Path) -> Result<ProjectsSync> {
        let on_disk = project_dirs(project_directory)?;
        let mut result = ProjectsSync::default();

        for project in self.db.list_projects()? {
            if !on_disk.contains(&project) {
                let removed = self.db.remove_project(&project)?;
                tracing::info!("Removed orphaned project {}: {} rows", project, removed);
                result.orphaned_projects_removed += 1;
                result.removed += removed;
            }
        }
        for project in &on_disk {
            let synced = self.sync_project(project, project_directory)?;
            result.record(project, synced);
        }

        Ok(result)
    }
}

fn check_directory(directory: &Path) -> Result<()> {
    if !directory.exists() {
        return Err(IndexError::MissingDirectory(directory.to_path_buf()));
    }
    if !directory.is_dir() {
        return Err(IndexError::NotADirectory(directory.to_path_buf()));
    }
    Ok(())
}

/// Names of the `*.xml` files directly inside `directory`, sorted.
fn xml_files(directory: &Path) -> Result<Vec<String>> {
    check_directory(directory)?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        let is_xml = path.extension().is_some_and(|ext| ext == "xml");
        if is_xml && path.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn project_dirs(project_directory: &Path) -> Result<BTreeSet<String>> {
    check_directory(project_directory)?;
    let mut projects = BTreeSet::new();
    for entry in std::fs::read_dir(project_directory)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if !name.starts_with('.') {
                projects.insert(name.to_string());
            }
        }
    }
    Ok(projects)
}
