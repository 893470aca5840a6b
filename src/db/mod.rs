mod schema;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, Transaction};

use crate::error::IndexError;
use crate::models::*;

type Result<T> = std::result::Result<T, IndexError>;

/// The cross-reference store: URN definitions, outbound references and the
/// ledger of scanned files, in one SQLite database.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("org", "opensiddur", "tei-linker")
            .ok_or(IndexError::NoDataDirectory)?;
        Ok(dirs.data_dir().join("reference.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        schema::run_migrations(&conn)
    }

    // ============================================================
    // URN mappings
    // ============================================================

    /// Inserts a mapping, or moves an existing (urn, project) claim to the new file.
    pub fn add_urn_mapping(&self, mapping: &UrnMapping) -> Result<()> {
        let conn = self.conn.lock();
        upsert_mapping(&conn, mapping, &now())?;
        Ok(())
    }

    pub fn get_urn_mappings(
        &self,
        urn: Option<&str>,
        project: Option<&str>,
    ) -> Result<Vec<UrnMapping>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT urn, project, file_name, element_path, element_tag, element_type
             FROM urn_mappings
             WHERE (?1 IS NULL OR urn = ?1) AND (?2 IS NULL OR project = ?2)
             ORDER BY project, urn",
        )?;

        let mappings = stmt
            .query_map((urn, project), |row| {
                Ok(UrnMapping {
                    urn: row.get(0)?,
                    project: row.get(1)?,
                    file_name: row.get(2)?,
                    element_path: row.get(3)?,
                    element_tag: row.get(4)?,
                    element_type: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(mappings)
    }

    pub fn get_urns_by_project(&self, project: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT urn FROM urn_mappings WHERE project = ? ORDER BY urn")?;
        let urns = stmt
            .query_map([project], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(urns)
    }

    // ============================================================
    // Element references
    // ============================================================

    pub fn add_reference(&self, reference: &ElementReference) -> Result<()> {
        let conn = self.conn.lock();
        insert_reference(&conn, reference, &now())?;
        Ok(())
    }

    /// References whose target is `urn`, or the local fragment `#id` inside
    /// (`project`, `file_name`). A fragment is only looked up when both are
    /// given. Rows found by both lookups are returned once.
    pub fn get_references_to(
        &self,
        urn: Option<&str>,
        id: Option<&str>,
        project: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Vec<ElementReference>> {
        let conn = self.conn.lock();
        let mut references = Vec::new();

        if let Some(urn) = urn {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REFERENCE_COLUMNS} FROM element_references
                 WHERE target_start = ?
                 ORDER BY project, file_name, id"
            ))?;
            references.extend(
                stmt.query_map([urn], reference_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            );
        }

        if let (Some(id), Some(project), Some(file_name)) = (id, project, file_name) {
            let target = if id.starts_with('#') {
                id.to_string()
            } else {
                format!("#{}", id)
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {REFERENCE_COLUMNS} FROM element_references
                 WHERE target_start = ?1 AND target_is_id = 1
                   AND project = ?2 AND file_name = ?3
                 ORDER BY project, file_name, id"
            ))?;
            for reference in stmt
                .query_map((&target, project, file_name), reference_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
            {
                let duplicate = references.iter().any(|r: &ElementReference| {
                    r.project == reference.project
                        && r.file_name == reference.file_name
                        && r.element_path == reference.element_path
                });
                if !duplicate {
                    references.push(reference);
                }
            }
        }

        Ok(references)
    }

    pub fn get_references_by_project(&self, project: &str) -> Result<Vec<ElementReference>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REFERENCE_COLUMNS} FROM element_references
             WHERE project = ?
             ORDER BY element_path, id"
        ))?;
        let references = stmt
            .query_map([project], reference_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(references)
    }

    // ============================================================
    // File and project bookkeeping
    // ============================================================

    /// Writes everything scanned from one file in a single transaction and
    /// records the file in the ledger. Returns the number of rows written.
    pub fn store_file(
        &self,
        project: &str,
        file_name: &str,
        mappings: &[UrnMapping],
        references: &[ElementReference],
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let stamp = now();

        for mapping in mappings {
            upsert_mapping(&tx, mapping, &stamp)?;
        }
        for reference in references {
            insert_reference(&tx, reference, &stamp)?;
        }
        tx.execute(
            "INSERT INTO indexed_files (project, file_name, indexed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(project, file_name) DO UPDATE SET indexed_at = excluded.indexed_at",
            (project, file_name, &stamp),
        )?;

        tx.commit()?;
        Ok(mappings.len() + references.len())
    }

    /// Deletes every row recorded for one file. Returns the number of mappings
    /// and references removed.
    pub fn remove_file(&self, file_name: &str, project: &str) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = delete_scope(
            &tx,
            "project = ?1 AND file_name = ?2",
            &[project, file_name],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn remove_project(&self, project: &str) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = delete_scope(&tx, "project = ?1", &[project])?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn list_projects(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT project FROM urn_mappings
             UNION SELECT project FROM element_references
             UNION SELECT project FROM indexed_files
             ORDER BY 1",
        )?;
        let projects = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(projects)
    }

    pub fn get_files_by_project(&self, project: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT file_name FROM urn_mappings WHERE project = ?1
             UNION SELECT file_name FROM element_references WHERE project = ?1
             UNION SELECT file_name FROM indexed_files WHERE project = ?1
             ORDER BY 1",
        )?;
        let files = stmt
            .query_map([project], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(files)
    }

    /// Most recent time anything was recorded for (file, project), if ever.
    pub fn file_last_indexed(
        &self,
        file_name: &str,
        project: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(ts) FROM (
                SELECT updated_at AS ts FROM urn_mappings WHERE project = ?1 AND file_name = ?2
                UNION ALL
                SELECT updated_at FROM element_references WHERE project = ?1 AND file_name = ?2
                UNION ALL
                SELECT indexed_at FROM indexed_files WHERE project = ?1 AND file_name = ?2
            )",
            (project, file_name),
            |row| row.get(0),
        )?;
        Ok(latest.as_deref().and_then(parse_timestamp))
    }

    pub fn project_stats(&self, project: &str) -> Result<ProjectStats> {
        let files = self.get_files_by_project(project)?.len();
        let conn = self.conn.lock();
        let urns: i64 = conn.query_row(
            "SELECT COUNT(*) FROM urn_mappings WHERE project = ?",
            [project],
            |row| row.get(0),
        )?;
        let references: i64 = conn.query_row(
            "SELECT COUNT(*) FROM element_references WHERE project = ?",
            [project],
            |row| row.get(0),
        )?;
        Ok(ProjectStats {
            project: project.to_string(),
            files,
            urns: urns as usize,
            references: references as usize,
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

const REFERENCE_COLUMNS: &str = "element_path, element_tag, element_type, target_start, \
     target_end, target_is_id, corresponding_urn, project, file_name";

fn reference_from_row(row: &Row) -> rusqlite::Result<ElementReference> {
    Ok(ElementReference {
        element_path: row.get(0)?,
        element_tag: row.get(1)?,
        element_type: row.get(2)?,
        target_start: row.get(3)?,
        target_end: row.get(4)?,
        target_is_id: row.get(5)?,
        corresponding_urn: row.get(6)?,
        project: row.get(7)?,
        file_name: row.get(8)?,
    })
}

fn upsert_mapping(conn: &Connection, mapping: &UrnMapping, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO urn_mappings
            (urn, project, file_name, element_path, element_tag, element_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(urn, project) DO UPDATE SET
            file_name = excluded.file_name,
            element_path = excluded.element_path,
            element_tag = excluded.element_tag,
            element_type = excluded.element_type,
            updated_at = excluded.updated_at",
        (
            &mapping.urn,
            &mapping.project,
            &mapping.file_name,
            &mapping.element_path,
            &mapping.element_tag,
            &mapping.element_type,
            now,
        ),
    )?;
    Ok(())
}

fn insert_reference(conn: &Connection, reference: &ElementReference, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO element_references
            (element_path, element_tag, element_type, target_start, target_end, target_is_id,
             corresponding_urn, project, file_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        rusqlite::params![
            &reference.element_path,
            &reference.element_tag,
            &reference.element_type,
            &reference.target_start,
            &reference.target_end,
            reference.target_is_id,
            &reference.corresponding_urn,
            &reference.project,
            &reference.file_name,
            now,
        ],
    )?;
    Ok(())
}

fn delete_scope(tx: &Transaction, scope: &str, params: &[&str]) -> Result<usize> {
    let bind = || rusqlite::params_from_iter(params.iter());
    let mappings = tx.execute(&format!("DELETE FROM urn_mappings WHERE {scope}"), bind())?;
    let references = tx.execute(
        &format!("DELETE FROM element_references WHERE {scope}"),
        bind(),
    )?;
    tx.execute(&format!("DELETE FROM indexed_files WHERE {scope}"), bind())?;
    Ok(mappings + references)
}

/// Timestamps are stored with fixed precision so `MAX()` over text orders them correctly.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
