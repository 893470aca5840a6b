use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("Malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("Undeclared namespace prefix: {0}")]
    UnknownPrefix(String),
    #[error("Document has no root element")]
    NoRoot,
    #[error("Document has more than one root element")]
    MultipleRoots,
    #[error("Element <{0}> is never closed")]
    Unclosed(String),
    #[error("Invalid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the persistent cross-reference store.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Failed to apply migration {version}: {name}")]
    Migration {
        version: &'static str,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Project directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Could not determine data directory")]
    NoDataDirectory,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("Transclusion depth limit of {limit} exceeded in {project}/{file_name}")]
    CyclicTransclusion {
        project: String,
        file_name: String,
        limit: usize,
    },
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("Failed to parse {}: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Project '{project}' is listed in settings but {} does not exist", .directory.display())]
    UnknownProject { project: String, directory: PathBuf },
}
