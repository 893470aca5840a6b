//! Links a corpus of TEI projects through a cross-reference index and
//! compiles source documents into self-contained trees.

pub mod cache;
pub mod compiler;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod urn;
pub mod xml;

pub use cache::DocumentCache;
pub use compiler::Compiler;
pub use config::Settings;
pub use db::Database;
pub use error::{CompileError, ConfigError, IndexError, XmlError};
pub use index::Indexer;
pub use urn::UrnResolver;
