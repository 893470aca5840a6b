//! Data types shared by the index, the resolver and the CLI.
//!
//! - [`UrnMapping`]: where a URN is defined.
//! - [`ElementReference`]: an element pointing at a target through `@target`.
//! - [`ResolvedUrn`], [`ResolvedUrnRange`], [`Resolution`]: results of URN lookup.
//! - [`FileSync`], [`ProjectSync`], [`ProjectsSync`]: reports from reconciling
//!   the index with the project directory.

mod reference;
mod sync;
mod urn;

pub use reference::*;
pub use sync::*;
pub use urn::*;
