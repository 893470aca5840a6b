//! XML trees for the linker.
//!
//! Source files are parsed once into an immutable [`Document`] arena shared
//! through the cache. Compilation never mutates them; it builds owned
//! [`Element`] trees that the [`Serializer`] writes back out.

mod document;
mod element;
mod name;
mod writer;

pub use document::*;
pub use element::*;
pub use name::*;
pub use writer::*;
