//! Data models for the ideas store.
//!
//! Records, orderings and the versioned document envelope they are persisted in.

mod document;
mod ordering;
mod record;

pub use document::*;
pub use ordering::*;
pub use record::*;
