//! Repository layer: entity-scoped database operations.

mod document;

pub use document::*;
