//! Memgraph Core - graph types, normalization, and error handling

pub mod error;
pub mod graph;
pub mod types;

pub use error::{Error, ErrorKind, RenameStage, Result};
pub use graph::{normalize, CanonicalGraph, Entity, Relation};
pub use types::*;
