//! Memgraph Gateway - HTTP surface over the supervised knowledge-graph store

pub mod api;
pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{router, start_gateway, AppState};
