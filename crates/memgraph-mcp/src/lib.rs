//! Memgraph MCP: supervised connection to the knowledge-graph store process
//!
//! Layers, bottom up:
//!   transport/client : stdio JSON-RPC to the spawned store
//!   connection       : single shared connection, lazily (re)established
//!   invoker          : tool calls with response unwrapping
//!   store/rename     : typed graph operations on top of the invoker

pub mod client;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod invoker;
pub mod rename;
pub mod session;
pub mod store;
pub mod transport;

pub use client::{McpClient, StdioConnector};
pub use config::{ConfigSource, EnvConfig, McpConfig};
pub use connection::{Connection, ConnectionManager, ConnectionStatus};
pub use diagnostics::{Diagnostics, STDERR_LINE_BYTES, STDERR_TAIL_LINES};
pub use invoker::{ToolCaller, ToolInvoker, ToolResponse};
pub use rename::{RenameOutcome, RenameRequest};
pub use session::{Connector, ToolSession, TransportHooks};
pub use store::MemoryStore;
