//! Seams between the connection manager and whatever actually talks to the store

use crate::config::McpConfig;
use crate::diagnostics::Diagnostics;
use memgraph_core::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub type CloseHook = Arc<dyn Fn() + Send + Sync>;

/// Callbacks a transport reports into. Cheap to clone; every clone feeds the
/// same diagnostics and the same close hook.
#[derive(Clone)]
pub struct TransportHooks {
    diagnostics: Arc<Diagnostics>,
    on_close: CloseHook,
}

impl TransportHooks {
    pub fn new(diagnostics: Arc<Diagnostics>, on_close: CloseHook) -> Self {
        Self {
            diagnostics,
            on_close,
        }
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn stderr(&self, chunk: &str) {
        self.diagnostics.push_stderr(chunk);
    }

    /// Record a transport error. Never fails and never closes the transport.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("store transport error: {}", message);
        self.diagnostics.record_error(message);
    }

    pub fn closed(&self) {
        (self.on_close)();
    }
}

/// An established, handshaken link to one store instance.
#[async_trait::async_trait]
pub trait ToolSession: Send + Sync {
    /// Send `tools/call` and return the raw response envelope.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;

    /// Server info advertised during the handshake.
    fn server_version(&self) -> Option<Value>;

    fn pid(&self) -> Option<u32>;

    /// Tear down the link. Default: nothing to release.
    async fn close(&self) {}
}

/// Spawns a store and performs the handshake.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &McpConfig, hooks: TransportHooks) -> Result<Arc<dyn ToolSession>>;
}
