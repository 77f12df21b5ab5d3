//! Protocol client: handshake and tool calls over a [`StdioTransport`]

use crate::config::McpConfig;
use crate::session::{Connector, ToolSession, TransportHooks};
use crate::transport::StdioTransport;
use memgraph_core::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const CLIENT_NAME: &str = "memgraph";

pub struct McpClient {
    transport: StdioTransport,
    server_info: Option<Value>,
    request_timeout: Duration,
}

impl McpClient {
    /// `initialize` request followed by the `notifications/initialized` notification.
    pub async fn connect(transport: StdioTransport, request_timeout: Duration) -> Result<Self> {
        let init = transport
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") }
                }),
                request_timeout,
            )
            .await?;
        transport
            .notify("notifications/initialized", json!({}))
            .await?;

        let server_info = init.get("serverInfo").cloned();
        info!(
            pid = ?transport.pid(),
            server = %server_info.as_ref().map(serde_json::Value::to_string).unwrap_or_default(),
            "store handshake complete"
        );

        Ok(Self {
            transport,
            server_info,
            request_timeout,
        })
    }
}

#[async_trait::async_trait]
impl ToolSession for McpClient {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        debug!("tools/call {}", name);
        self.transport
            .request(
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
                self.request_timeout,
            )
            .await
    }

    fn server_version(&self) -> Option<Value> {
        self.server_info.clone()
    }

    fn pid(&self) -> Option<u32> {
        self.transport.pid()
    }

    async fn close(&self) {
        self.transport.close().await;
    }
}

/// Spawns the configured command and speaks the protocol over its stdio.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdioConnector;

#[async_trait::async_trait]
impl Connector for StdioConnector {
    async fn connect(&self, config: &McpConfig, hooks: TransportHooks) -> Result<Arc<dyn ToolSession>> {
        let transport = StdioTransport::spawn(config, hooks.clone())?;
        match McpClient::connect(transport, config.request_timeout).await {
            Ok(client) => Ok(Arc::new(client)),
            Err(e) => {
                hooks.error(e.to_string());
                Err(e)
            }
        }
    }
}
