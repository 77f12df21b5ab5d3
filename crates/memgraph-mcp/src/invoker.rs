//! Tool invoker: tool calls over the managed connection, with response unwrapping
//!
//! The protocol allows several equally valid response encodings. They are
//! tried in a fixed order, first match wins:
//!
//!   1. `toolResult`                  → Direct
//!   2. `structuredContent` (truthy)  → Structured
//!   3. first `text` content block    → TextEncodedJson, if it parses as JSON
//!   4. anything else                 → Raw (the whole response)

use crate::connection::ConnectionManager;
use memgraph_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Anything that can run a named tool with JSON arguments.
#[async_trait::async_trait]
pub trait ToolCaller: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;
}

#[async_trait::async_trait]
impl<T: ToolCaller + ?Sized> ToolCaller for Arc<T> {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        (**self).call_tool(name, arguments).await
    }
}

/// A tool response, classified by which encoding carried the payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolResponse {
    Direct(Value),
    Structured(Value),
    TextEncodedJson(Value),
    Raw(Value),
}

impl ToolResponse {
    pub fn classify(raw: Value) -> Self {
        if !raw.is_object() {
            return Self::Raw(raw);
        }

        if let Some(direct) = raw.get("toolResult") {
            return Self::Direct(direct.clone());
        }
        if let Some(structured) = raw.get("structuredContent").filter(|v| is_truthy(v)) {
            return Self::Structured(structured.clone());
        }
        if let Some(parsed) = first_text(&raw).and_then(|t| serde_json::from_str::<Value>(t).ok()) {
            return Self::TextEncodedJson(parsed);
        }

        Self::Raw(raw)
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Direct(v) | Self::Structured(v) | Self::TextEncodedJson(v) | Self::Raw(v) => v,
        }
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text of the first `type: "text"` content block, if non-empty.
fn first_text(raw: &Value) -> Option<&str> {
    raw.get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
        .filter(|t| !t.is_empty())
}

/// Message for a response the store flagged with `isError: true`.
fn tool_error_message(raw: &Value) -> Option<String> {
    if raw.get("isError").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    Some(
        first_text(raw)
            .map(String::from)
            .unwrap_or_else(|| raw.to_string()),
    )
}

#[derive(Clone)]
pub struct ToolInvoker {
    manager: ConnectionManager,
}

impl ToolInvoker {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

#[async_trait::async_trait]
impl ToolCaller for ToolInvoker {
    /// No retries here: connect and call failures go straight back to the caller.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let connection = self.manager.acquire().await?;
        debug!(tool = name, "calling store tool");
        let raw = connection.session().call_tool(name, arguments).await?;
        if let Some(message) = tool_error_message(&raw) {
            return Err(Error::tool_failed(name, message));
        }
        Ok(ToolResponse::classify(raw).into_value())
    }
}
