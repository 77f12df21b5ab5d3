//! Store process configuration
//!
//! Read from the environment on every connect attempt:
//!
//!   MEMORY_MCP_COMMAND       executable (default `memory-mcp`)
//!   MEMORY_MCP_ARGS          JSON array of strings, or a whitespace-separated string
//!   MEMORY_MCP_CWD           working directory for the process
//!   MEMORY_MCP_TIMEOUT_SECS  per-request timeout applied by the protocol client

use memgraph_core::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_COMMAND: &str = "memory-mcp";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct McpConfig {
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip)]
    pub request_timeout: Duration,
}

impl McpConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. `from_env` is this over `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let command = lookup("MEMORY_MCP_COMMAND")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string());
        let args = parse_args(lookup("MEMORY_MCP_ARGS").as_deref())?;
        let cwd = lookup("MEMORY_MCP_CWD")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let request_timeout = match lookup("MEMORY_MCP_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!("MEMORY_MCP_TIMEOUT_SECS must be a whole number, got {:?}", raw))
                })?;
                Duration::from_secs(secs)
            }
            _ => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            command,
            args,
            cwd,
            request_timeout,
        })
    }
}

/// Parse process arguments. A value starting with `[` must be a JSON array of
/// strings; anything else is split on whitespace (no quoting support).
pub fn parse_args(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        let invalid = || {
            Error::Config(
                r#"MEMORY_MCP_ARGS must be a JSON array of strings, e.g. ["--flag","value"]."#.to_string(),
            )
        };
        let parsed: Value = serde_json::from_str(trimmed).map_err(|_| invalid())?;
        let items = parsed.as_array().ok_or_else(invalid)?;
        return items
            .iter()
            .map(|v| v.as_str().map(String::from).ok_or_else(invalid))
            .collect();
    }

    Ok(raw.split_whitespace().map(String::from).collect())
}

/// Where connect attempts get their configuration.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<McpConfig>;
}

/// Reads `MEMORY_MCP_*` from the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvConfig;

impl ConfigSource for EnvConfig {
    fn load(&self) -> Result<McpConfig> {
        McpConfig::from_env()
    }
}

impl ConfigSource for McpConfig {
    fn load(&self) -> Result<McpConfig> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = McpConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.command, "memory-mcp");
        assert!(config.args.is_empty());
        assert!(config.cwd.is_none());
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = McpConfig::from_lookup(lookup(&[
            ("MEMORY_MCP_COMMAND", "   "),
            ("MEMORY_MCP_CWD", " "),
        ]))
        .unwrap();
        assert_eq!(config.command, "memory-mcp");
        assert!(config.cwd.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = McpConfig::from_lookup(lookup(&[
            ("MEMORY_MCP_COMMAND", " npx "),
            ("MEMORY_MCP_ARGS", r#"["-y", "@modelcontextprotocol/server-memory"]"#),
            ("MEMORY_MCP_CWD", "/srv/memory"),
            ("MEMORY_MCP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.command, "npx");
        assert_eq!(config.args, vec!["-y", "@modelcontextprotocol/server-memory"]);
        assert_eq!(config.cwd.as_deref(), Some("/srv/memory"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_timeout() {
        let err = McpConfig::from_lookup(lookup(&[("MEMORY_MCP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_parse_args_whitespace() {
        assert_eq!(parse_args(Some("  --a  b\tc ")).unwrap(), vec!["--a", "b", "c"]);
        assert!(parse_args(Some("")).unwrap().is_empty());
        assert!(parse_args(None).unwrap().is_empty());
    }

    #[test]
    fn test_parse_args_json() {
        assert_eq!(parse_args(Some(r#" ["a b", "c"] "#)).unwrap(), vec!["a b", "c"]);
    }

    #[test]
    fn test_parse_args_json_rejects_non_strings() {
        assert!(parse_args(Some("[1, 2]")).is_err());
        assert!(parse_args(Some("[not json")).is_err());
    }

    #[test]
    fn test_serializes_without_timeout() {
        let config = McpConfig::new("memory-mcp").with_args(["--x"]);
        let v = serde_json::to_value(&config).unwrap();
        assert_eq!(v, serde_json::json!({ "command": "memory-mcp", "args": ["--x"] }));
    }
}
