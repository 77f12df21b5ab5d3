//! Tests for the stdio connector against real child processes (unix only)
#![cfg(unix)]

use memgraph_mcp::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// A tiny line-oriented store: answers `initialize`, serves one fixed graph
/// from `tools/call`, and exits on a `tools/call` for `crash`.
const FAKE_STORE: &str = r#"
echo "fake store ready" >&2
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake-store","version":"0.1.0"}}}\n' "$id" ;;
    *'"name":"crash"'*)
      exit 0 ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"{\\"entities\\":[{\\"name\\":\\"a\\"}],\\"relations\\":[]}"}]}}\n' "$id" ;;
  esac
done
"#;

fn fake_store_manager() -> ConnectionManager {
    let config = McpConfig::new("sh").with_args(["-c", FAKE_STORE]);
    ConnectionManager::new(Arc::new(StdioConnector), Arc::new(config))
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ===========================================================================
// Spawn failures
// ===========================================================================

#[tokio::test]
async fn missing_binary_fails_connect() {
    let config = McpConfig::new("memgraph-test-no-such-binary-7f3a");
    let mgr = ConnectionManager::new(Arc::new(StdioConnector), Arc::new(config));

    let err = mgr.acquire().await.unwrap_err();
    assert!(err.to_string().contains("failed to spawn"));
    assert!(mgr.peek().is_none());
}

#[tokio::test]
async fn process_exiting_before_handshake_fails_connect() {
    let config = McpConfig::new("sh").with_args(["-c", "echo broken >&2; exit 3"]);
    let mgr = ConnectionManager::new(Arc::new(StdioConnector), Arc::new(config));

    assert!(mgr.acquire().await.is_err());
    assert!(mgr.peek().is_none());
}

// ===========================================================================
// Round trip
// ===========================================================================

#[tokio::test]
async fn handshake_and_tool_call() {
    let mgr = fake_store_manager();
    let invoker = ToolInvoker::new(mgr.clone());
    let store = MemoryStore::new(invoker);

    let graph = store.read_graph().await.unwrap();
    assert_eq!(graph.entities.len(), 1);
    assert_eq!(graph.entities[0].name, "a");

    let status = mgr.peek().unwrap();
    assert!(status.pid.is_some());
    assert_eq!(
        status.server_version,
        Some(json!({ "name": "fake-store", "version": "0.1.0" }))
    );
    assert!(
        eventually(|| mgr
            .peek()
            .is_some_and(|s| s.stderr_tail.contains(&"fake store ready".to_string())))
        .await
    );

    mgr.shutdown().await;
}

#[tokio::test]
async fn concurrent_calls_share_one_process() {
    let mgr = fake_store_manager();
    let invoker = ToolInvoker::new(mgr.clone());

    let results = futures::future::join_all(
        (0..6).map(|_| invoker.call_tool("read_graph", json!({}))),
    )
    .await;
    for r in results {
        assert_eq!(r.unwrap()["entities"][0]["name"], json!("a"));
    }
    let pid = mgr.peek().unwrap().pid;

    invoker.call_tool("read_graph", json!({})).await.unwrap();
    assert_eq!(mgr.peek().unwrap().pid, pid);

    mgr.shutdown().await;
}

#[tokio::test]
async fn process_exit_is_detected_and_next_call_respawns() {
    let mgr = fake_store_manager();
    let invoker = ToolInvoker::new(mgr.clone());

    invoker.call_tool("read_graph", json!({})).await.unwrap();
    let first_pid = mgr.peek().unwrap().pid;

    assert!(invoker.call_tool("crash", json!({})).await.is_err());
    assert!(eventually(|| mgr.peek().is_none()).await);

    invoker.call_tool("read_graph", json!({})).await.unwrap();
    let second_pid = mgr.peek().unwrap().pid;
    assert_ne!(first_pid, second_pid);

    mgr.shutdown().await;
}
