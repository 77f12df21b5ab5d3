//! Stdio transport: newline-delimited JSON-RPC 2.0 to a spawned store process
//!
//! One background task reads stdout and routes responses to waiters by request
//! id, so concurrent requests interleave on the same pipe. Another task feeds
//! stderr into the diagnostics tail. Stdout EOF (or a read failure) closes the
//! transport: pending requests fail and the close hook fires exactly once.
//!
//! Both pipes are read line by line with a per-line byte cap, so a process
//! that never writes a newline cannot grow memory without bound.

use crate::config::McpConfig;
use crate::diagnostics::STDERR_LINE_BYTES;
use crate::session::TransportHooks;
use dashmap::DashMap;
use memgraph_core::{Error, Result};
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Largest stdout message accepted from the store.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

type Pending = Arc<DashMap<u64, oneshot::Sender<Result<Value>>>>;
type Writer = Arc<tokio::sync::Mutex<ChildStdin>>;

pub struct StdioTransport {
    writer: Writer,
    child: tokio::sync::Mutex<Option<Child>>,
    pending: Pending,
    next_id: AtomicU64,
    pid: Option<u32>,
    closed: Arc<AtomicBool>,
    hooks: TransportHooks,
}

/// A request's slot in the pending table. Dropping it frees the slot, whether
/// the request completed, failed, timed out or was cancelled by its caller.
struct PendingSlot<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

impl StdioTransport {
    /// Spawn the configured command with piped stdio and start the listeners.
    pub fn spawn(config: &McpConfig, hooks: TransportHooks) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::upstream(format!("failed to spawn {}: {}", config.command, e)))?;
        let pid = child.id();
        info!(command = %config.command, args = ?config.args, pid = ?pid, "spawned store process");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::upstream("store stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::upstream("store stdout unavailable"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_stderr(stderr, hooks.clone()));
        }

        let writer: Writer = Arc::new(tokio::sync::Mutex::new(stdin));
        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(pump_stdout(
            stdout,
            pending.clone(),
            writer.clone(),
            hooks.clone(),
            closed.clone(),
        ));

        Ok(Self {
            writer,
            child: tokio::sync::Mutex::new(Some(child)),
            pending,
            next_id: AtomicU64::new(1),
            pid,
            closed,
            hooks,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for the matching response.
    pub async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::upstream("connection closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            id,
        };
        // the reader may have drained `pending` between the check above and the insert
        if self.is_closed() {
            return Err(Error::upstream("connection closed"));
        }

        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        self.write(&message).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::upstream("connection closed")),
            Err(_) => Err(Error::upstream(format!(
                "request timed out after {}s: {}",
                timeout.as_secs(),
                method
            ))),
        }
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.write(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
    }

    async fn write(&self, message: &Value) -> Result<()> {
        write_line(&self.writer, message).await.map_err(|e| {
            let message = format!("write to store failed: {}", e);
            self.hooks.error(message.clone());
            Error::upstream(message)
        })
    }

    /// Kill the process. The stdout listener then observes EOF and closes.
    pub async fn close(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!("kill store process: {}", e);
            }
        }
    }
}

async fn write_line(writer: &Writer, message: &Value) -> std::io::Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    let mut stdin = writer.lock().await;
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

/// Read one `\n`-terminated line into `buf`, keeping at most `max` bytes.
/// Bytes past the cap are consumed and discarded. Returns `None` at EOF with
/// nothing read, otherwise whether the line was cut short.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> std::io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut truncated = false;
    let mut read_any = false;
    loop {
        let (used, found) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(read_any.then_some(truncated));
            }
            let (line, used, found) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            let room = max.saturating_sub(buf.len());
            if line.len() > room {
                truncated = true;
            }
            buf.extend_from_slice(&line[..line.len().min(room)]);
            (used, found)
        };
        reader.consume(used);
        read_any = true;
        if found {
            return Ok(Some(truncated));
        }
    }
}

async fn pump_stdout(
    stdout: ChildStdout,
    pending: Pending,
    writer: Writer,
    hooks: TransportHooks,
    closed: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        match read_line_capped(&mut reader, &mut buf, MAX_MESSAGE_BYTES).await {
            Ok(Some(true)) => hooks.error(format!(
                "dropped message from store larger than {} bytes",
                MAX_MESSAGE_BYTES
            )),
            Ok(Some(false)) => {
                if buf.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<Value>(&buf) {
                    Ok(message) => dispatch(message, &pending, &writer, &hooks).await,
                    Err(e) => hooks.error(format!("invalid message from store: {}", e)),
                }
            }
            Ok(None) => break,
            Err(e) => {
                hooks.error(format!("read from store failed: {}", e));
                break;
            }
        }
    }

    if !closed.swap(true, Ordering::SeqCst) {
        let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, waiter)) = pending.remove(&id) {
                let _ = waiter.send(Err(Error::upstream("connection closed")));
            }
        }
        info!("store transport closed");
        hooks.closed();
    }
}

async fn dispatch(message: Value, pending: &Pending, writer: &Writer, hooks: &TransportHooks) {
    let method = message.get("method").and_then(Value::as_str);
    let id = message.get("id").cloned();

    match (method, id) {
        // server → client request
        (Some(method), Some(id)) => {
            let reply = if method == "ping" {
                json!({ "jsonrpc": "2.0", "id": id, "result": {} })
            } else {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": format!("Method not found: {}", method) }
                })
            };
            if let Err(e) = write_line(writer, &reply).await {
                hooks.error(format!("write to store failed: {}", e));
            }
        }
        (Some(method), None) => debug!("store notification: {}", method),
        (None, Some(id)) => {
            let Some((_, waiter)) = id.as_u64().and_then(|id| pending.remove(&id)) else {
                debug!("response for unknown request id {}", id);
                return;
            };
            let result = match message.get("error") {
                Some(error) => Err(Error::upstream(rpc_error_message(error))),
                None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
            };
            let _ = waiter.send(result);
        }
        (None, None) => debug!("ignoring unroutable message from store"),
    }
}

fn rpc_error_message(error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| error.to_string());
    match error.get("code").and_then(Value::as_i64) {
        Some(code) => format!("MCP error {}: {}", code, message),
        None => message,
    }
}

async fn pump_stderr(stderr: ChildStderr, hooks: TransportHooks) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        match read_line_capped(&mut reader, &mut buf, STDERR_LINE_BYTES).await {
            Ok(Some(_)) => hooks.stderr(&String::from_utf8_lossy(&buf)),
            Ok(None) => break,
            Err(e) => {
                debug!("store stderr read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_message() {
        assert_eq!(
            rpc_error_message(&json!({ "code": -32602, "message": "bad params" })),
            "MCP error -32602: bad params"
        );
        assert_eq!(rpc_error_message(&json!({ "message": "plain" })), "plain");
        assert_eq!(rpc_error_message(&json!("weird")), "\"weird\"");
    }

    #[tokio::test]
    async fn test_read_line_capped() {
        let mut input: &[u8] = b"aaaaaaaaaa\nbc\n\nlast";
        let mut buf = Vec::new();

        assert_eq!(read_line_capped(&mut input, &mut buf, 4).await.unwrap(), Some(true));
        assert_eq!(buf, b"aaaa");
        assert_eq!(read_line_capped(&mut input, &mut buf, 4).await.unwrap(), Some(false));
        assert_eq!(buf, b"bc");
        assert_eq!(read_line_capped(&mut input, &mut buf, 4).await.unwrap(), Some(false));
        assert!(buf.is_empty());
        assert_eq!(read_line_capped(&mut input, &mut buf, 4).await.unwrap(), Some(false));
        assert_eq!(buf, b"last");
        assert_eq!(read_line_capped(&mut input, &mut buf, 4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_newline_free_flood_stays_capped() {
        let flood = vec![b'x'; 8 * 1024 * 1024];
        let mut input: &[u8] = &flood;
        let mut buf = Vec::new();

        assert_eq!(
            read_line_capped(&mut input, &mut buf, STDERR_LINE_BYTES).await.unwrap(),
            Some(true)
        );
        assert_eq!(buf.len(), STDERR_LINE_BYTES);
        assert_eq!(read_line_capped(&mut input, &mut buf, STDERR_LINE_BYTES).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_requests_release_their_slots() {
        use crate::diagnostics::Diagnostics;

        let config = McpConfig::new("sh").with_args(["-c", "while read -r l; do :; done"]);
        let hooks = TransportHooks::new(Arc::new(Diagnostics::new()), Arc::new(|| {}));
        let transport = StdioTransport::spawn(&config, hooks).unwrap();

        for _ in 0..50 {
            let call = transport.request("tools/call", json!({}), Duration::from_secs(3600));
            assert!(tokio::time::timeout(Duration::from_millis(2), call).await.is_err());
        }
        assert!(transport.pending.is_empty());

        let timed_out = transport
            .request("tools/call", json!({}), Duration::from_millis(20))
            .await;
        assert!(timed_out.unwrap_err().to_string().contains("timed out"));
        assert!(transport.pending.is_empty());

        transport.close().await;
    }
}
