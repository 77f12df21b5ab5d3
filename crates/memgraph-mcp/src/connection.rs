//! Connection manager: owns zero or one live store connection
//!
//! `acquire()` returns the live connection, or joins the connect attempt
//! already in flight, or starts one. Concurrent callers share a single
//! attempt through a `Shared` future, so N callers cause one spawn and all
//! see the same outcome.
//!
//! Nothing reconnects eagerly. A transport close drops the connection and
//! the next `acquire()` spawns a fresh process.
//!
//! Every attempt, close and reset advances a generation counter. Close
//! hooks and attempt completions only touch state while their generation is
//! still current, which makes late callbacks from an abandoned process no-ops.

use crate::config::{ConfigSource, McpConfig};
use crate::diagnostics::Diagnostics;
use crate::session::{Connector, ToolSession, TransportHooks};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use memgraph_core::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// A live, handshaken connection to one store process.
pub struct Connection {
    session: Arc<dyn ToolSession>,
    connected_at: DateTime<Utc>,
    diagnostics: Arc<Diagnostics>,
    generation: u64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected_at", &self.connected_at)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn session(&self) -> &Arc<dyn ToolSession> {
        &self.session
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            pid: self.session.pid(),
            connected_at: self.connected_at.timestamp_millis(),
            server_version: self.session.server_version(),
            last_error: self.diagnostics.last_error(),
            stderr_tail: self.diagnostics.stderr_tail(),
        }
    }
}

/// Read-only snapshot of a connection, as reported by status queries.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub pid: Option<u32>,
    /// Milliseconds since the Unix epoch.
    pub connected_at: i64,
    pub server_version: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub stderr_tail: Vec<String>,
}

type ConnectAttempt = Shared<BoxFuture<'static, std::result::Result<Arc<Connection>, String>>>;

#[derive(Default)]
struct State {
    generation: u64,
    connection: Option<Arc<Connection>>,
    in_flight: Option<ConnectAttempt>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: Arc<dyn ConfigSource>,
    state: Mutex<State>,
}

/// Injectable owner of the store connection. Clones share state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn config(&self) -> Result<McpConfig> {
        self.inner.config.load()
    }

    /// Return the live connection, joining or starting a connect attempt if needed.
    pub async fn acquire(&self) -> Result<Arc<Connection>> {
        let attempt = {
            let mut state = self.inner.lock();
            if let Some(conn) = &state.connection {
                return Ok(conn.clone());
            }
            match &state.in_flight {
                Some(attempt) => attempt.clone(),
                None => {
                    state.generation += 1;
                    let attempt = Inner::connect(Arc::downgrade(&self.inner), state.generation)
                        .boxed()
                        .shared();
                    state.in_flight = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await.map_err(Error::ConnectFailed)
    }

    /// Snapshot of the live connection, without side effects.
    pub fn peek(&self) -> Option<ConnectionStatus> {
        self.inner.lock().connection.as_ref().map(|c| c.status())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_some()
    }

    /// Forget the current connection and any attempt in flight. The old process
    /// is not signalled; the next `acquire()` spawns an independent one.
    pub fn reset(&self) {
        self.inner.discard();
        info!("store connection reset");
    }

    /// Forget the connection and terminate its process.
    pub async fn shutdown(&self) {
        if let Some(conn) = self.inner.discard() {
            info!(pid = ?conn.session.pid(), "shutting down store connection");
            conn.session.close().await;
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn discard(&self) -> Option<Arc<Connection>> {
        let mut state = self.lock();
        state.generation += 1;
        state.in_flight = None;
        state.connection.take()
    }

    /// The attempt is stored inside `Inner`, so it only holds a `Weak` back
    /// to it. Dropping the manager mid-connect drops the attempt and its process.
    async fn connect(weak: Weak<Inner>, generation: u64) -> std::result::Result<Arc<Connection>, String> {
        let (connector, source) = match weak.upgrade() {
            Some(inner) => (inner.connector.clone(), inner.config.clone()),
            None => return Err("connection manager dropped".to_string()),
        };
        let result = establish(&*connector, &*source, weak.clone(), generation).await;

        let Some(inner) = weak.upgrade() else {
            return result.map_err(|e| e.to_string());
        };
        let mut state = inner.lock();
        let current = state.generation == generation;
        match result {
            Ok(conn) => {
                if current {
                    state.connection = Some(conn.clone());
                    state.in_flight = None;
                } else {
                    debug!(generation, "connect finished after reset; not installing");
                }
                Ok(conn)
            }
            Err(e) => {
                if current {
                    state.connection = None;
                    state.in_flight = None;
                }
                warn!("store connect failed: {}", e);
                Err(e.to_string())
            }
        }
    }

    fn on_close(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(generation, "stale close ignored");
            return;
        }
        state.generation += 1;
        state.connection = None;
        state.in_flight = None;
        info!(generation, "store connection closed; next request reconnects");
    }
}

async fn establish(
    connector: &dyn Connector,
    source: &dyn ConfigSource,
    inner: Weak<Inner>,
    generation: u64,
) -> Result<Arc<Connection>> {
    let config = source.load()?;
    let diagnostics = Arc::new(Diagnostics::new());

    let hooks = TransportHooks::new(
        diagnostics.clone(),
        Arc::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.on_close(generation);
            }
        }),
    );

    let session = connector.connect(&config, hooks).await.map_err(|e| {
        diagnostics.record_error(e.to_string());
        e
    })?;

    Ok(Arc::new(Connection {
        session,
        connected_at: Utc::now(),
        diagnostics,
        generation,
    }))
}
