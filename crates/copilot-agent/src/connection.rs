use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::framing::{write_message, MessageReader};
use crate::permission::{self, PermissionHandler};
use crate::types::{
    Incoming, PermissionRequestParams, RpcError, RpcRequest, SessionEvent, SessionEventParams,
};
use crate::{CopilotAgentError, Result};

type Reply = std::result::Result<Value, RpcError>;

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Where events and permission requests for one session are delivered.
pub(crate) struct SessionRoute {
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub permission_handler: Option<PermissionHandler>,
}

// ─── Connection ───────────────────────────────────────────────────────────

/// JSON-RPC multiplexer over the CLI's stdio.
///
/// Writers share stdin through an async mutex. A single reader task owns
/// stdout and routes each message: responses to the waiting request, session
/// events to the session's channel, permission requests to the session's
/// handler.
pub(crate) struct Connection {
    writer: tokio::sync::Mutex<Option<ChildStdin>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    routes: Mutex<HashMap<String, SessionRoute>>,
    next_id: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Connection {
    pub(crate) fn new(stdin: ChildStdin) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(Some(stdin)),
            pending: Mutex::new(HashMap::new()),
            routes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send a request and wait for its response.
    pub(crate) async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        tracing::debug!(id, method, "copilot rpc request");
        if let Err(e) = self.write(&RpcRequest::new(id, method, params)).await {
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(CopilotAgentError::Rpc {
                method: method.to_string(),
                code: e.code,
                message: e.message,
            }),
            Err(_) => Err(CopilotAgentError::Process(format!(
                "connection closed before '{method}' returned"
            ))),
        }
    }

    pub(crate) fn register(&self, session_id: &str, route: SessionRoute) {
        lock(&self.routes).insert(session_id.to_string(), route);
    }

    pub(crate) fn unregister(&self, session_id: &str) {
        lock(&self.routes).remove(session_id);
    }

    /// Close stdin so the CLI sees EOF.
    pub(crate) async fn close_stdin(&self) {
        self.writer.lock().await.take();
    }

    /// Drop every pending request and session channel.
    ///
    /// Waiters observe a closed channel and turn it into an error.
    pub(crate) fn fail_all(&self) {
        lock(&self.pending).clear();
        lock(&self.routes).clear();
    }

    async fn write(&self, msg: &impl serde::Serialize) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| CopilotAgentError::Process("stdin already closed".into()))?;
        write_message(stdin, msg).await
    }

    async fn respond(&self, id: Value, reply: Reply) {
        let msg = match reply {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
        };
        if let Err(e) = self.write(&msg).await {
            tracing::warn!(error = %e, "failed to answer copilot CLI request");
        }
    }

    async fn dispatch(&self, body: &str) {
        let incoming = match serde_json::from_str::<Incoming>(body) {
            Ok(m) => m,
            Err(source) => {
                let err = CopilotAgentError::Parse {
                    body: body.to_owned(),
                    source,
                };
                tracing::warn!(error = %err, "skipping unreadable message from copilot CLI");
                return;
            }
        };

        match incoming {
            Incoming::Response { id, result, error } => {
                let Some(tx) = lock(&self.pending).remove(&id) else {
                    tracing::debug!(id, "response for unknown request id");
                    return;
                };
                let reply = match error {
                    Some(e) => Err(e),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(reply);
            }
            Incoming::Notification { method, params } => self.on_notification(&method, params),
            Incoming::Request { id, method, params } => {
                let reply = self.on_request(&method, params);
                self.respond(id, reply).await;
            }
        }
    }

    fn on_notification(&self, method: &str, params: Value) {
        if method != "session.event" {
            tracing::debug!(method, "ignoring copilot notification");
            return;
        }
        let params = match serde_json::from_value::<SessionEventParams>(params) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "malformed session.event notification");
                return;
            }
        };
        let routes = lock(&self.routes);
        match routes.get(&params.session_id) {
            // A dropped receiver just means nobody is listening anymore.
            Some(route) => {
                let _ = route.events.send(params.event);
            }
            None => tracing::debug!(session = %params.session_id, "event for unknown session"),
        }
    }

    fn on_request(&self, method: &str, params: Value) -> Reply {
        if method != "permission.request" {
            return Err(RpcError {
                code: METHOD_NOT_FOUND,
                message: format!("unsupported method: {method}"),
                data: None,
            });
        }
        let params = serde_json::from_value::<PermissionRequestParams>(params).map_err(|e| {
            RpcError {
                code: INVALID_PARAMS,
                message: e.to_string(),
                data: None,
            }
        })?;
        let handler = lock(&self.routes)
            .get(&params.session_id)
            .and_then(|r| r.permission_handler.clone());
        let decision = permission::decide(handler.as_ref(), &params.permission_request);
        tracing::info!(
            session = %params.session_id,
            kind = ?params.permission_request.kind,
            decision = ?decision,
            "permission request"
        );
        Ok(json!({ "result": decision }))
    }
}

/// Spawn the task that owns stdout for the lifetime of the process.
pub(crate) fn spawn_reader(
    conn: std::sync::Arc<Connection>,
    mut reader: MessageReader<BufReader<ChildStdout>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match reader.next_message().await {
                Ok(Some(body)) => conn.dispatch(&body).await,
                Ok(None) => {
                    tracing::debug!("copilot CLI closed stdout");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read copilot CLI stdout");
                    break;
                }
            }
        }
        conn.fail_all();
    })
}
