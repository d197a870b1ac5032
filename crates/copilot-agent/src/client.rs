use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::{spawn_reader, Connection, SessionRoute};
use crate::process::CopilotProcess;
use crate::session::Session;
use crate::stream::SessionEvents;
use crate::types::{ClientOptions, SessionConfig};
use crate::{CopilotAgentError, Result};

/// How long `stop` waits for the CLI to exit after stdin closes.
const STOP_GRACE: Duration = Duration::from_secs(5);

struct Running {
    process: CopilotProcess,
    conn: Arc<Connection>,
    reader: JoinHandle<()>,
}

// ─── CopilotClient ────────────────────────────────────────────────────────

/// Owns the CLI process and hands out [`Session`]s.
///
/// ```rust,ignore
/// let mut client = CopilotClient::new(ClientOptions::default());
/// client.start().await?;
/// let mut session = client.create_session(SessionConfig::default()).await?;
/// let reply = session
///     .send_and_wait(&MessageOptions::new("say hello"), Duration::from_secs(60), |_| {})
///     .await?;
/// session.destroy().await?;
/// client.stop().await?;
/// ```
pub struct CopilotClient {
    opts: ClientOptions,
    running: Option<Running>,
}

impl CopilotClient {
    pub fn new(opts: ClientOptions) -> Self {
        Self {
            opts,
            running: None,
        }
    }

    /// `true` while the CLI process is alive.
    pub fn is_running(&mut self) -> bool {
        match self.running.as_mut() {
            Some(r) => !r.process.has_exited(),
            None => false,
        }
    }

    /// Spawn the CLI and confirm it answers a `ping`. No-op if already started.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        let mut process = CopilotProcess::spawn(&self.opts)?;
        let stdin = process
            .take_stdin()
            .ok_or_else(|| CopilotAgentError::Process("stdin not captured".into()))?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| CopilotAgentError::Process("stdout not captured".into()))?;
        let conn = Arc::new(Connection::new(stdin));
        let reader = spawn_reader(Arc::clone(&conn), stdout);
        self.running = Some(Running {
            process,
            conn,
            reader,
        });

        if let Err(e) = self.ping().await {
            let _ = self.force_stop().await;
            return Err(e);
        }
        tracing::info!("copilot CLI started");
        Ok(())
    }

    /// Round-trip a `ping`, bounded by `startup_timeout`.
    pub async fn ping(&self) -> Result<()> {
        let request = self
            .connection()?
            .request("ping", json!({ "message": "copilot-delegate" }));
        self.bounded(request).await.map(|_| ())
    }

    /// Close stdin and wait for the CLI to exit, killing it after a grace period.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        running.conn.close_stdin().await;
        let result = running.process.shutdown(STOP_GRACE).await;
        running.reader.abort();
        running.conn.fail_all();
        tracing::info!("copilot CLI stopped");
        result
    }

    /// Kill the CLI immediately.
    pub async fn force_stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        let result = running.process.kill().await;
        running.conn.close_stdin().await;
        running.reader.abort();
        running.conn.fail_all();
        tracing::warn!("copilot CLI force-stopped");
        result
    }

    /// Create a session, starting or restarting the CLI as the options allow.
    pub async fn create_session(&mut self, config: SessionConfig) -> Result<Session> {
        self.ensure_running().await?;
        let conn = Arc::clone(self.connection()?);

        let request = conn.request(
            "session.create",
            json!({ "model": config.model, "streaming": config.streaming }),
        );
        let result = self.bounded(request).await?;
        let session_id = result
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| CopilotAgentError::Process("session.create returned no sessionId".into()))?
            .to_owned();

        let (tx, rx) = mpsc::unbounded_channel();
        conn.register(
            &session_id,
            SessionRoute {
                events: tx,
                permission_handler: config.permission_handler,
            },
        );
        tracing::debug!(session = %session_id, "session created");
        Ok(Session::new(session_id, conn, SessionEvents::new(rx)))
    }

    async fn bounded(&self, request: impl Future<Output = Result<Value>>) -> Result<Value> {
        let limit = self.opts.startup_timeout;
        tokio::time::timeout(limit, request)
            .await
            .unwrap_or(Err(CopilotAgentError::Timeout(limit)))
    }

    async fn ensure_running(&mut self) -> Result<()> {
        let exited = self.running.as_mut().map(|r| r.process.has_exited());
        match exited {
            Some(false) => Ok(()),
            Some(true) if self.opts.auto_restart => {
                tracing::warn!(stderr = %self.last_stderr(), "copilot CLI exited, restarting");
                if let Err(e) = self.force_stop().await {
                    tracing::debug!(error = %e, "cleanup of exited CLI failed");
                }
                self.start().await
            }
            Some(true) => Err(CopilotAgentError::Process(format!(
                "copilot CLI has exited\nstderr: {}",
                self.last_stderr()
            ))),
            None if self.opts.auto_start => self.start().await,
            None => Err(CopilotAgentError::Process("client not started".into())),
        }
    }

    fn connection(&self) -> Result<&Arc<Connection>> {
        self.running
            .as_ref()
            .map(|r| &r.conn)
            .ok_or_else(|| CopilotAgentError::Process("client not started".into()))
    }

    fn last_stderr(&self) -> String {
        self.running
            .as_ref()
            .map(|r| r.process.stderr())
            .unwrap_or_default()
    }
}
