use std::time::Duration;

use crate::client::CopilotClient;
use crate::types::{MessageOptions, SessionConfig, SessionEvent};
use crate::{CopilotAgentError, Result};

/// Default bound on a single `send_and_wait` turn.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

// ─── RunConfig ────────────────────────────────────────────────────────────

/// Configuration for a single one-shot assistant run.
#[derive(Debug)]
pub struct RunConfig {
    pub session: SessionConfig,
    pub message: MessageOptions,
    pub timeout: Duration,
}

// ─── RunResult ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RunResult {
    pub session_id: String,
    /// Content of the last `assistant.message`, if the assistant replied.
    pub reply: Option<String>,
    pub tool_calls: u32,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Drive one message through a fresh session, then shut the client down.
///
/// Success path: start → create session → send and wait → destroy → stop.
/// The session is destroyed even when the wait fails. On any error the
/// client is force-stopped before the original error is returned; a failing
/// force-stop is only logged.
pub async fn run<F>(
    client: &mut CopilotClient,
    config: RunConfig,
    on_event: F,
) -> Result<RunResult>
where
    F: FnMut(&SessionEvent),
{
    match drive(client, config, on_event).await {
        Ok(result) => Ok(result),
        Err(e) => {
            tracing::error!(error = %e, "copilot run failed, forcing client stop");
            if let Err(stop_err) = client.force_stop().await {
                tracing::warn!(error = %stop_err, "force stop failed");
            }
            Err(e)
        }
    }
}

// ─── Internal ─────────────────────────────────────────────────────────────

async fn drive<F>(
    client: &mut CopilotClient,
    config: RunConfig,
    mut on_event: F,
) -> Result<RunResult>
where
    F: FnMut(&SessionEvent),
{
    client.start().await?;
    let mut session = client.create_session(config.session).await?;
    let session_id = session.id().to_owned();

    let mut tool_calls = 0u32;
    let waited = session
        .send_and_wait(&config.message, config.timeout, |event| {
            if matches!(event, SessionEvent::ToolExecutionStart { .. }) {
                tool_calls += 1;
            }
            on_event(event);
        })
        .await;
    let destroyed = tokio::time::timeout(CLEANUP_TIMEOUT, session.destroy())
        .await
        .unwrap_or(Err(CopilotAgentError::Timeout(CLEANUP_TIMEOUT)));

    let reply = waited?;
    destroyed?;
    client.stop().await?;

    Ok(RunResult {
        session_id,
        reply,
        tool_calls,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────
