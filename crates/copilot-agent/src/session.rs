use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};

use crate::connection::Connection;
use crate::stream::SessionEvents;
use crate::types::{MessageOptions, SessionEvent};
use crate::{CopilotAgentError, Result};

// ─── Session ──────────────────────────────────────────────────────────────

/// A conversation with the assistant, created by
/// [`CopilotClient::create_session`](crate::CopilotClient::create_session).
///
/// Lifecycle: created → (send → await idle) × N → [`destroy`](Self::destroy).
pub struct Session {
    id: String,
    conn: Arc<Connection>,
    events: SessionEvents,
}

impl Session {
    pub(crate) fn new(id: String, conn: Arc<Connection>, events: SessionEvents) -> Self {
        Self { id, conn, events }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw event stream, for callers that drive the session themselves.
    pub fn events(&mut self) -> &mut SessionEvents {
        &mut self.events
    }

    /// Queue a message. Returns the message id if the CLI reports one.
    pub async fn send(&self, options: &MessageOptions) -> Result<Option<String>> {
        let mut params = serde_json::to_value(options).map_err(|e| {
            CopilotAgentError::Process(format!("failed to serialize message options: {e}"))
        })?;
        if let Value::Object(map) = &mut params {
            map.insert("sessionId".into(), Value::String(self.id.clone()));
        }
        let result = self.conn.request("session.send", params).await?;
        Ok(result
            .get("messageId")
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    /// Send a message and consume events until the session goes idle.
    ///
    /// Every event is passed to `on_event` before it is interpreted. Returns
    /// the content of the last `assistant.message`, if any. A
    /// `session.error` event fails the call, as does exceeding `timeout`.
    pub async fn send_and_wait<F>(
        &mut self,
        options: &MessageOptions,
        timeout: Duration,
        mut on_event: F,
    ) -> Result<Option<String>>
    where
        F: FnMut(&SessionEvent),
    {
        let turn = async {
            self.send(options).await?;
            let mut last_message = None;
            while let Some(event) = self.events.next().await {
                on_event(&event);
                match event {
                    SessionEvent::AssistantMessage { data } => last_message = Some(data.content),
                    SessionEvent::SessionIdle => return Ok(last_message),
                    SessionEvent::SessionError { data } => {
                        return Err(CopilotAgentError::Session(data.message))
                    }
                    _ => {}
                }
            }
            Err(CopilotAgentError::Process(
                "event stream closed before the session became idle".into(),
            ))
        };

        tokio::time::timeout(timeout, turn)
            .await
            .unwrap_or(Err(CopilotAgentError::Timeout(timeout)))
    }

    /// End the session on the CLI side.
    pub async fn destroy(self) -> Result<()> {
        self.conn.unregister(&self.id);
        self.conn
            .request("session.destroy", json!({ "sessionId": self.id }))
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}
