use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::types::SessionEvent;

// ─── SessionEvents ────────────────────────────────────────────────────────

/// An async stream of [`SessionEvent`]s for one session.
///
/// Backed by an unbounded Tokio channel fed by the connection's reader task.
/// The stream ends when the CLI process exits or the client is stopped.
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// while let Some(event) = session.events().next().await {
///     println!("{}", event.kind());
/// }
/// ```
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { rx }
    }
}

impl Stream for SessionEvents {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssistantMessage;
    use futures::StreamExt;

    #[tokio::test]
    async fn stream_yields_events_until_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::AssistantMessage {
            data: AssistantMessage {
                message_id: None,
                content: "hi".into(),
            },
        })
        .unwrap();
        tx.send(SessionEvent::SessionIdle).unwrap();
        drop(tx);

        let events: Vec<_> = SessionEvents::new(rx).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], SessionEvent::SessionIdle));
    }
}
