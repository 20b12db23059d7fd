//! Event subscriber port
//!
//! Live per-coordination-id subscriptions to the coordination event stream.
//! One physical connection is shared by every subscriber in the process;
//! membership is the only per-subscription state.

use crate::retry::Retryable;
use async_trait::async_trait;
use conclave_domain::{CoordinationId, WorkflowEvent};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur on the event stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event stream connection failed: {0}")]
    Connect(String),

    #[error("Failed to send control frame: {0}")]
    Send(String),

    #[error("Event stream disconnected")]
    Disconnected,

    #[error("Event hub is shut down")]
    Closed,
}

impl Retryable for EventError {
    fn is_retryable(&self) -> bool {
        matches!(self, EventError::Connect(_) | EventError::Send(_))
    }
}

/// Stream of decoded events for one coordination id.
///
/// Ends when the subscription is replaced, dropped by `unsubscribe`, or the
/// connection is lost for good.
pub struct EventStream {
    coordination_id: CoordinationId,
    receiver: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl EventStream {
    pub fn new(
        coordination_id: CoordinationId,
        receiver: mpsc::UnboundedReceiver<WorkflowEvent>,
    ) -> Self {
        Self {
            coordination_id,
            receiver,
        }
    }

    pub fn coordination_id(&self) -> &CoordinationId {
        &self.coordination_id
    }

    /// Receive the next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<WorkflowEvent> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = WorkflowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Subscription surface of the coordination event stream.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Join `coordination_id` and return its event stream.
    ///
    /// Subscribing an id that already has a stream replaces it.
    async fn subscribe(&self, coordination_id: &CoordinationId) -> Result<EventStream, EventError>;

    /// Leave `coordination_id`. Unknown ids are a no-op.
    async fn unsubscribe(&self, coordination_id: &CoordinationId) -> Result<(), EventError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::Agent;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_yields_until_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(CoordinationId::new("c1"), rx);

        tx.send(WorkflowEvent::AgentUpdated(Agent::new("a1", "c1", "coder", "api")))
            .unwrap();
        drop(tx);

        let first = stream.next().await;
        assert!(matches!(first, Some(WorkflowEvent::AgentUpdated(_))));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.coordination_id().as_str(), "c1");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(EventError::Connect("refused".to_string()).is_retryable());
        assert!(!EventError::Closed.is_retryable());
        assert!(!EventError::Disconnected.is_retryable());
    }
}
