//! Sink delivering envelopes into an actor mailbox

use crate::{ConnectionState, Message, MessageSink, SinkError, SinkMetadata};
use async_trait::async_trait;
use messaging_actors::ActorRef;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Relays messages to one actor by enqueueing them in its mailbox
///
/// Sending never waits on the actor. A stopped actor surfaces as
/// [`SinkError::ConnectionLost`].
pub struct ActorSink {
    address: String,
    actor: ActorRef<Message>,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ActorSink {
    pub fn new(address: impl Into<String>, actor: ActorRef<Message>) -> Self {
        Self {
            address: address.into(),
            actor,
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Address the actor was resolved from
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn actor(&self) -> &ActorRef<Message> {
        &self.actor
    }
}

impl fmt::Debug for ActorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSink")
            .field("address", &self.address)
            .field("actor", self.actor.id())
            .finish()
    }
}

#[async_trait]
impl MessageSink for ActorSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        match self.actor.send(message) {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.messages_failed.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(e.to_string());
                tracing::debug!(address = %self.address, error = %e, "Actor mailbox rejected message");
                Err(e.into())
            }
        }
    }

    fn is_connected(&self) -> bool {
        !self.actor.is_closed()
    }

    fn metadata(&self) -> SinkMetadata {
        let state = if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Failed
        };
        SinkMetadata::new(format!("actor-{}", self.address), "actor")
            .with_endpoint(self.actor.id().to_string())
            .with_state(state)
            .with_counts(
                self.messages_sent.load(Ordering::Relaxed),
                self.messages_failed.load(Ordering::Relaxed),
            )
            .with_last_error(self.last_error.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging_actors::{ActorId, Mailbox};
    use types::{MessageId, MessageType, StreamId, COORDINATOR_RECEIVER};

    #[tokio::test]
    async fn test_send_enqueues_in_order() {
        let (mailbox, mut receiver) = Mailbox::new();
        let sink = ActorSink::new("coordinator", ActorRef::new(ActorId::new(), mailbox));
        let stream = StreamId::new("s-1");

        sink.send(Message::stream_end(MessageId::new(), &stream, COORDINATOR_RECEIVER))
            .await
            .unwrap();
        sink.send(Message::content(MessageId::new(), &stream, COORDINATOR_RECEIVER, "done".into()))
            .await
            .unwrap();

        assert_eq!(
            receiver.recv().await.map(|m| m.message_type),
            Some(MessageType::ContentStreamEnd)
        );
        assert_eq!(
            receiver.recv().await.map(|m| m.message_type),
            Some(MessageType::Content)
        );
        assert!(sink.is_connected());
        assert_eq!(sink.metadata().messages_sent, 2);
    }

    #[tokio::test]
    async fn test_stopped_actor_is_connection_lost() {
        let (mailbox, receiver) = Mailbox::new();
        let sink = ActorSink::new("coordinator", ActorRef::new(ActorId::new(), mailbox));
        drop(receiver);

        let err = sink
            .send(Message::stream_end(MessageId::new(), &StreamId::new("s"), COORDINATOR_RECEIVER))
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::ConnectionLost(_)));
        assert!(!sink.is_connected());
        let metadata = sink.metadata();
        assert_eq!(metadata.state, ConnectionState::Failed);
        assert_eq!(metadata.messages_failed, 1);
        assert!(metadata.last_error.is_some());
    }
}
