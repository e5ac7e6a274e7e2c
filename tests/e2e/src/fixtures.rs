//! Test fixtures: a coordinator actor that records everything it receives

use anyhow::Result;
use async_trait::async_trait;
use messaging_actors::{ActorBehavior, ActorRef, ActorRegistry, ActorSystem};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use types::{Message, MessageType};

/// Shared, append-only view of what a [`RecordingCoordinator`] received
#[derive(Debug, Clone, Default)]
pub struct CoordinatorLog {
    messages: Arc<Mutex<Vec<Message>>>,
    updated: Arc<Notify>,
}

impl CoordinatorLog {
    fn push(&self, message: Message) {
        self.messages.lock().push(message);
        self.updated.notify_waiters();
    }

    /// Everything received so far, in mailbox order
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn from_sender(&self, sender: &str) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.sender == sender)
            .cloned()
            .collect()
    }

    pub fn kinds_from(&self, sender: &str) -> Vec<MessageType> {
        self.from_sender(sender)
            .iter()
            .map(|m| m.message_type)
            .collect()
    }

    pub fn count_of(&self, message_type: MessageType) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.message_type == message_type)
            .count()
    }

    /// Wait until `done` holds for the received messages
    ///
    /// Returns false if it still does not hold after `limit`.
    pub async fn wait_until<F>(&self, limit: Duration, done: F) -> bool
    where
        F: Fn(&[Message]) -> bool,
    {
        let wait = async {
            loop {
                let updated = self.updated.notified();
                if done(self.messages.lock().as_slice()) {
                    return;
                }
                updated.await;
            }
        };
        tokio::time::timeout(limit, wait).await.is_ok()
    }

    /// Wait until `streams` final content envelopes have arrived
    pub async fn wait_for_content(&self, streams: usize, limit: Duration) -> bool {
        self.wait_until(limit, |messages| {
            messages
                .iter()
                .filter(|m| m.message_type == MessageType::Content)
                .count()
                >= streams
        })
        .await
    }
}

/// Coordinator actor that only records
#[derive(Debug)]
pub struct RecordingCoordinator {
    log: CoordinatorLog,
}

impl RecordingCoordinator {
    pub fn new(log: CoordinatorLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl ActorBehavior for RecordingCoordinator {
    type Message = Message;

    async fn handle(&mut self, msg: Message) -> messaging_actors::Result<()> {
        tracing::trace!(sender = %msg.sender, kind = %msg.message_type, "Coordinator received");
        self.log.push(msg);
        Ok(())
    }
}

/// Spawn a recording coordinator bound to `address`
pub async fn start_coordinator(
    system: &ActorSystem,
    registry: &ActorRegistry<Message>,
    address: &str,
) -> Result<(ActorRef<Message>, CoordinatorLog)> {
    let log = CoordinatorLog::default();
    let actor = system
        .spawn_named(registry, address, RecordingCoordinator::new(log.clone()))
        .await?;
    Ok((actor, log))
}

/// Route `tracing` output through the test harness; safe to call repeatedly
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
