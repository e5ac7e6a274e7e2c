use crate::{ConnectionState, Message, MessageSink, SinkError, SinkMetadata};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use types::MessageType;

/// A sink that records every message it accepts, in order
#[derive(Debug)]
pub struct CollectorSink {
    messages: Mutex<Vec<Message>>,
    connected: AtomicBool,
    fail_on_send: AtomicBool,
    always_fail: AtomicBool,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    name: String,
}

impl CollectorSink {
    /// Create a connected collector
    pub fn new() -> Self {
        Self::with_name("test-collector")
    }

    /// Create a connected collector with a name
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_on_send: AtomicBool::new(false),
            always_fail: AtomicBool::new(false),
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            name: name.into(),
        }
    }

    /// Get all received messages
    pub fn received_messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Received messages of one kind, in arrival order
    pub fn messages_of_type(&self, message_type: MessageType) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.message_type == message_type)
            .cloned()
            .collect()
    }

    /// Kinds of all received messages, in arrival order
    pub fn message_types(&self) -> Vec<MessageType> {
        self.messages.lock().iter().map(|m| m.message_type).collect()
    }

    /// Get the count of received messages
    pub fn message_count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Clear all received messages
    pub fn clear_messages(&self) {
        self.messages.lock().clear();
    }

    /// Configure to fail on next send
    pub fn fail_next_send(&self) {
        self.fail_on_send.store(true, Ordering::Relaxed);
    }

    /// Fail every send until switched off again
    pub fn set_failing(&self, failing: bool) {
        self.always_fail.store(failing, Ordering::Relaxed);
    }

    /// Force connect state (for testing)
    pub fn force_connect(&self) {
        self.connected.store(true, Ordering::Relaxed);
    }

    /// Force disconnect state; sends fail with a connection loss
    pub fn force_disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    fn reject(&self, err: SinkError) -> Result<(), SinkError> {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
        Err(err)
    }
}

impl Default for CollectorSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for CollectorSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        if !self.is_connected() {
            return self.reject(SinkError::connection_lost(format!(
                "{} is disconnected",
                self.name
            )));
        }

        if self.fail_on_send.swap(false, Ordering::Relaxed)
            || self.always_fail.load(Ordering::Relaxed)
        {
            return self.reject(SinkError::send_failed(format!(
                "{} configured to fail",
                self.name
            )));
        }

        self.messages.lock().push(message);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn metadata(&self) -> SinkMetadata {
        let state = if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        SinkMetadata::new(&self.name, "collector")
            .with_state(state)
            .with_counts(
                self.messages_sent.load(Ordering::Relaxed),
                self.messages_failed.load(Ordering::Relaxed),
            )
    }
}
