//! Output stream client
//!
//! One `OutputStream` per logical generation stream. Each write relays the raw
//! delta to the coordinator and stitches it into a private accumulator;
//! finalize converts the accumulator into its target shape and relays the
//! end marker followed by the full content.

use crate::bookkeeping::{timestamped, BookkeepingEntry, BookkeepingQueue};
use crate::error::StreamError;
use crate::shape::{conform, TargetShape};
use chrono::Utc;
use message_sink::{LazyConfig, LazyMessageSink, MessageSink, SinkError, SinkMetadata};
use messaging_actors::ActorRegistry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stream_config::{ResolverSettings, StreamConfig, WriteYield};
use tracing::{debug, trace, warn};
use types::{stitch, Message, MessageId, StreamId, Value, COORDINATOR_RECEIVER};

/// Relay outcome counters for one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Envelopes accepted by the sink
    pub relayed: u64,
    /// Envelopes the sink rejected
    pub failed: u64,
}

#[derive(Debug, Default)]
struct RelayCounters {
    relayed: AtomicU64,
    failed: AtomicU64,
}

impl RelayCounters {
    fn record(&self, outcome: &Result<(), SinkError>) {
        match outcome {
            Ok(()) => self.relayed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn snapshot(&self) -> RelayStats {
        RelayStats {
            relayed: self.relayed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

enum RelayTarget {
    Sink(Arc<dyn MessageSink>),
    Registry(ActorRegistry<Message>),
}

/// Builder for [`OutputStream`]
pub struct OutputStreamBuilder {
    stream_id: StreamId,
    message_id: Option<MessageId>,
    target: Option<RelayTarget>,
    coordinator_address: String,
    target_shape: Option<Arc<dyn TargetShape>>,
    bookkeeping: Option<BookkeepingQueue>,
    write_yield: WriteYield,
    resolver: ResolverSettings,
    config_error: Option<String>,
}

impl OutputStreamBuilder {
    fn new(stream_id: StreamId) -> Self {
        let defaults = StreamConfig::default();
        Self {
            stream_id,
            message_id: None,
            target: None,
            coordinator_address: defaults.coordinator_address,
            target_shape: None,
            bookkeeping: None,
            write_yield: defaults.write_yield,
            resolver: defaults.resolver,
            config_error: None,
        }
    }

    /// Relay through an already established sink
    pub fn sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.target = Some(RelayTarget::Sink(sink));
        self
    }

    /// Resolve the coordinator lazily from `registry` on first relay
    pub fn coordinator(mut self, registry: ActorRegistry<Message>) -> Self {
        self.target = Some(RelayTarget::Registry(registry));
        self
    }

    /// Registry address the coordinator is resolved under
    pub fn coordinator_address(mut self, address: impl Into<String>) -> Self {
        self.coordinator_address = address.into();
        self
    }

    pub fn target_shape<S: TargetShape + 'static>(mut self, shape: S) -> Self {
        self.target_shape = Some(Arc::new(shape));
        self
    }

    /// Share one shape definition between many streams
    pub fn shared_target_shape(mut self, shape: Arc<dyn TargetShape>) -> Self {
        self.target_shape = Some(shape);
        self
    }

    pub fn bookkeeping(mut self, queue: BookkeepingQueue) -> Self {
        self.bookkeeping = Some(queue);
        self
    }

    /// Identifier stamped on every envelope; a fresh one is generated otherwise
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    pub fn write_yield(mut self, write_yield: WriteYield) -> Self {
        self.write_yield = write_yield;
        self
    }

    /// Take address, scheduling and resolution settings from `config`
    ///
    /// An invalid config is reported by [`build`](Self::build).
    pub fn config(mut self, config: &StreamConfig) -> Self {
        self.config_error = config.validate().err().map(|e| format!("{:#}", e));
        self.coordinator_address = config.coordinator_address.clone();
        self.write_yield = config.write_yield;
        self.resolver = config.resolver.clone();
        self
    }

    pub fn build(self) -> Result<OutputStream, StreamError> {
        if let Some(reason) = self.config_error {
            return Err(StreamError::InvalidConfig(reason));
        }

        let sink: Arc<dyn MessageSink> = match self.target {
            Some(RelayTarget::Sink(sink)) => sink,
            Some(RelayTarget::Registry(registry)) => Arc::new(LazyMessageSink::coordinator(
                registry,
                self.coordinator_address.clone(),
                LazyConfig::from(&self.resolver),
            )),
            None => return Err(StreamError::MissingSink),
        };

        let stream = OutputStream {
            stream_id: self.stream_id,
            message_id: self.message_id.unwrap_or_default(),
            coordinator_address: self.coordinator_address,
            sink,
            target_shape: self.target_shape,
            bookkeeping: self.bookkeeping,
            write_yield: self.write_yield,
            accumulated: None,
            counters: RelayCounters::default(),
        };

        debug!(
            stream_id = %stream.stream_id,
            message_id = %stream.message_id,
            coordinator = %stream.coordinator_address,
            "Output stream created"
        );
        Ok(stream)
    }
}

impl fmt::Debug for OutputStreamBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStreamBuilder")
            .field("stream_id", &self.stream_id)
            .field("coordinator_address", &self.coordinator_address)
            .field("write_yield", &self.write_yield)
            .finish_non_exhaustive()
    }
}

/// Per-stream client relaying deltas to a coordinator
///
/// Writes and finalize take `&mut self`, so a single stream can never be
/// written from two tasks at once. Messages from one stream reach the
/// coordinator in call order.
pub struct OutputStream {
    stream_id: StreamId,
    message_id: MessageId,
    coordinator_address: String,
    sink: Arc<dyn MessageSink>,
    target_shape: Option<Arc<dyn TargetShape>>,
    bookkeeping: Option<BookkeepingQueue>,
    write_yield: WriteYield,
    accumulated: Option<Value>,
    counters: RelayCounters,
}

impl OutputStream {
    pub fn builder(stream_id: impl Into<StreamId>) -> OutputStreamBuilder {
        OutputStreamBuilder::new(stream_id.into())
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn coordinator_address(&self) -> &str {
        &self.coordinator_address
    }

    /// Relay one delta and stitch it into the accumulator
    ///
    /// Relay failures are logged and counted, never returned; the
    /// accumulator is updated either way.
    pub async fn write(&mut self, delta: impl Into<Value>) {
        let delta = delta.into();
        trace!(stream_id = %self.stream_id, kind = %delta.kind(), "Relaying chunk");

        let chunk = Message::chunk(
            self.message_id,
            &self.stream_id,
            COORDINATOR_RECEIVER,
            delta.clone(),
        );
        self.relay_or_log(chunk).await;

        self.accumulated = Some(match self.accumulated.take() {
            Some(accumulated) => stitch(accumulated, delta),
            None => delta,
        });

        self.pause_after_write().await;
    }

    /// Relay a caller-built envelope as is
    pub async fn write_raw(&self, message: Message) -> Result<(), SinkError> {
        self.relay(message).await
    }

    /// Current accumulated value, `None` before the first write and after
    /// finalize
    pub fn get_data(&self) -> Option<&Value> {
        self.accumulated.as_ref()
    }

    /// Produce the final output and relay it
    ///
    /// With a target shape the accumulator must convert into it; on failure
    /// nothing is relayed and the accumulator is kept. Otherwise the
    /// accumulator is cleared and the end marker is relayed before the content.
    pub async fn finalize(&mut self) -> Result<Value, StreamError> {
        let output = match &self.target_shape {
            Some(shape) => {
                let output = conform(shape.as_ref(), self.accumulated.as_ref())?;
                self.accumulated = None;
                output
            }
            None => self.accumulated.take().unwrap_or_default(),
        };

        let end = Message::stream_end(self.message_id, &self.stream_id, COORDINATOR_RECEIVER);
        self.relay_or_log(end).await;

        let content = Message::content(
            self.message_id,
            &self.stream_id,
            COORDINATOR_RECEIVER,
            output.clone(),
        );
        self.relay_or_log(content).await;

        debug!(
            stream_id = %self.stream_id,
            kind = %output.kind(),
            "Output stream finalized"
        );
        Ok(output)
    }

    /// Push a timestamped entry onto the bookkeeping queue without waiting
    pub fn bookkeep(&self, entry: impl Into<Value>) {
        let Some(queue) = &self.bookkeeping else {
            debug!(stream_id = %self.stream_id, "No bookkeeping queue; dropping entry");
            return;
        };

        let entry = BookkeepingEntry {
            stream_id: self.stream_id.clone(),
            data: timestamped(entry.into(), Utc::now()),
        };
        if queue.push(entry).is_err() {
            warn!(stream_id = %self.stream_id, "Bookkeeping consumer is gone; dropping entry");
        }
    }

    /// Report a producer-side error to the coordinator
    pub async fn error(&self, err: impl fmt::Display) {
        let message = Message::errors(
            self.message_id,
            &self.stream_id,
            COORDINATOR_RECEIVER,
            [err.to_string()],
        );
        self.relay_or_log(message).await;
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.counters.snapshot()
    }

    /// Metadata of the underlying relay sink
    pub fn sink_metadata(&self) -> SinkMetadata {
        self.sink.metadata()
    }

    async fn relay(&self, message: Message) -> Result<(), SinkError> {
        let outcome = self.sink.send(message).await;
        self.counters.record(&outcome);
        outcome
    }

    async fn relay_or_log(&self, message: Message) {
        let message_type = message.message_type;
        if let Err(e) = self.relay(message).await {
            warn!(
                stream_id = %self.stream_id,
                message_id = %self.message_id,
                message_type = %message_type,
                error = %e,
                "Relay to coordinator failed"
            );
        }
    }

    async fn pause_after_write(&self) {
        match self.write_yield {
            WriteYield::Disabled => {}
            WriteYield::YieldNow => tokio::task::yield_now().await,
            WriteYield::Sleep { micros } => {
                tokio::time::sleep(Duration::from_micros(micros)).await
            }
        }
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("stream_id", &self.stream_id)
            .field("message_id", &self.message_id)
            .field("coordinator_address", &self.coordinator_address)
            .field("sink", &self.sink)
            .field("target_shape", &self.target_shape.as_ref().map(|s| s.name()))
            .field("accumulated", &self.accumulated)
            .finish_non_exhaustive()
    }
}
