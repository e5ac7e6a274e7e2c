//! Lazy Connection Wrapper for MessageSink
//!
//! Implements the "wake on data" pattern: the inner sink is created only when
//! the first message needs to go out. Stream clients can therefore be built
//! before their coordinator exists, as long as it is registered by the time
//! they start relaying.
//!
//! ## Behavior
//!
//! - **Lazy**: the factory runs on the first `send()`, never during construction
//! - **Cached**: once resolved, later sends reuse the same inner sink
//! - **Single flight**: concurrent first sends resolve once
//! - **Retry**: failed resolutions back off exponentially up to `max_retries`
//! - **Not sticky on failure**: a failed resolution is reported and the next
//!   send tries again
//! - **Auto-reconnect**: a connection loss on the cached sink drops it,
//!   resolves again and retries the send once
//!
//! ## Usage
//!
//! ```rust
//! use message_sink::{LazyConfig, LazyMessageSink, MessageSink};
//! use message_sink::test_utils::CollectorSink;
//! use types::{Message, MessageId, StreamId, COORDINATOR_RECEIVER};
//!
//! # tokio_test::block_on(async {
//! let lazy = LazyMessageSink::new(|| async { Ok(CollectorSink::new()) }, LazyConfig::default());
//!
//! // Resolution happens here, not during construction
//! let end = Message::stream_end(MessageId::new(), &StreamId::new("s"), COORDINATOR_RECEIVER);
//! lazy.send(end).await?;
//! # Ok::<(), message_sink::SinkError>(())
//! # }).unwrap();
//! ```

use crate::{ActorSink, ConnectionState, Message, MessageSink, SinkError, SinkMetadata};
use async_trait::async_trait;
use messaging_actors::ActorRegistry;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_config::ResolverSettings;
use tokio::sync::{Mutex, RwLock};

/// Type alias for boxed async factory functions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type SinkFactory<S> = Arc<dyn Fn() -> BoxFuture<'static, Result<S, SinkError>> + Send + Sync>;

/// Connection states for lazy sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyConnectionState {
    /// Not connected yet (initial state)
    Disconnected,
    /// Currently attempting to connect
    Connecting,
    /// Successfully connected
    Connected,
    /// Last connection attempt failed
    Failed,
}

/// Configuration for lazy connection behavior
#[derive(Debug, Clone)]
pub struct LazyConfig {
    /// Extra connection attempts after the first one fails
    pub max_retries: u32,

    /// Initial delay between retry attempts
    pub retry_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Maximum retry delay cap
    pub max_retry_delay: Duration,

    /// Whether to reconnect on connection loss
    pub auto_reconnect: bool,

    /// Connection timeout per attempt
    pub connect_timeout: Duration,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self::from(&ResolverSettings::default())
    }
}

impl From<&ResolverSettings> for LazyConfig {
    fn from(settings: &ResolverSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            backoff_multiplier: settings.backoff_multiplier,
            max_retry_delay: settings.max_retry_delay(),
            auto_reconnect: settings.auto_reconnect,
            connect_timeout: settings.connect_timeout(),
        }
    }
}

impl LazyConfig {
    /// Single attempt, no reconnection
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            auto_reconnect: false,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    ///
    /// Never shorter than `retry_delay` nor longer than `max_retry_delay`;
    /// a multiplier below 1.0 (or NaN) is treated as 1.0.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let delay = self.retry_delay.as_secs_f64() * factor;
        Duration::try_from_secs_f64(delay.min(self.max_retry_delay.as_secs_f64()))
            .unwrap_or(self.max_retry_delay)
    }
}

/// Metrics for monitoring lazy connection behavior
#[derive(Debug, Default)]
pub struct LazyMetrics {
    /// Total connection attempts
    pub connection_attempts: AtomicU64,
    /// Successful connections
    pub successful_connects: AtomicU64,
    /// Resolutions that gave up after all retries
    pub failed_connects: AtomicU64,
    /// Messages sent successfully
    pub messages_sent: AtomicU64,
    /// Messages that failed to send
    pub messages_failed: AtomicU64,
    /// Times a caller found the connection already made by another caller
    pub connection_waits: AtomicU64,
    /// Automatic reconnection attempts
    pub reconnection_attempts: AtomicU64,
}

impl LazyMetrics {
    /// Get connection success rate
    pub fn connection_success_rate(&self) -> f64 {
        let total = self.connection_attempts.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        let successful = self.successful_connects.load(Ordering::Relaxed);
        successful as f64 / total as f64
    }

    /// Get message success rate
    pub fn message_success_rate(&self) -> f64 {
        let sent = self.messages_sent.load(Ordering::Relaxed);
        let failed = self.messages_failed.load(Ordering::Relaxed);
        let total = sent + failed;
        if total == 0 {
            return 1.0;
        }
        sent as f64 / total as f64
    }
}

/// Internal state tracking for the lazy sink
#[derive(Debug)]
struct LazyState {
    state: LazyConnectionState,
    connection_established_at: Option<Instant>,
    last_error: Option<String>,
}

impl LazyState {
    fn new() -> Self {
        Self {
            state: LazyConnectionState::Disconnected,
            connection_established_at: None,
            last_error: None,
        }
    }

    fn transition_to(&mut self, new_state: LazyConnectionState) {
        if self.state != new_state {
            tracing::debug!(
                "Lazy connection state transition: {:?} -> {:?}",
                self.state,
                new_state
            );
            self.state = new_state;

            match new_state {
                LazyConnectionState::Connected => {
                    self.connection_established_at = Some(Instant::now());
                    self.last_error = None;
                }
                LazyConnectionState::Disconnected | LazyConnectionState::Failed => {
                    self.connection_established_at = None;
                }
                LazyConnectionState::Connecting => {}
            }
        }
    }
}

/// A sink that lazily establishes its inner sink on first use
pub struct LazyMessageSink<S: MessageSink> {
    /// The actual sink (None until connected)
    inner: RwLock<Option<Arc<S>>>,

    /// Factory function to create the sink
    factory: SinkFactory<S>,

    /// Configuration for lazy behavior
    config: LazyConfig,

    /// Connection state tracking
    state: RwLock<LazyState>,

    /// Metrics for monitoring
    metrics: Arc<LazyMetrics>,

    /// Ensures only one caller attempts connection at a time
    connection_mutex: Mutex<()>,

    /// Name for debugging and metrics
    name: String,

    /// Cached connection state for synchronous checks
    cached_connected: AtomicBool,
}

impl<S: MessageSink> Debug for LazyMessageSink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyMessageSink")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LazyMessageSink<ActorSink> {
    /// Sink resolving the coordinator bound to `address` in `registry`
    ///
    /// The registry is queried on the first send; an unknown address or a
    /// stopped actor fails that send with [`SinkError::ConnectionFailed`].
    pub fn coordinator(
        registry: ActorRegistry<Message>,
        address: impl Into<String>,
        config: LazyConfig,
    ) -> Self {
        let address = address.into();
        let name = format!("coordinator@{}", address);

        let factory = move || {
            let registry = registry.clone();
            let address = address.clone();
            async move {
                let actor = registry.lookup(&address).await?;
                if actor.is_closed() {
                    return Err(SinkError::connection_failed(format!(
                        "coordinator at '{}' has stopped",
                        address
                    )));
                }
                Ok(ActorSink::new(address, actor))
            }
        };

        Self::with_name(factory, config, name)
    }
}

impl<S: MessageSink> LazyMessageSink<S> {
    /// Create new lazy sink with factory function
    pub fn new<F, Fut>(factory: F, config: LazyConfig) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, SinkError>> + Send + 'static,
    {
        Self {
            inner: RwLock::new(None),
            factory: Arc::new(move || Box::pin(factory())),
            config,
            state: RwLock::new(LazyState::new()),
            metrics: Arc::new(LazyMetrics::default()),
            connection_mutex: Mutex::new(()),
            name: "lazy-sink".to_string(),
            cached_connected: AtomicBool::new(false),
        }
    }

    /// Create new lazy sink with a name for debugging
    pub fn with_name<F, Fut>(factory: F, config: LazyConfig, name: impl Into<String>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, SinkError>> + Send + 'static,
    {
        let mut sink = Self::new(factory, config);
        sink.name = name.into();
        sink
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LazyConfig {
        &self.config
    }

    /// Get current lazy connection metrics
    pub fn lazy_metrics(&self) -> &LazyMetrics {
        &self.metrics
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> LazyConnectionState {
        self.state.read().await.state
    }

    /// Get time since connection was established
    pub async fn connection_uptime(&self) -> Option<Duration> {
        let state = self.state.read().await;
        state.connection_established_at.map(|t| t.elapsed())
    }

    /// Resolve the inner sink now instead of on the first send
    pub async fn connect(&self) -> Result<(), SinkError> {
        self.ensure_connected().await.map(|_| ())
    }

    /// Drop the cached inner sink; the next send resolves again
    pub async fn force_disconnect(&self) {
        let _guard = self.connection_mutex.lock().await;
        self.inner.write().await.take();
        self.state
            .write()
            .await
            .transition_to(LazyConnectionState::Disconnected);
        self.cached_connected.store(false, Ordering::Relaxed);
        tracing::info!("Lazy sink '{}' forcefully disconnected", self.name);
    }

    /// Ensure connection is established, returning the cached inner sink
    async fn ensure_connected(&self) -> Result<Arc<S>, SinkError> {
        // Fast path: already connected
        if let Some(sink) = self.inner.read().await.as_ref() {
            return Ok(Arc::clone(sink));
        }

        // Slow path: need to connect
        let _guard = self.connection_mutex.lock().await;

        // Double-check under mutex
        if let Some(sink) = self.inner.read().await.as_ref() {
            self.metrics.connection_waits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(sink));
        }

        self.state
            .write()
            .await
            .transition_to(LazyConnectionState::Connecting);
        tracing::debug!("Lazy sink '{}' attempting connection", self.name);

        match self.connect_with_retries().await {
            Ok(sink) => {
                let sink = Arc::new(sink);
                *self.inner.write().await = Some(Arc::clone(&sink));
                self.state
                    .write()
                    .await
                    .transition_to(LazyConnectionState::Connected);
                self.cached_connected.store(true, Ordering::Relaxed);

                self.metrics
                    .successful_connects
                    .fetch_add(1, Ordering::Relaxed);
                tracing::info!("Lazy sink '{}' connected successfully", self.name);
                Ok(sink)
            }
            Err(e) => {
                {
                    let mut state = self.state.write().await;
                    state.transition_to(LazyConnectionState::Failed);
                    state.last_error = Some(e.to_string());
                }
                self.cached_connected.store(false, Ordering::Relaxed);

                self.metrics.failed_connects.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Lazy sink '{}' connection failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Attempt connection with retry logic and exponential backoff
    ///
    /// Whatever the last attempt failed with, the caller sees a
    /// [`SinkError::ConnectionFailed`].
    async fn connect_with_retries(&self) -> Result<S, SinkError> {
        let attempts = self.config.max_retries + 1;
        let mut last_error = SinkError::connection_failed("no connection attempt made");

        for attempt in 0..attempts {
            self.metrics
                .connection_attempts
                .fetch_add(1, Ordering::Relaxed);

            tracing::debug!(
                "Lazy sink '{}' connection attempt {}/{}",
                self.name,
                attempt + 1,
                attempts
            );

            last_error = match tokio::time::timeout(self.config.connect_timeout, (self.factory)()).await
            {
                Ok(Ok(sink)) => {
                    tracing::debug!(
                        "Lazy sink '{}' connected on attempt {}",
                        self.name,
                        attempt + 1
                    );
                    return Ok(sink);
                }
                Ok(Err(e)) => e,
                Err(_) => SinkError::Timeout(self.config.connect_timeout),
            };

            if attempt + 1 < attempts {
                let delay = self.config.backoff_delay(attempt);
                tracing::warn!(
                    "Lazy sink '{}' connection attempt {} failed: {}, retrying in {:?}",
                    self.name,
                    attempt + 1,
                    last_error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(match last_error {
            SinkError::ConnectionFailed(reason) => SinkError::ConnectionFailed(format!(
                "{} (after {} attempts)",
                reason, attempts
            )),
            other => SinkError::connection_failed(format!(
                "{} (after {} attempts)",
                other, attempts
            )),
        })
    }

    /// Drop a dead inner sink and resolve again
    async fn handle_connection_loss(&self, dead: &Arc<S>) -> Result<Arc<S>, SinkError> {
        self.metrics
            .reconnection_attempts
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!("Lazy sink '{}' attempting automatic reconnection", self.name);

        {
            let _guard = self.connection_mutex.lock().await;
            let mut inner = self.inner.write().await;
            // Another caller may already have replaced it
            if inner.as_ref().is_some_and(|current| Arc::ptr_eq(current, dead)) {
                *inner = None;
                self.state
                    .write()
                    .await
                    .transition_to(LazyConnectionState::Disconnected);
                self.cached_connected.store(false, Ordering::Relaxed);
            }
        }

        self.ensure_connected().await
    }

    fn record_send(&self, result: &Result<(), SinkError>) {
        let counter = if result.is_ok() {
            &self.metrics.messages_sent
        } else {
            &self.metrics.messages_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl<S: MessageSink + 'static> MessageSink for LazyMessageSink<S> {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        // Lazy connection happens here
        let sink = match self.ensure_connected().await {
            Ok(sink) => sink,
            Err(e) => {
                self.metrics.messages_failed.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let retry_copy = self.config.auto_reconnect.then(|| message.clone());
        let result = sink.send(message).await;

        let result = match (result, retry_copy) {
            (Err(e), Some(message)) if e.is_connection_error() => {
                tracing::warn!(
                    "Lazy sink '{}' detected connection loss during send: {}",
                    self.name,
                    e
                );
                match self.handle_connection_loss(&sink).await {
                    Ok(fresh) => fresh.send(message).await,
                    Err(reconnect_err) => Err(reconnect_err),
                }
            }
            (result, _) => result,
        };

        self.record_send(&result);
        result
    }

    fn is_connected(&self) -> bool {
        if !self.cached_connected.load(Ordering::Relaxed) {
            return false;
        }
        match self.inner.try_read() {
            Ok(inner) => inner.as_ref().is_some_and(|s| s.is_connected()),
            Err(_) => false,
        }
    }

    fn metadata(&self) -> SinkMetadata {
        let (state, last_error) = match self.state.try_read() {
            Ok(state) => {
                let connection = match state.state {
                    LazyConnectionState::Disconnected => ConnectionState::Disconnected,
                    LazyConnectionState::Connecting => ConnectionState::Connecting,
                    LazyConnectionState::Connected => ConnectionState::Connected,
                    LazyConnectionState::Failed => ConnectionState::Failed,
                };
                (connection, state.last_error.clone())
            }
            Err(_) => (ConnectionState::Connecting, None),
        };

        let mut metadata = SinkMetadata::new(format!("lazy-{}", self.name), "lazy")
            .with_state(state)
            .with_counts(
                self.metrics.messages_sent.load(Ordering::Relaxed),
                self.metrics.messages_failed.load(Ordering::Relaxed),
            )
            .with_last_error(last_error);

        if let Ok(inner) = self.inner.try_read() {
            if let Some(sink) = inner.as_ref() {
                metadata.endpoint = sink.metadata().endpoint;
            }
        }
        metadata
    }
}
