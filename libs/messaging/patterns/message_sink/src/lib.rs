//! Message Sinks
//!
//! A [`MessageSink`] is anything a stream client can relay envelopes to. The
//! production sink is a [`LazyMessageSink`] wrapping an [`ActorSink`]: the
//! coordinator is looked up by address on the first send, cached, and looked
//! up again only if the cached handle turns out to be dead.

pub mod error;
pub mod lazy;
pub mod metadata;
pub mod sinks;
pub mod test_utils;

use async_trait::async_trait;
use std::fmt::Debug;

pub use error::SinkError;
pub use lazy::{BoxFuture, LazyConfig, LazyConnectionState, LazyMessageSink, LazyMetrics};
pub use metadata::{ConnectionState, SinkMetadata};
pub use sinks::ActorSink;
pub use types::Message;

/// A destination for messages that abstracts away connection details
#[async_trait]
pub trait MessageSink: Send + Sync + Debug {
    /// Send a single message
    async fn send(&self, message: Message) -> Result<(), SinkError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get sink metadata for debugging/monitoring
    fn metadata(&self) -> SinkMetadata {
        SinkMetadata::default()
    }
}
