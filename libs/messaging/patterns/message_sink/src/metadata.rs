use std::fmt;

/// Information about a sink for monitoring/debugging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkMetadata {
    /// Human-readable sink name
    pub name: String,

    /// Sink type (actor, lazy, collector, ...)
    pub sink_type: String,

    /// Logical endpoint if applicable
    pub endpoint: Option<String>,

    /// Current connection state
    pub state: ConnectionState,

    /// Messages sent successfully
    pub messages_sent: u64,

    /// Messages failed to send
    pub messages_failed: u64,

    /// Last error if any
    pub last_error: Option<String>,
}

impl SinkMetadata {
    /// Create new metadata with name and type
    pub fn new(name: impl Into<String>, sink_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: sink_type.into(),
            ..Self::default()
        }
    }

    /// Set endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set connection state
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = state;
        self
    }

    /// Set send counters
    pub fn with_counts(mut self, sent: u64, failed: u64) -> Self {
        self.messages_sent = sent;
        self.messages_failed = failed;
        self
    }

    pub fn with_last_error(mut self, error: Option<String>) -> Self {
        self.last_error = error;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
