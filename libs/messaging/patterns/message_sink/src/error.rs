use messaging_actors::ActorError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl SinkError {
    /// Check if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SinkError::ConnectionFailed(_) | SinkError::ConnectionLost(_))
    }

    /// Create a connection failed error
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        SinkError::ConnectionFailed(msg.into())
    }

    /// Create a connection lost error
    pub fn connection_lost(msg: impl Into<String>) -> Self {
        SinkError::ConnectionLost(msg.into())
    }

    /// Create a send failed error
    pub fn send_failed(msg: impl Into<String>) -> Self {
        SinkError::SendFailed(msg.into())
    }
}

impl From<ActorError> for SinkError {
    fn from(err: ActorError) -> Self {
        match err {
            ActorError::MailboxClosed { .. } => SinkError::ConnectionLost(err.to_string()),
            ActorError::NotFound { .. } => SinkError::ConnectionFailed(err.to_string()),
            ActorError::AlreadyRegistered { .. } | ActorError::ExecutionFailed(_) => {
                SinkError::SendFailed(err.to_string())
            }
        }
    }
}
