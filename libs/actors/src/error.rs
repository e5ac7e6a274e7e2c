//! Actor runtime errors

use thiserror::Error;

/// Errors raised by the actor runtime and its registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActorError {
    /// No actor is registered under the address
    #[error("No actor registered at address '{address}'")]
    NotFound { address: String },

    /// A live actor already owns the address
    #[error("Address '{address}' is already registered")]
    AlreadyRegistered { address: String },

    /// The target actor has stopped and its mailbox no longer accepts messages
    #[error("Mailbox of {actor} is closed")]
    MailboxClosed { actor: String },

    /// A behavior failed while starting, stopping or handling a message
    #[error("Actor execution failed: {0}")]
    ExecutionFailed(String),
}

impl ActorError {
    pub fn not_found(address: impl Into<String>) -> Self {
        Self::NotFound {
            address: address.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionFailed(message.into())
    }

    /// Error category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::MailboxClosed { .. } => "mailbox_closed",
            Self::ExecutionFailed(_) => "execution",
        }
    }
}

/// Result alias for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;
