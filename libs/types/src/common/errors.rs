//! Error types for value conversion
//!
//! Merging never fails; only bridging between [`crate::Value`] and typed
//! Rust structs through serde can.

use thiserror::Error;

/// Errors that can occur while converting typed data to or from a `Value`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A typed value could not be encoded as a `Value`
    #[error("Failed to encode value: {message}")]
    Encode { message: String },

    /// A `Value` did not have the shape the target type requires
    #[error("Failed to decode value into {target}: {message}")]
    Decode { target: &'static str, message: String },
}

impl ValueError {
    pub fn encode(message: impl Into<String>) -> Self {
        ValueError::Encode {
            message: message.into(),
        }
    }

    pub fn decode(target: &'static str, message: impl Into<String>) -> Self {
        ValueError::Decode {
            target,
            message: message.into(),
        }
    }
}
