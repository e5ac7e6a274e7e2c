//! Error types for output streams

use thiserror::Error;
use types::ValueKind;

/// Failures converting an accumulated value into its target shape
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShapeError {
    /// Shapes are built from field mappings; anything else cannot be converted
    #[error("Cannot build {shape} from a {found} value")]
    NotAMapping { shape: String, found: ValueKind },

    #[error("{shape} requires field '{field}'")]
    MissingField { shape: String, field: String },

    #[error("{shape} has no field '{field}'")]
    UnknownField { shape: String, field: String },

    /// The shape's own constructor rejected the fields
    #[error("Failed to construct {shape}: {message}")]
    Construction { shape: String, message: String },
}

/// Errors surfaced by [`crate::OutputStream`] and its builder
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to finalize stream output: {0}")]
    Shape(#[from] ShapeError),

    #[error("Output stream has no relay target; configure a sink or a coordinator")]
    MissingSink,

    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(String),
}
