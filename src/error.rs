//! Error types for stream construction and consumption.

use thiserror::Error;

/// Errors raised by feature-stream operators.
///
/// `Schema` and most `Argument` errors are raised eagerly, when an operator is
/// built and before any feature is pulled. `OrderingViolation` only comes out
/// of streams wrapped with [`crate::FeatureStream::verify_sorted`]; unwrapped
/// streams trust the caller's ordering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Schema error: field '{field}' {context}")]
    Schema { field: String, context: String },

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Stream not sorted: {message} (feature {position})")]
    OrderingViolation { position: usize, message: String },
}

impl StreamError {
    /// A field was requested but the stream does not carry it.
    pub fn missing_field(field: impl Into<String>) -> Self {
        StreamError::Schema {
            field: field.into(),
            context: "is missing from the stream".to_string(),
        }
    }

    /// Build a schema error with a custom explanation.
    pub fn schema(field: impl Into<String>, context: impl Into<String>) -> Self {
        StreamError::Schema {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Build an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        StreamError::Argument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
