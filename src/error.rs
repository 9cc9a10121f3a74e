//! Error types for quality-retry.
//!
//! Quality failures are not errors: a failing artifact, a recovered
//! generate/validate call, or an exhausted budget all end up in an
//! [`EpisodeResult`](crate::retry::EpisodeResult). The variants here cover
//! malformed requests, bad configuration and broken internal state.

use thiserror::Error;

/// Result type alias using quality-retry's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during retry operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request is missing a required field or violates the episode contract
    #[error("Invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation backend error
    #[error("Generation error: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Quality validation backend error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Illegal retry state machine transition
    #[error("Illegal state transition: {from} -> {to}")]
    StateTransition { from: String, to: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a generation error with source.
    pub fn generation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Generation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an illegal transition error.
    pub fn state_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::StateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
