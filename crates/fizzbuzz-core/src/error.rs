//! Error types for the FizzBuzz service
//!
//! This module defines the error types shared by the core engine and the
//! HTTP layer. Uses `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request parameters failed validation. Carries every failed condition.
    #[error("validation failed: {message} [{}]", details.join(", "))]
    Validation {
        /// Top-level message
        message: String,
        /// One entry per failed condition
        details: Vec<String>,
    },

    /// Request body could not be decoded
    #[error("invalid JSON body: {0}")]
    InvalidBody(String),

    /// Request body exceeds the configured limit
    #[error("request body too large (max {0} bytes)")]
    BodyTooLarge(usize),

    /// Frequency index failure
    #[error("statistics unavailable: {0}")]
    Stats(#[from] IndexError),

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Build a validation error from a message and its detail list.
    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details,
        }
    }

    /// Returns true if the error was caused by the client's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation { .. }
                | ServiceError::InvalidBody(_)
                | ServiceError::BodyTooLarge(_)
        )
    }

    /// Per-condition details to surface to the client, if any.
    pub fn details(&self) -> Option<&[String]> {
        match self {
            ServiceError::Validation { details, .. } => Some(details),
            _ => None,
        }
    }
}

/// Infrastructural failures surfaced by the frequency index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The caller gave up before the operation completed
    #[error("operation cancelled by caller")]
    Cancelled,

    /// The operation did not complete in time
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
