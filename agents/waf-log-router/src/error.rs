//! Error types for the WAF Log Router
//!
//! Per-record errors (decode, parse) and delivery errors are logged and
//! swallowed by the processor; the remaining variants are startup errors.

use thiserror::Error;

use crate::client::DeliveryError;

/// Main error type for routing operations
#[derive(Error, Debug)]
pub enum RouterError {
    /// Payload is not valid base64
    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Decoded payload is not a WAF log entry
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Delivery transport failure
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Invalid process configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File or stream I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RouterError::Config(msg.into())
    }

    /// Check if this error is scoped to a single record (vs the whole process)
    pub fn is_record_error(&self) -> bool {
        matches!(self, RouterError::Decode(_) | RouterError::Parse(_))
    }
}

/// Result type alias for routing operations
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::config("BLOCK_DELIVERY_STREAM_NAME is empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: BLOCK_DELIVERY_STREAM_NAME is empty"
        );
    }

    #[test]
    fn test_is_record_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(RouterError::from(parse).is_record_error());
        assert!(RouterError::Decode(base64::DecodeError::InvalidLength).is_record_error());
        assert!(!RouterError::config("bad").is_record_error());
        assert!(!RouterError::from(DeliveryError::Network("refused".to_string())).is_record_error());
    }
}
