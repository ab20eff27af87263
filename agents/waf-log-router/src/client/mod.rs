//! Delivery clients
//!
//! The processor only talks to the [`DeliveryClient`] capability, so the
//! transport can be swapped for the in-memory recorder in tests and dry runs.

pub mod firehose;
pub mod recording;

pub use firehose::{FirehoseClient, FirehoseClientConfig};
pub use recording::RecordingDeliveryClient;

use futures::future::BoxFuture;

use crate::contracts::{DeliveryBatch, DeliveryReceipt};

/// Submits a named batch of raw payloads to a delivery stream
pub trait DeliveryClient: Send + Sync {
    /// Client identifier, used in logs
    fn id(&self) -> &str;

    /// Put one batch; the whole batch succeeds or fails as a unit at the
    /// transport level, individual rejections are reported in the receipt
    fn put_record_batch<'a>(
        &'a self,
        batch: &'a DeliveryBatch,
    ) -> BoxFuture<'a, Result<DeliveryReceipt, DeliveryError>>;
}

/// Delivery errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Client configuration error: {0}")]
    Config(String),
}
