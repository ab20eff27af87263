//! In-memory delivery client
//!
//! Records every batch it is handed instead of sending it anywhere. Streams
//! can be marked as failing to exercise the processor's error path.

use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{DeliveryClient, DeliveryError};
use crate::contracts::{DeliveryBatch, DeliveryReceipt};

/// Delivery client that captures batches in memory
#[derive(Debug, Default)]
pub struct RecordingDeliveryClient {
    batches: Mutex<Vec<DeliveryBatch>>,
    attempts: AtomicUsize,
    failing_streams: HashSet<String>,
}

impl RecordingDeliveryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every batch sent to `stream_name`
    pub fn failing_stream(mut self, stream_name: impl Into<String>) -> Self {
        self.failing_streams.insert(stream_name.into());
        self
    }

    /// Batches accepted so far, in submission order
    pub fn batches(&self) -> Vec<DeliveryBatch> {
        self.batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }

    /// Batches accepted for one stream
    pub fn batches_for(&self, stream_name: &str) -> Vec<DeliveryBatch> {
        self.batches()
            .into_iter()
            .filter(|b| b.stream_name == stream_name)
            .collect()
    }

    /// Number of `put_record_batch` calls, including rejected ones
    pub fn call_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, batch: &DeliveryBatch) -> Result<DeliveryReceipt, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.failing_streams.contains(&batch.stream_name) {
            return Err(DeliveryError::Server {
                status: 500,
                message: format!("stream {} rejected the batch", batch.stream_name),
            });
        }

        self.batches
            .lock()
            .map_err(|e| DeliveryError::Network(e.to_string()))?
            .push(batch.clone());

        Ok(DeliveryReceipt::accepted(batch))
    }
}

impl DeliveryClient for RecordingDeliveryClient {
    fn id(&self) -> &str {
        "recording"
    }

    fn put_record_batch<'a>(
        &'a self,
        batch: &'a DeliveryBatch,
    ) -> BoxFuture<'a, Result<DeliveryReceipt, DeliveryError>> {
        let result = self.record(batch);
        Box::pin(async move { result })
    }
}
