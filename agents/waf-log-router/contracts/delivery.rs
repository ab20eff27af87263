//! Delivery contracts
//!
//! Outbound batches and the receipts returned by the delivery transport.

use serde::{Deserialize, Serialize};

/// Downstream delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Records whose terminating action was BLOCK
    Block,
    /// Records with non-terminating (count mode) rule matches
    Count,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Block => "block",
            Channel::Count => "count",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery stream names bound to each channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Stream receiving blocked requests
    pub block_stream: String,

    /// Stream receiving counted requests
    pub count_stream: String,
}

impl ChannelConfig {
    pub fn new(block_stream: impl Into<String>, count_stream: impl Into<String>) -> Self {
        Self {
            block_stream: block_stream.into(),
            count_stream: count_stream.into(),
        }
    }

    /// Stream name for a channel
    pub fn stream_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Block => &self.block_stream,
            Channel::Count => &self.count_stream,
        }
    }
}

/// A batch of raw payloads bound for one delivery stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryBatch {
    /// Channel the batch was built for
    pub channel: Channel,

    /// Target delivery stream
    pub stream_name: String,

    /// Raw payloads, in input order
    pub records: Vec<Vec<u8>>,
}

impl DeliveryBatch {
    pub fn new(channel: Channel, stream_name: impl Into<String>, records: Vec<Vec<u8>>) -> Self {
        Self {
            channel,
            stream_name: stream_name.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Acknowledgement from the delivery transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Stream the batch was written to
    pub stream_name: String,

    /// Records submitted
    pub record_count: usize,

    /// Records the transport rejected individually
    pub failed_put_count: usize,
}

impl DeliveryReceipt {
    /// Receipt for a batch accepted in full
    pub fn accepted(batch: &DeliveryBatch) -> Self {
        Self {
            stream_name: batch.stream_name.clone(),
            record_count: batch.len(),
            failed_put_count: 0,
        }
    }

    pub fn is_partial_failure(&self) -> bool {
        self.failed_put_count > 0
    }
}
