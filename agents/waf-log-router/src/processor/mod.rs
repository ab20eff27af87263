//! Record processor
//!
//! Runs the classification engine over one invocation and hands the
//! resulting batches to the delivery client. Delivery failures are logged and
//! never change the response returned to the trigger.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::client::{DeliveryClient, DeliveryError};
use crate::contracts::*;
use crate::engine::{ExtractionSummary, RecordClassifier};
use crate::telemetry::{RouterMetrics, RouterMetricsRegistry};

/// Outcome of one delivery call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub channel: Channel,
    pub stream_name: String,
    pub record_count: usize,
    pub result: Result<DeliveryReceipt, DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything one invocation produced
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub invocation_id: Uuid,
    pub response: TransformationResponse,
    pub summary: ExtractionSummary,
    /// Only channels with a non-empty batch appear here
    pub deliveries: Vec<DeliveryOutcome>,
}

impl ProcessingReport {
    pub fn delivery(&self, channel: Channel) -> Option<&DeliveryOutcome> {
        self.deliveries.iter().find(|d| d.channel == channel)
    }

    /// Loggable digest of the report
    pub fn digest(&self) -> ReportDigest {
        ReportDigest {
            invocation_id: self.invocation_id,
            summary: self.summary,
            deliveries: self
                .deliveries
                .iter()
                .map(|d| DeliveryDigest {
                    channel: d.channel,
                    stream_name: d.stream_name.clone(),
                    record_count: d.record_count,
                    failed_put_count: d.result.as_ref().map(|r| r.failed_put_count).ok(),
                    error: d.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

/// Serializable view of a [`ProcessingReport`]
#[derive(Debug, Serialize)]
pub struct ReportDigest {
    pub invocation_id: Uuid,
    pub summary: ExtractionSummary,
    pub deliveries: Vec<DeliveryDigest>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryDigest {
    pub channel: Channel,
    pub stream_name: String,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_put_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Classifies transformation records and forwards BLOCK/COUNT batches
pub struct RecordProcessor {
    classifier: RecordClassifier,
    delivery: Arc<dyn DeliveryClient>,
    channels: ChannelConfig,
    metrics: Option<Arc<RouterMetricsRegistry>>,
}

impl RecordProcessor {
    pub fn new(delivery: Arc<dyn DeliveryClient>, channels: ChannelConfig) -> Self {
        Self {
            classifier: RecordClassifier::new(),
            delivery,
            channels,
            metrics: None,
        }
    }

    /// Record classification and delivery metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<RouterMetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn channels(&self) -> &ChannelConfig {
        &self.channels
    }

    fn router_metrics(&self) -> Option<&RouterMetrics> {
        self.metrics.as_deref().map(|m| m.router())
    }

    /// Invocation entry point: returns only the outcome sequence
    pub async fn handle(&self, event: TransformationEvent) -> TransformationResponse {
        self.process(event).await.response
    }

    /// Classify the event, dispatch the batches, and report what happened
    pub async fn process(&self, event: TransformationEvent) -> ProcessingReport {
        let start = Instant::now();
        let invocation_id = Uuid::new_v4();

        let extraction = self.classifier.extract(&event);

        tracing::debug!(
            invocation_id = %invocation_id,
            records = extraction.summary.total,
            block = extraction.summary.block,
            count = extraction.summary.count,
            pass = extraction.summary.pass,
            failed = extraction.summary.failed(),
            "classified records"
        );

        let deliveries = self.dispatch(extraction.block, extraction.count).await;

        if let Some(metrics) = self.router_metrics() {
            metrics.record_summary(&extraction.summary);
            metrics.record_invocation(start.elapsed().as_secs_f64());
        }

        ProcessingReport {
            invocation_id,
            response: extraction.response,
            summary: extraction.summary,
            deliveries,
        }
    }

    /// Submit each non-empty batch to its channel; both calls run concurrently
    /// and are independent of each other
    pub async fn dispatch(
        &self,
        block: Vec<Vec<u8>>,
        count: Vec<Vec<u8>>,
    ) -> Vec<DeliveryOutcome> {
        let block = self.batch(Channel::Block, block);
        let count = self.batch(Channel::Count, count);

        let (block, count) = futures::join!(
            self.deliver_opt(block.as_ref()),
            self.deliver_opt(count.as_ref())
        );

        block.into_iter().chain(count).collect()
    }

    fn batch(&self, channel: Channel, records: Vec<Vec<u8>>) -> Option<DeliveryBatch> {
        if records.is_empty() {
            return None;
        }
        Some(DeliveryBatch::new(
            channel,
            self.channels.stream_for(channel),
            records,
        ))
    }

    async fn deliver_opt(&self, batch: Option<&DeliveryBatch>) -> Option<DeliveryOutcome> {
        match batch {
            Some(batch) => Some(self.deliver(batch).await),
            None => None,
        }
    }

    async fn deliver(&self, batch: &DeliveryBatch) -> DeliveryOutcome {
        let result = self.delivery.put_record_batch(batch).await;

        match &result {
            Ok(receipt) if receipt.is_partial_failure() => {
                tracing::warn!(
                    delivery_stream_name = %batch.stream_name,
                    num_records = batch.len(),
                    failed_put_count = receipt.failed_put_count,
                    "put {} logs to delivery stream: some records were rejected",
                    batch.channel
                );
            }
            Ok(_) => {
                tracing::debug!(
                    delivery_stream_name = %batch.stream_name,
                    num_records = batch.len(),
                    client = self.delivery.id(),
                    "put {} logs to delivery stream",
                    batch.channel
                );
            }
            Err(e) => {
                tracing::error!(
                    delivery_stream_name = %batch.stream_name,
                    num_records = batch.len(),
                    error = %e,
                    "put {} logs to delivery stream",
                    batch.channel
                );
            }
        }

        if let Some(metrics) = self.router_metrics() {
            let delivered = result
                .as_ref()
                .map(|r| r.record_count.saturating_sub(r.failed_put_count))
                .unwrap_or(0);
            metrics.record_delivery(batch.channel, result.is_ok(), delivered);
        }

        DeliveryOutcome {
            channel: batch.channel,
            stream_name: batch.stream_name.clone(),
            record_count: batch.len(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RecordingDeliveryClient;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn record(id: &str, json: &str) -> InboundRecord {
        InboundRecord::new(id, STANDARD.encode(json))
    }

    fn processor(client: Arc<RecordingDeliveryClient>) -> RecordProcessor {
        RecordProcessor::new(client, ChannelConfig::new("waf-block", "waf-count"))
    }

    #[tokio::test]
    async fn test_dispatch_skips_empty_batches() {
        let client = Arc::new(RecordingDeliveryClient::new());
        let outcomes = processor(Arc::clone(&client))
            .dispatch(Vec::new(), Vec::new())
            .await;

        assert!(outcomes.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_uses_channel_streams() {
        let client = Arc::new(RecordingDeliveryClient::new());
        let outcomes = processor(Arc::clone(&client))
            .dispatch(vec![b"b1".to_vec()], vec![b"c1".to_vec(), b"c2".to_vec()])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].channel, Channel::Block);
        assert_eq!(outcomes[0].stream_name, "waf-block");
        assert_eq!(outcomes[1].record_count, 2);
        assert_eq!(client.batches_for("waf-count")[0].records.len(), 2);
    }

    #[tokio::test]
    async fn test_process_records_metrics() {
        let client = Arc::new(RecordingDeliveryClient::new().failing_stream("waf-count"));
        let metrics = Arc::new(RouterMetricsRegistry::new().unwrap());
        let processor = processor(client).with_metrics(Arc::clone(&metrics));

        let report = processor
            .process(TransformationEvent::new(vec![
                record("1", r#"{"action":"BLOCK"}"#),
                record("2", r#"{"action":"ALLOW","nonTerminatingMatchingRules":[{}]}"#),
            ]))
            .await;

        assert!(report.delivery(Channel::Block).unwrap().is_success());
        assert!(!report.delivery(Channel::Count).unwrap().is_success());
        assert_eq!(metrics.router().records_for(Classification::Block), 1.0);
        assert_eq!(metrics.router().deliveries_for(Channel::Block, true), 1.0);
        assert_eq!(metrics.router().deliveries_for(Channel::Count, false), 1.0);

        let digest = serde_json::to_value(report.digest()).unwrap();
        assert_eq!(digest["deliveries"].as_array().unwrap().len(), 2);
        assert!(digest["deliveries"][1]["error"].is_string());
    }
}
