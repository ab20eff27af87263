//! Firehose delivery client
//!
//! Speaks the `PutRecordBatch` JSON protocol over HTTP. Request signing is
//! left to the endpoint (a signing proxy or a local emulator), so the client
//! only needs a base URL.
//!
//! Batches are sent exactly once; failures are returned to the caller.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DeliveryClient, DeliveryError};
use crate::contracts::{DeliveryBatch, DeliveryReceipt};

const PUT_RECORD_BATCH_TARGET: &str = "Firehose_20150804.PutRecordBatch";
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Configuration for the Firehose client
#[derive(Debug, Clone)]
pub struct FirehoseClientConfig {
    /// Service endpoint, e.g. `http://localhost:4566`
    pub endpoint_url: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for FirehoseClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:4566".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// HTTP client for Firehose-compatible delivery streams
pub struct FirehoseClient {
    client: Client,
    config: FirehoseClientConfig,
}

impl FirehoseClient {
    /// Create a new client for the given endpoint
    pub fn new(endpoint_url: impl Into<String>, timeout_ms: u64) -> Result<Self, DeliveryError> {
        Self::with_config(FirehoseClientConfig {
            endpoint_url: endpoint_url.into(),
            timeout_ms,
        })
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: FirehoseClientConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.config.endpoint_url
    }

    async fn send_batch(&self, batch: &DeliveryBatch) -> Result<DeliveryReceipt, DeliveryError> {
        let request = PutRecordBatchRequest::from_batch(batch);

        let response = self
            .client
            .post(&self.config.endpoint_url)
            .header("Content-Type", AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", PUT_RECORD_BATCH_TARGET)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let output: PutRecordBatchOutput = response
                .json()
                .await
                .map_err(|e| DeliveryError::Parse(format!("Failed to parse response: {}", e)))?;

            Ok(DeliveryReceipt {
                stream_name: batch.stream_name.clone(),
                record_count: batch.len(),
                failed_put_count: output.failed_put_count,
            })
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(DeliveryError::Server {
                status: status.as_u16(),
                message: service_error_message(&error_text),
            })
        }
    }
}

impl DeliveryClient for FirehoseClient {
    fn id(&self) -> &str {
        "firehose"
    }

    fn put_record_batch<'a>(
        &'a self,
        batch: &'a DeliveryBatch,
    ) -> BoxFuture<'a, Result<DeliveryReceipt, DeliveryError>> {
        Box::pin(self.send_batch(batch))
    }
}

/// Extract the service message from an error body, falling back to the raw text
fn service_error_message(body: &str) -> String {
    match serde_json::from_str::<ServiceError>(body) {
        Ok(ServiceError {
            error_type,
            message,
        }) => match (error_type, message) {
            (Some(t), Some(m)) => format!("{}: {}", t, m),
            (None, Some(m)) => m,
            (Some(t), None) => t,
            (None, None) => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutRecordBatchRequest {
    delivery_stream_name: String,
    records: Vec<FirehoseRecord>,
}

impl PutRecordBatchRequest {
    fn from_batch(batch: &DeliveryBatch) -> Self {
        Self {
            delivery_stream_name: batch.stream_name.clone(),
            records: batch
                .records
                .iter()
                .map(|data| FirehoseRecord {
                    data: STANDARD.encode(data),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FirehoseRecord {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutRecordBatchOutput {
    #[serde(default)]
    failed_put_count: usize,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Channel;

    #[test]
    fn test_request_body_encodes_raw_payloads() {
        let batch = DeliveryBatch::new(Channel::Block, "waf-block", vec![b"eyJ9".to_vec()]);
        let body = serde_json::to_value(PutRecordBatchRequest::from_batch(&batch)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "DeliveryStreamName": "waf-block",
                "Records": [{"Data": STANDARD.encode(b"eyJ9")}]
            })
        );
    }

    #[test]
    fn test_service_error_message() {
        assert_eq!(
            service_error_message(
                r#"{"__type":"ResourceNotFoundException","message":"Stream waf-block not found"}"#
            ),
            "ResourceNotFoundException: Stream waf-block not found"
        );
        assert_eq!(
            service_error_message(r#"{"Message":"throttled"}"#),
            "throttled"
        );
        assert_eq!(service_error_message("gateway down"), "gateway down");
    }

    #[test]
    fn test_client_config_defaults() {
        let config = FirehoseClientConfig::default();
        assert_eq!(config.timeout_ms, 5000);

        let client = FirehoseClient::with_config(config).unwrap();
        assert_eq!(client.endpoint_url(), "http://localhost:4566");
        assert_eq!(client.id(), "firehose");
    }
}
