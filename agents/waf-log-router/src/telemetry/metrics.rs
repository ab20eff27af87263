//! Prometheus metrics for the WAF Log Router
//!
//! - `waf_log_router_invocations_total` (counter)
//! - `waf_log_router_records_total` (counter) - records by classification
//! - `waf_log_router_deliveries_total` (counter) - delivery calls by channel and result
//! - `waf_log_router_delivered_records_total` (counter) - records accepted per channel
//! - `waf_log_router_invocation_duration_seconds` (histogram)

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;

use super::{Result, TelemetryError};
use crate::contracts::{Channel, Classification};
use crate::engine::ExtractionSummary;

const NAMESPACE: &str = "waf_log_router";

/// Router metrics
pub struct RouterMetrics {
    invocations_total: Counter,
    records_total: CounterVec,
    deliveries_total: CounterVec,
    delivered_records_total: CounterVec,
    invocation_duration_seconds: Histogram,
}

impl RouterMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let invocations_total = Counter::with_opts(
            Opts::new("invocations_total", "Total number of transformation invocations")
                .namespace(NAMESPACE),
        )?;

        let records_total = CounterVec::new(
            Opts::new("records_total", "Records processed by classification")
                .namespace(NAMESPACE),
            &["classification"],
        )?;

        let deliveries_total = CounterVec::new(
            Opts::new("deliveries_total", "Delivery calls by channel and result")
                .namespace(NAMESPACE),
            &["channel", "result"],
        )?;

        let delivered_records_total = CounterVec::new(
            Opts::new(
                "delivered_records_total",
                "Records accepted by the delivery transport",
            )
            .namespace(NAMESPACE),
            &["channel"],
        )?;

        let invocation_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "invocation_duration_seconds",
                "Invocation duration in seconds, including delivery",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(invocations_total.clone()))?;
        registry.register(Box::new(records_total.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;
        registry.register(Box::new(delivered_records_total.clone()))?;
        registry.register(Box::new(invocation_duration_seconds.clone()))?;

        Ok(Self {
            invocations_total,
            records_total,
            deliveries_total,
            delivered_records_total,
            invocation_duration_seconds,
        })
    }

    pub fn record_invocation(&self, duration_secs: f64) {
        self.invocations_total.inc();
        self.invocation_duration_seconds.observe(duration_secs);
    }

    pub fn record_classification(&self, classification: Classification, n: usize) {
        if n == 0 {
            return;
        }
        self.records_total
            .with_label_values(&[classification.as_str()])
            .inc_by(n as f64);
    }

    /// Record every classification count from one invocation
    pub fn record_summary(&self, summary: &ExtractionSummary) {
        self.record_classification(Classification::Block, summary.block);
        self.record_classification(Classification::Count, summary.count);
        self.record_classification(Classification::Pass, summary.pass);
        self.record_classification(Classification::Undecodable, summary.undecodable);
        self.record_classification(Classification::Unparseable, summary.unparseable);
    }

    /// Record one delivery call; `delivered` is the number of records the
    /// transport accepted
    pub fn record_delivery(&self, channel: Channel, success: bool, delivered: usize) {
        let result = if success { "success" } else { "failure" };
        self.deliveries_total
            .with_label_values(&[channel.as_str(), result])
            .inc();
        if delivered > 0 {
            self.delivered_records_total
                .with_label_values(&[channel.as_str()])
                .inc_by(delivered as f64);
        }
    }

    pub fn records_for(&self, classification: Classification) -> f64 {
        self.records_total
            .with_label_values(&[classification.as_str()])
            .get()
    }

    pub fn deliveries_for(&self, channel: Channel, success: bool) -> f64 {
        let result = if success { "success" } else { "failure" };
        self.deliveries_total
            .with_label_values(&[channel.as_str(), result])
            .get()
    }
}

/// Registry owning the router metrics
pub struct RouterMetricsRegistry {
    registry: Arc<Registry>,
    router: RouterMetrics,
}

impl RouterMetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create with an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let router = RouterMetrics::new(&registry)?;
        Ok(Self { registry, router })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn router(&self) -> &RouterMetrics {
        &self.router
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_summary() {
        let registry = RouterMetricsRegistry::new().unwrap();
        let summary = ExtractionSummary {
            total: 4,
            block: 2,
            count: 1,
            pass: 0,
            undecodable: 1,
            unparseable: 0,
        };

        registry.router().record_summary(&summary);

        assert_eq!(registry.router().records_for(Classification::Block), 2.0);
        assert_eq!(registry.router().records_for(Classification::Count), 1.0);
        assert_eq!(registry.router().records_for(Classification::Undecodable), 1.0);
        assert_eq!(registry.router().records_for(Classification::Pass), 0.0);
    }

    #[test]
    fn test_record_delivery() {
        let registry = RouterMetricsRegistry::new().unwrap();

        registry.router().record_delivery(Channel::Block, true, 3);
        registry.router().record_delivery(Channel::Count, false, 0);

        assert_eq!(registry.router().deliveries_for(Channel::Block, true), 1.0);
        assert_eq!(registry.router().deliveries_for(Channel::Count, false), 1.0);
        assert_eq!(registry.router().deliveries_for(Channel::Count, true), 0.0);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        RouterMetricsRegistry::with_registry(Arc::clone(&registry)).unwrap();
        assert!(RouterMetricsRegistry::with_registry(registry).is_err());
    }

    #[test]
    fn test_encode_text() {
        let registry = RouterMetricsRegistry::new().unwrap();
        registry.router().record_invocation(0.01);
        registry.router().record_classification(Classification::Block, 1);

        let text = registry.encode_text().unwrap();
        assert!(text.contains("waf_log_router_records_total"));
        assert!(text.contains("waf_log_router_invocations_total 1"));
    }
}
