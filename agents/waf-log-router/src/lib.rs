//! WAF Log Router
//!
//! Log-transformation handler that inspects WAF log records and forwards
//! blocked requests and count-mode matches to dedicated delivery streams.
//!
//! Every inbound record is echoed back with an `Ok` result; routing happens on
//! the side. Records that cannot be decoded or parsed are logged and passed
//! through without being forwarded.
//!
//! # Modules
//! - `engine`: pure classification of records into block/count batches
//! - `processor`: classification plus concurrent dispatch of both batches
//! - `client`: the `DeliveryClient` capability and its implementations
//! - `handler`: axum invocation surface
//! - `config`: stream names and delivery settings, loaded once at startup

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod processor;
pub mod telemetry;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;

pub use client::{DeliveryClient, DeliveryError, FirehoseClient, RecordingDeliveryClient};
pub use config::RouterConfig;
pub use engine::{Extraction, ExtractionSummary, RecordClassifier};
pub use error::RouterError;
pub use processor::{DeliveryOutcome, ProcessingReport, RecordProcessor};
