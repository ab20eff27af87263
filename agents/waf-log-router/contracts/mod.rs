//! WAF Log Router Contracts
//!
//! Wire types for the log-transformation invocation and for the decoded
//! WAF log entries carried inside each record.

mod delivery;

pub use delivery::*;

use serde::{Deserialize, Serialize};

/// Invocation event delivered by the log-transformation trigger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformationEvent {
    /// Records to transform, in delivery order
    #[serde(default)]
    pub records: Vec<InboundRecord>,
}

impl TransformationEvent {
    /// Create an event from a list of records
    pub fn new(records: Vec<InboundRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A single inbound record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRecord {
    /// Record identifier assigned by the trigger
    pub record_id: String,

    /// Base64-encoded payload, exactly as received
    pub data: String,
}

impl InboundRecord {
    pub fn new(record_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            data: data.into(),
        }
    }

    /// Raw payload bytes as transmitted (the encoded text, not the decoded bytes)
    pub fn raw_payload(&self) -> Vec<u8> {
        self.data.as_bytes().to_vec()
    }
}

/// Response returned to the log-transformation trigger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationResponse {
    /// One outcome per inbound record, in input order
    pub records: Vec<OutcomeRecord>,
}

impl TransformationResponse {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }
}

/// Per-record transformation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// Identifier copied from the inbound record
    pub record_id: String,

    /// Transformation result marker
    pub result: RecordResult,

    /// Payload echoed back unchanged
    pub data: String,
}

impl OutcomeRecord {
    /// Accept a record, echoing its identifier and payload
    pub fn accepted(record: &InboundRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            result: RecordResult::Ok,
            data: record.data.clone(),
        }
    }
}

/// Result markers understood by the transformation trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordResult {
    /// Record was transformed and should be delivered
    Ok,
    /// Record was intentionally dropped
    Dropped,
    /// Record could not be transformed
    ProcessingFailed,
}

impl RecordResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordResult::Ok => "Ok",
            RecordResult::Dropped => "Dropped",
            RecordResult::ProcessingFailed => "ProcessingFailed",
        }
    }
}

/// Decoded WAF log entry
///
/// Only the fields needed for routing are modelled; everything else in the
/// log line is ignored.
///
/// Keys are matched ASCII case-insensitively and a repeated key overwrites
/// the earlier value, in document order. A `null` action leaves the action
/// unchanged; a `null` rule list clears it; a `null` entry is empty. Any
/// other type mismatch is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WafLogEntry {
    /// Terminating action (`ALLOW`, `BLOCK`, ...)
    pub action: Option<String>,

    /// Rules that matched without terminating the request
    pub non_terminating_matching_rules: Option<Vec<serde_json::Value>>,
}

impl WafLogEntry {
    /// Terminating action value that routes a record to the block stream
    pub const BLOCK_ACTION: &'static str = "BLOCK";

    const ACTION_KEY: &'static str = "action";
    const RULES_KEY: &'static str = "nonTerminatingMatchingRules";

    pub fn is_blocked(&self) -> bool {
        self.action.as_deref() == Some(Self::BLOCK_ACTION)
    }

    /// Number of non-terminating matches; a missing or null list counts as empty
    pub fn matching_rule_count(&self) -> usize {
        self.non_terminating_matching_rules
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl<'de> Deserialize<'de> for WafLogEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_option(WafLogEntryVisitor)
    }
}

struct WafLogEntryVisitor;

impl<'de> serde::de::Visitor<'de> for WafLogEntryVisitor {
    type Value = WafLogEntry;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a WAF log entry object")
    }

    fn visit_none<E>(self) -> std::result::Result<WafLogEntry, E>
    where
        E: serde::de::Error,
    {
        Ok(WafLogEntry::default())
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<WafLogEntry, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<WafLogEntry, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut entry = WafLogEntry::default();

        while let Some(key) = map.next_key::<String>()? {
            if key.eq_ignore_ascii_case(WafLogEntry::ACTION_KEY) {
                if let Some(action) = map.next_value::<Option<String>>()? {
                    entry.action = Some(action);
                }
            } else if key.eq_ignore_ascii_case(WafLogEntry::RULES_KEY) {
                entry.non_terminating_matching_rules = map.next_value()?;
            } else {
                map.next_value::<serde::de::IgnoredAny>()?;
            }
        }

        Ok(entry)
    }
}

/// Routing decision for a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Terminating action was BLOCK
    Block,
    /// At least one non-terminating rule matched
    Count,
    /// Nothing to forward
    Pass,
    /// Payload was not valid base64
    Undecodable,
    /// Decoded bytes were not a WAF log entry
    Unparseable,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Block => "block",
            Classification::Count => "count",
            Classification::Pass => "pass",
            Classification::Undecodable => "undecodable",
            Classification::Unparseable => "unparseable",
        }
    }

    /// Delivery channel the record is forwarded to, if any
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Classification::Block => Some(Channel::Block),
            Classification::Count => Some(Channel::Count),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
