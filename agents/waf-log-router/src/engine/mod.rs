//! Classification engine
//!
//! Single-pass classification of transformation records into the block and
//! count batches. Pure apart from logging: no I/O, no shared state.

use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    DecodeError, Engine as _,
};
use serde::Serialize;

use crate::contracts::*;
use crate::error::Result;

/// Standard alphabet with required padding; non-zero trailing bits accepted
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decode a record payload, ignoring embedded line breaks
pub fn decode_payload(data: &str) -> std::result::Result<Vec<u8>, DecodeError> {
    if data.contains(['\r', '\n']) {
        let compact: Vec<u8> = data
            .bytes()
            .filter(|b| !matches!(b, b'\r' | b'\n'))
            .collect();
        PAYLOAD_ENGINE.decode(compact)
    } else {
        PAYLOAD_ENGINE.decode(data)
    }
}

/// Per-invocation classification counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub total: usize,
    pub block: usize,
    pub count: usize,
    pub pass: usize,
    pub undecodable: usize,
    pub unparseable: usize,
}

impl ExtractionSummary {
    fn record(&mut self, classification: Classification) {
        self.total += 1;
        match classification {
            Classification::Block => self.block += 1,
            Classification::Count => self.count += 1,
            Classification::Pass => self.pass += 1,
            Classification::Undecodable => self.undecodable += 1,
            Classification::Unparseable => self.unparseable += 1,
        }
    }

    /// Records that could not be inspected
    pub fn failed(&self) -> usize {
        self.undecodable + self.unparseable
    }
}

/// Result of classifying one invocation's records
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Outcome sequence returned to the trigger
    pub response: TransformationResponse,

    /// Raw payloads for the block stream
    pub block: Vec<Vec<u8>>,

    /// Raw payloads for the count stream
    pub count: Vec<Vec<u8>>,

    pub summary: ExtractionSummary,
}

impl Extraction {
    /// Batch for a channel, in input order
    pub fn batch(&self, channel: Channel) -> &[Vec<u8>] {
        match channel {
            Channel::Block => &self.block,
            Channel::Count => &self.count,
        }
    }
}

/// Classifies WAF log records into delivery channels
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordClassifier;

impl RecordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Decode and parse a record's payload
    pub fn decode(&self, record: &InboundRecord) -> Result<WafLogEntry> {
        let bytes = decode_payload(&record.data)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Route a parsed entry; BLOCK wins over non-terminating matches
    pub fn classify_entry(&self, entry: &WafLogEntry) -> Classification {
        if entry.is_blocked() {
            Classification::Block
        } else if entry.matching_rule_count() != 0 {
            Classification::Count
        } else {
            Classification::Pass
        }
    }

    /// Classify a single record, logging decode and parse failures
    pub fn classify(&self, record: &InboundRecord) -> Classification {
        let bytes = match decode_payload(&record.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    record_id = %record.record_id,
                    data = %record.data,
                    error = %e,
                    "decode record data by base64"
                );
                return Classification::Undecodable;
            }
        };

        match serde_json::from_slice::<WafLogEntry>(&bytes) {
            Ok(entry) => self.classify_entry(&entry),
            Err(e) => {
                tracing::error!(
                    record_id = %record.record_id,
                    decoded_data = %String::from_utf8_lossy(&bytes),
                    error = %e,
                    "unmarshal decoded data as JSON"
                );
                Classification::Unparseable
            }
        }
    }

    /// Build the outcome sequence and the two outbound batches
    pub fn extract(&self, event: &TransformationEvent) -> Extraction {
        let mut extraction = Extraction {
            response: TransformationResponse::with_capacity(event.len()),
            ..Default::default()
        };

        for record in &event.records {
            // Every record gets an outcome, whatever its classification
            extraction.response.records.push(OutcomeRecord::accepted(record));

            let classification = self.classify(record);
            extraction.summary.record(classification);

            match classification.channel() {
                Some(Channel::Block) => extraction.block.push(record.raw_payload()),
                Some(Channel::Count) => extraction.count.push(record.raw_payload()),
                None => {}
            }
        }

        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn encoded(json: &str) -> String {
        STANDARD.encode(json)
    }

    fn record(id: &str, json: &str) -> InboundRecord {
        InboundRecord::new(id, encoded(json))
    }

    #[test]
    fn test_classify_block() {
        let classifier = RecordClassifier::new();
        let r = record("1", r#"{"action":"BLOCK"}"#);
        assert_eq!(classifier.classify(&r), Classification::Block);
    }

    #[test]
    fn test_block_wins_over_matching_rules() {
        let classifier = RecordClassifier::new();
        let r = record(
            "1",
            r#"{"action":"BLOCK","nonTerminatingMatchingRules":[{"ruleId":"a"}]}"#,
        );
        assert_eq!(classifier.classify(&r), Classification::Block);
    }

    #[test]
    fn test_classify_count() {
        let classifier = RecordClassifier::new();
        let r = record(
            "2",
            r#"{"action":"ALLOW","nonTerminatingMatchingRules":[{"id":1}]}"#,
        );
        assert_eq!(classifier.classify(&r), Classification::Count);
    }

    #[test]
    fn test_classify_pass() {
        let classifier = RecordClassifier::new();
        assert_eq!(
            classifier.classify(&record("a", r#"{"action":"ALLOW"}"#)),
            Classification::Pass
        );
        assert_eq!(
            classifier.classify(&record(
                "b",
                r#"{"action":"ALLOW","nonTerminatingMatchingRules":[]}"#
            )),
            Classification::Pass
        );
        assert_eq!(classifier.classify(&record("c", "{}")), Classification::Pass);
    }

    #[test]
    fn test_classify_failures() {
        let classifier = RecordClassifier::new();
        assert_eq!(
            classifier.classify(&InboundRecord::new("3", "not-valid-base64")),
            Classification::Undecodable
        );
        assert_eq!(
            classifier.classify(&record("4", "not json")),
            Classification::Unparseable
        );
        assert_eq!(
            classifier.classify(&record("5", r#"{"action": 42}"#)),
            Classification::Unparseable
        );
    }

    #[test]
    fn test_payload_line_breaks_ignored() {
        let classifier = RecordClassifier::new();
        assert_eq!(
            classifier.classify(&InboundRecord::new("1", "eyJhY3Rpb24iOiJCTE9DSyJ9\n")),
            Classification::Block
        );
        assert_eq!(
            classifier.classify(&InboundRecord::new("2", "eyJhY3Rpb24i\r\nOiJCTE9DSyJ9")),
            Classification::Block
        );
    }

    #[test]
    fn test_payload_trailing_bits_accepted() {
        assert_eq!(decode_payload("e31=").unwrap(), b"{}");
        assert_eq!(
            RecordClassifier::new().classify(&InboundRecord::new("1", "e31=")),
            Classification::Pass
        );
    }

    #[test]
    fn test_payload_padding_still_required() {
        assert!(decode_payload("e30").is_err());
        assert!(decode_payload("e30=\t").is_err());
        assert!(decode_payload("eyJ9_-==").is_err());
    }

    #[test]
    fn test_classify_lenient_keys() {
        let classifier = RecordClassifier::new();
        assert_eq!(
            classifier.classify(&record("1", r#"{"Action":"BLOCK"}"#)),
            Classification::Block
        );
        assert_eq!(
            classifier.classify(&record("2", r#"{"action":"ALLOW","action":"BLOCK"}"#)),
            Classification::Block
        );
        assert_eq!(
            classifier.classify(&record(
                "3",
                r#"{"action":"ALLOW","NonTerminatingMatchingRules":[{"ruleId":"a"}]}"#
            )),
            Classification::Count
        );
        assert_eq!(
            classifier.classify(&record("4", r#"{"Action":["BLOCK"]}"#)),
            Classification::Unparseable
        );
        assert_eq!(
            classifier.classify(&record("5", r#"{"nonTerminatingMatchingRules":"a"}"#)),
            Classification::Unparseable
        );
    }

    #[test]
    fn test_decode_errors_are_record_errors() {
        let classifier = RecordClassifier::new();
        let err = classifier
            .decode(&InboundRecord::new("3", "not-valid-base64"))
            .unwrap_err();
        assert!(err.is_record_error());

        let entry = classifier
            .decode(&record("1", r#"{"action":"BLOCK"}"#))
            .unwrap();
        assert!(entry.is_blocked());
    }

    #[test]
    fn test_extract_preserves_order_and_routes_raw_payload() {
        let classifier = RecordClassifier::new();
        let event = TransformationEvent::new(vec![
            record("1", r#"{"action":"BLOCK"}"#),
            InboundRecord::new("2", "%%%"),
            record("3", r#"{"action":"ALLOW","nonTerminatingMatchingRules":[1,2]}"#),
            record("4", r#"{"action":"ALLOW"}"#),
        ]);

        let extraction = classifier.extract(&event);

        let ids: Vec<_> = extraction
            .response
            .records
            .iter()
            .map(|r| r.record_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert!(extraction
            .response
            .records
            .iter()
            .all(|r| r.result == RecordResult::Ok));

        assert_eq!(extraction.block, vec![event.records[0].data.as_bytes().to_vec()]);
        assert_eq!(extraction.count, vec![event.records[2].data.as_bytes().to_vec()]);
        assert_eq!(extraction.batch(Channel::Block).len(), 1);

        assert_eq!(
            extraction.summary,
            ExtractionSummary {
                total: 4,
                block: 1,
                count: 1,
                pass: 1,
                undecodable: 1,
                unparseable: 0,
            }
        );
        assert_eq!(extraction.summary.failed(), 1);
    }

    #[test]
    fn test_extract_empty_event() {
        let extraction = RecordClassifier::new().extract(&TransformationEvent::default());
        assert!(extraction.response.records.is_empty());
        assert!(extraction.block.is_empty());
        assert!(extraction.count.is_empty());
        assert_eq!(extraction.summary.total, 0);
    }
}
