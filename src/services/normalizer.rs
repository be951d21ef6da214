//! Gateway payload normalization.
//!
//! Payment gateways disagree on field names and nesting: the same logical
//! event may arrive as `{status: ...}`, `{data: {status: ...}}` or
//! `{payment_status: ...}`, and the identifiers as `order_id`,
//! `transaction_id` or `reference`. Rather than one schema per provider,
//! the normalizer evaluates ordered lists of field paths against the parsed
//! JSON tree and takes the first non-empty hit, then maps the raw status
//! string into one of four canonical buckets through fixed vocabulary sets.
//!
//! A status outside every vocabulary set becomes [`CanonicalStatus::Unrecognized`],
//! which the pipeline treats as a no-op.

use serde_json::Value;

/// Field paths probed for the internal transaction reference, in priority
/// order.
const REFERENCE_PATHS: &[&[&str]] = &[
    &["order_id"],
    &["data", "order_id"],
    &["reference"],
    &["transaction_reference"],
];

/// Field paths probed for the gateway-assigned transaction id.
const GATEWAY_ID_PATHS: &[&[&str]] = &[
    &["transaction_id"],
    &["data", "transaction_id"],
    &["gateway_transaction_id"],
];

/// Field paths probed for the status string.
const STATUS_PATHS: &[&[&str]] = &[
    &["status"],
    &["data", "status"],
    &["payment_status"],
    &["data", "payment_status"],
    &["event_type"],
    &["event"],
    &["type"],
];

/// Field paths probed for a human-readable failure reason.
const FAILURE_REASON_PATHS: &[&[&str]] =
    &[&["failure_reason"], &["data", "failure_reason"], &["reason"]];

const SUCCESS_STATUSES: &[&str] = &[
    "SUCCESS",
    "SUCCEEDED",
    "COMPLETED",
    "APPROVED",
    "PAID",
    "SETTLED",
    "SUCCESSFUL",
];
const PENDING_STATUSES: &[&str] = &["PENDING", "PROCESSING", "AWAITING", "QUEUED"];
const CANCELLED_STATUSES: &[&str] = &["CANCELLED", "CANCELED"];
const FAILED_STATUSES: &[&str] = &["FAILED", "DECLINED", "ERROR", "REJECTED", "TIMEOUT"];

/// Canonical outcome bucket for a gateway status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalStatus {
    Success,
    Pending,
    Cancelled,
    Failed,
    /// Outside every known vocabulary; processed as a no-op.
    Unrecognized,
}

/// A gateway payload reduced to the fields the pipeline acts on.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    /// Internal transaction reference echoed back by the gateway
    pub reference: Option<String>,

    /// Gateway-assigned transaction id
    pub gateway_id: Option<String>,

    /// Upper-cased raw status string, kept for logging
    pub raw_status: Option<String>,

    /// Canonical bucket the raw status maps into
    pub status: CanonicalStatus,

    /// Failure reason supplied by the gateway, if any
    pub failure_reason: Option<String>,

    /// The raw payload, persisted for forensic replay
    pub payload: Value,
}

/// Reduce a parsed webhook payload to a [`NormalizedEvent`].
pub fn normalize(payload: &Value) -> NormalizedEvent {
    let raw_status = first_value(payload, STATUS_PATHS).map(|s| s.to_uppercase());
    let status = match raw_status.as_deref() {
        Some(raw) => bucket_status(raw),
        None => CanonicalStatus::Unrecognized,
    };

    NormalizedEvent {
        reference: first_value(payload, REFERENCE_PATHS),
        gateway_id: first_value(payload, GATEWAY_ID_PATHS),
        raw_status,
        status,
        failure_reason: first_value(payload, FAILURE_REASON_PATHS),
        payload: payload.clone(),
    }
}

fn bucket_status(raw: &str) -> CanonicalStatus {
    if SUCCESS_STATUSES.contains(&raw) {
        CanonicalStatus::Success
    } else if PENDING_STATUSES.contains(&raw) {
        CanonicalStatus::Pending
    } else if CANCELLED_STATUSES.contains(&raw) {
        CanonicalStatus::Cancelled
    } else if FAILED_STATUSES.contains(&raw) {
        CanonicalStatus::Failed
    } else {
        CanonicalStatus::Unrecognized
    }
}

/// First non-empty value among `paths`, in order.
fn first_value(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| lookup(payload, path).and_then(value_to_string))
}

/// Walk a dotted path through nested JSON objects.
fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Strings and numbers count as values; empty and whitespace-only strings
/// do not. Identifiers occasionally arrive as bare JSON numbers.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_status_maps_to_success() {
        let event = normalize(&json!({"order_id": "R1", "status": "SUCCESS"}));
        assert_eq!(event.status, CanonicalStatus::Success);
        assert_eq!(event.reference.as_deref(), Some("R1"));
    }

    #[test]
    fn equivalent_nestings_produce_the_same_bucket() {
        let shapes = [
            json!({"order_id": "R1", "status": "paid"}),
            json!({"order_id": "R1", "data": {"status": "PAID"}}),
            json!({"order_id": "R1", "payment_status": "Paid"}),
        ];
        for payload in &shapes {
            let event = normalize(payload);
            assert_eq!(event.status, CanonicalStatus::Success, "payload: {payload}");
        }
    }

    #[test]
    fn status_matching_is_case_insensitive() {
        let event = normalize(&json!({"status": "declined"}));
        assert_eq!(event.status, CanonicalStatus::Failed);
        assert_eq!(event.raw_status.as_deref(), Some("DECLINED"));
    }

    #[test]
    fn both_cancelled_spellings_map_to_cancelled() {
        for raw in ["CANCELLED", "canceled"] {
            let event = normalize(&json!({"status": raw}));
            assert_eq!(event.status, CanonicalStatus::Cancelled);
        }
    }

    #[test]
    fn pending_vocabulary_maps_to_pending() {
        for raw in ["PENDING", "processing", "AWAITING", "queued"] {
            let event = normalize(&json!({"status": raw}));
            assert_eq!(event.status, CanonicalStatus::Pending);
        }
    }

    #[test]
    fn unknown_status_is_unrecognized() {
        let event = normalize(&json!({"status": "UNKNOWN_EVENT"}));
        assert_eq!(event.status, CanonicalStatus::Unrecognized);
    }

    #[test]
    fn missing_status_is_unrecognized() {
        let event = normalize(&json!({"order_id": "R1"}));
        assert_eq!(event.status, CanonicalStatus::Unrecognized);
        assert_eq!(event.raw_status, None);
    }

    #[test]
    fn reference_paths_are_probed_in_priority_order() {
        let event = normalize(&json!({
            "order_id": "first",
            "reference": "later",
            "data": {"order_id": "nested"}
        }));
        assert_eq!(event.reference.as_deref(), Some("first"));
    }

    #[test]
    fn nested_reference_is_found_when_top_level_is_absent() {
        let event = normalize(&json!({"data": {"order_id": "R7"}}));
        assert_eq!(event.reference.as_deref(), Some("R7"));
    }

    #[test]
    fn gateway_id_extracted_from_known_paths() {
        let event = normalize(&json!({"data": {"transaction_id": "GW42"}}));
        assert_eq!(event.gateway_id.as_deref(), Some("GW42"));
    }

    #[test]
    fn numeric_identifiers_are_stringified() {
        let event = normalize(&json!({"order_id": 981, "status": "SUCCESS"}));
        assert_eq!(event.reference.as_deref(), Some("981"));
    }

    #[test]
    fn empty_strings_do_not_count_as_values() {
        let event = normalize(&json!({"order_id": "", "reference": "R2"}));
        assert_eq!(event.reference.as_deref(), Some("R2"));
    }

    #[test]
    fn failure_reason_is_extracted() {
        let event = normalize(&json!({
            "transaction_id": "GW9",
            "status": "FAILED",
            "failure_reason": "insufficient_funds"
        }));
        assert_eq!(event.status, CanonicalStatus::Failed);
        assert_eq!(event.failure_reason.as_deref(), Some("insufficient_funds"));
    }

    #[test]
    fn event_type_field_is_a_status_source() {
        let event = normalize(&json!({"order_id": "R1", "event_type": "settled"}));
        assert_eq!(event.status, CanonicalStatus::Success);
    }
}
