//! Request body encoding for batch delivery.
//!
//! A batch is a JSON array, one object per queued record, in ascending
//! sequence-id order. Each object is the record's payload with
//! `sequence_id`, `captured_at` and (if missing) `hostname` added, so the
//! collector can deduplicate re-sent records on `(hostname, sequence_id)`.

use pulse_common::types::MetricRecord;
use serde_json::{Map, Value};

pub fn encode_batch(records: &[MetricRecord], hostname: &str) -> serde_json::Result<Vec<u8>> {
    let items: Vec<Value> = records
        .iter()
        .map(|record| wire_item(record, hostname))
        .collect();
    serde_json::to_vec(&items)
}

fn wire_item(record: &MetricRecord, hostname: &str) -> Value {
    let mut fields = match &record.payload {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("payload".to_string(), other.clone());
            map
        }
    };
    fields.insert("sequence_id".to_string(), Value::from(record.sequence_id));
    fields.insert("captured_at".to_string(), Value::from(record.captured_at));
    fields
        .entry("hostname")
        .or_insert_with(|| Value::String(hostname.to_string()));
    Value::Object(fields)
}
