use crate::core::{BagMessage, Value, VirtualTime};
use crate::input::{IngestionResult, Record};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Decoded log exported as one JSON document:
///
/// ```json
/// {
///   "start_time": {"sec": 0, "nsec": 0},
///   "end_time": {"sec": 10, "nsec": 0},
///   "connections": {"/x": "std_msgs/Float64"},
///   "records": [{"topic": "/x", "message": {"header": {"stamp": {"sec": 2, "nsec": 0}}, "data": 1.0}}]
/// }
/// ```
///
/// Bounds default to the span of the record stamps when omitted.
#[derive(Deserialize)]
struct JsonLog {
    start_time: Option<VirtualTime>,
    end_time: Option<VirtualTime>,
    #[serde(default)]
    connections: BTreeMap<String, String>,
    records: Vec<JsonRecord>,
}

#[derive(Deserialize)]
struct JsonRecord {
    topic: String,
    message: Value,
}

pub fn parse_json(data: &[u8]) -> Result<IngestionResult> {
    let log: JsonLog = serde_json::from_slice(data).context("Failed to parse JSON log")?;

    let records = log
        .records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let message = BagMessage::from_value(r.message)
                .with_context(|| format!("Record {} on topic {}", i, r.topic))?;
            Ok(Record { topic: r.topic, message })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = IngestionResult::from_records(log.connections, records);
    if let Some(start) = log.start_time {
        result.start_time = start;
    }
    if let Some(end) = log.end_time {
        result.end_time = end;
    }
    Ok(result)
}
