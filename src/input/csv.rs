use anyhow::{Context, Result};
use crate::core::{BagMessage, Value, VirtualTime};
use crate::input::{IngestionResult, Record};
use std::collections::BTreeMap;

/// Type name recorded for topics of a CSV log without a type column
pub const UNKNOWN_TYPE: &str = "unknown";

/// Decode a CSV log
///
/// Required columns (matched case-insensitively):
/// - time: `time`, `timestamp`, `t` or `ts`, in seconds
/// - topic: `topic` or `channel`
///
/// An optional `type`/`msg_type`/`datatype` column names the message type.
/// Every other column becomes a payload field of the row's message.
pub fn parse_csv(data: &[u8]) -> Result<IngestionResult> {
    let mut rdr = csv::Reader::from_reader(data);

    let headers = rdr.headers()?.clone();
    let columns = detect_columns(&headers)?;

    let mut connections = BTreeMap::new();
    let mut records = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV row")?;

        let time = record
            .get(columns.time)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .with_context(|| format!("Row {}: missing or invalid time", row + 1))?;

        let topic = record
            .get(columns.topic)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .with_context(|| format!("Row {}: missing topic", row + 1))?
            .to_string();

        let type_name = columns
            .type_name
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_TYPE);
        connections
            .entry(topic.clone())
            .or_insert_with(|| type_name.to_string());

        let fields = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(idx, _)| !columns.is_reserved(*idx))
            .map(|(_, (name, cell))| (name.to_string(), Value::parse_scalar(cell)))
            .collect();

        let message = BagMessage::new(VirtualTime::from_secs_f64(time), fields);
        records.push(Record { topic, message });
    }

    Ok(IngestionResult::from_records(connections, records))
}

struct Columns {
    time: usize,
    topic: usize,
    type_name: Option<usize>,
}

impl Columns {
    fn is_reserved(&self, idx: usize) -> bool {
        idx == self.time || idx == self.topic || Some(idx) == self.type_name
    }
}

/// Detect column indices from CSV headers
fn detect_columns(headers: &csv::StringRecord) -> Result<Columns> {
    Ok(Columns {
        time: find_column(headers, &["time", "timestamp", "t", "ts"])?,
        topic: find_column(headers, &["topic", "channel"])?,
        type_name: find_column(headers, &["type", "msg_type", "datatype"]).ok(),
    })
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    for (idx, header) in headers.iter().enumerate() {
        let header_lower = header.trim().to_lowercase();
        if names.iter().any(|&name| header_lower == name) {
            return Ok(idx);
        }
    }

    anyhow::bail!("Could not find column with names: {:?}", names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows() {
        let data = b"Time,Topic,type,speed,gear\n\
                     1.5,/car,car_msgs/State,12.5,3\n\
                     0.25,/car,,13.0,drive\n\
                     2.0,/imu,,0.1,\n";
        let result = parse_csv(data).unwrap();

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.start_time, VirtualTime::new(0, 250_000_000));
        assert_eq!(result.end_time, VirtualTime::new(2, 0));
        assert_eq!(result.connections["/car"], "car_msgs/State");
        assert_eq!(result.connections["/imu"], UNKNOWN_TYPE);

        let first = &result.records[0].message;
        assert_eq!(first.stamp(), VirtualTime::new(1, 500_000_000));
        assert_eq!(first.field("/speed").unwrap(), Value::Float(12.5));
        assert_eq!(first.field("/gear").unwrap(), Value::Int(3));
        assert!(first.field("/type").is_err());
        assert!(first.field("/Time").is_err());
    }

    #[test]
    fn test_missing_topic_column() {
        let data = b"time,value\n0.1,3\n";
        assert!(parse_csv(data).is_err());
    }

    #[test]
    fn test_bad_time() {
        let data = b"ts,channel\nsoon,/x\n";
        let err = parse_csv(data).unwrap_err();
        assert!(err.to_string().contains("Row 1"));
    }
}
