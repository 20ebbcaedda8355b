use crate::core::time::VirtualTime;
use crate::core::value::Value;
use crate::error::{BagpiperError, Result};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A decoded log message
///
/// Holds the full decoded body and the `header.stamp` read out of it at
/// ingestion time, so playback never has to dig through the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BagMessage {
    stamp: VirtualTime,
    body: Value,
}

impl BagMessage {
    /// Wrap a decoded body, which must carry `header.stamp`
    pub fn from_value(body: Value) -> Result<Self> {
        let stamp = body
            .lookup("header/stamp")
            .ok()
            .and_then(VirtualTime::from_value)
            .ok_or(BagpiperError::MissingTimestamp)?;
        Ok(Self { stamp, body })
    }

    /// Build a message from payload fields, stamped at `stamp`
    pub fn new(stamp: VirtualTime, fields: BTreeMap<String, Value>) -> Self {
        let mut header = match fields.get("header") {
            Some(Value::Map(h)) => h.clone(),
            _ => BTreeMap::new(),
        };
        header.insert("stamp".to_string(), stamp.into());

        let mut body = fields;
        body.insert("header".to_string(), Value::Map(header));
        Self {
            stamp,
            body: Value::Map(body),
        }
    }

    /// Message with an empty payload
    pub fn stamped(stamp: VirtualTime) -> Self {
        Self::new(stamp, BTreeMap::new())
    }

    pub fn stamp(&self) -> VirtualTime {
        self.stamp
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Resolve a field path against the body
    pub fn field(&self, path: &str) -> Result<Value> {
        self.body.resolve(path)
    }
}

impl Serialize for BagMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}
