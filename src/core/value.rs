use crate::core::time::VirtualTime;
use crate::error::{BagpiperError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Virtual path segment that combines a `{sec, nsec}` map into fractional seconds
pub const COMBINED_TIME_KEY: &str = "combined_time";

/// Decoded message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Look up a single child: a map key, or an index into an array
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Look up a slash-separated path such as `/header/stamp/sec`.
    ///
    /// Empty segments are skipped, so leading, trailing and doubled slashes
    /// are accepted.
    pub fn lookup(&self, path: &str) -> Result<&Value> {
        let mut value = self;
        for key in path.split('/').filter(|k| !k.is_empty()) {
            value = value.get(key).ok_or_else(|| field_not_found(path))?;
        }
        Ok(value)
    }

    /// Resolve a path to a value, honoring the `combined_time` virtual key.
    ///
    /// A path that ends on `Null` is treated as missing.
    pub fn resolve(&self, path: &str) -> Result<Value> {
        let mut value = self;
        for key in path.split('/').filter(|k| !k.is_empty()) {
            if key == COMBINED_TIME_KEY {
                return VirtualTime::from_value(value)
                    .map(|t| Value::Float(t.as_secs_f64()))
                    .ok_or_else(|| field_not_found(path));
            }
            value = value.get(key).ok_or_else(|| field_not_found(path))?;
        }
        match value {
            Value::Null => Err(field_not_found(path)),
            v => Ok(v.clone()),
        }
    }

    /// List every leaf path of this value, plus a `combined_time` path for
    /// each nested time map. Used to offer field choices for a topic.
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(self, "", &mut paths);
        paths
    }

    /// Infer a scalar from text, as found in CSV cells
    pub fn parse_scalar(text: &str) -> Value {
        let text = text.trim();
        if text.is_empty() {
            return Value::Null;
        }
        if let Ok(b) = text.parse::<bool>() {
            return Value::Bool(b);
        }
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
        Value::String(text.to_string())
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Float(v) if *v >= 0.0 && v.fract() == 0.0 && *v < u64::MAX as f64 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn is_time(&self) -> bool {
        VirtualTime::from_value(self).is_some()
    }
}

impl From<VirtualTime> for Value {
    fn from(t: VirtualTime) -> Self {
        let mut map = BTreeMap::new();
        let sec = i64::try_from(t.sec).map_or(Value::Float(t.sec as f64), Value::Int);
        map.insert("sec".to_string(), sec);
        map.insert("nsec".to_string(), Value::Int(t.nsec as i64));
        Value::Map(map)
    }
}

fn field_not_found(path: &str) -> BagpiperError {
    BagpiperError::FieldNotFound { path: path.to_string() }
}

fn collect_paths(value: &Value, prefix: &str, paths: &mut Vec<String>) {
    match value {
        Value::Map(map) => {
            for (key, child) in map {
                collect_paths(child, &format!("{}/{}", prefix, key), paths);
            }
            if value.is_time() {
                paths.push(format!("{}/{}", prefix, COMBINED_TIME_KEY));
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_paths(child, &format!("{}/{}", prefix, i), paths);
            }
        }
        _ => paths.push(prefix.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        serde_json::from_str(
            r#"{
                "header": {"stamp": {"sec": 3, "nsec": 500000000}, "frame_id": "base"},
                "ranges": [1.5, 2.5],
                "ok": true,
                "note": null
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_untagged_deserialize() {
        let v = sample();
        assert_eq!(v.lookup("/header/frame_id").unwrap(), &Value::String("base".into()));
        assert_eq!(v.lookup("header/stamp/sec").unwrap(), &Value::Int(3));
        assert_eq!(v.lookup("/ranges/1").unwrap(), &Value::Float(2.5));
        assert_eq!(v.lookup("/ok").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn test_lookup_missing_path() {
        let err = sample().lookup("/header/seq").unwrap_err();
        assert!(matches!(err, BagpiperError::FieldNotFound { ref path } if path == "/header/seq"));
        assert!(sample().lookup("/ranges/7").is_err());
    }

    #[test]
    fn test_resolve_combined_time() {
        let v = sample();
        assert_eq!(v.resolve("/header/stamp/combined_time").unwrap(), Value::Float(3.5));
        assert!(v.resolve("/header/combined_time").is_err());
    }

    #[test]
    fn test_resolve_null_is_missing() {
        assert!(sample().resolve("/note").is_err());
        assert!(sample().lookup("/note").is_ok());
    }

    #[test]
    fn test_field_paths() {
        let paths = sample().field_paths();
        assert!(paths.contains(&"/header/stamp/sec".to_string()));
        assert!(paths.contains(&"/header/stamp/combined_time".to_string()));
        assert!(paths.contains(&"/ranges/0".to_string()));
        assert!(paths.contains(&"/ok".to_string()));
        assert!(!paths.contains(&"/header/combined_time".to_string()));
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(Value::parse_scalar("42"), Value::Int(42));
        assert_eq!(Value::parse_scalar("-0.5"), Value::Float(-0.5));
        assert_eq!(Value::parse_scalar("false"), Value::Bool(false));
        assert_eq!(Value::parse_scalar(" left "), Value::String("left".into()));
        assert_eq!(Value::parse_scalar(""), Value::Null);
    }

    #[test]
    fn test_large_stamp_survives_value_encoding() {
        let t = VirtualTime::new(1 << 63, 5);
        let value = Value::from(t);
        assert_eq!(value.get("sec"), Some(&Value::Float(9_223_372_036_854_775_808.0)));
        assert_eq!(VirtualTime::from_value(&value), Some(t));

        let small = Value::from(VirtualTime::new(7, 0));
        assert_eq!(small.get("sec"), Some(&Value::Int(7)));
    }
}
