use crate::core::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A (seconds, nanoseconds) timestamp used both for log stamps and for the
/// playback position relative to the log start.
///
/// The nanosecond component is always kept below one second, so the derived
/// ordering (seconds first, then nanoseconds) is the chronological one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTime")]
pub struct VirtualTime {
    pub sec: u64,
    pub nsec: u32,
}

/// Wire form of a time, normalized on the way in
#[derive(Deserialize)]
struct RawTime {
    #[serde(alias = "secs")]
    sec: u64,
    #[serde(alias = "nsecs")]
    nsec: u64,
}

impl TryFrom<RawTime> for VirtualTime {
    type Error = String;

    fn try_from(raw: RawTime) -> Result<Self, Self::Error> {
        VirtualTime::checked_new(raw.sec, raw.nsec)
            .ok_or_else(|| format!("time {}s + {}ns overflows the seconds counter", raw.sec, raw.nsec))
    }
}

impl VirtualTime {
    pub const ZERO: VirtualTime = VirtualTime { sec: 0, nsec: 0 };
    pub const MAX: VirtualTime = VirtualTime {
        sec: u64::MAX,
        nsec: (NANOS_PER_SEC - 1) as u32,
    };

    /// Create a time, rolling nanosecond overflow into seconds.
    /// Saturates at the largest representable time.
    pub fn new(sec: u64, nsec: u64) -> Self {
        Self::checked_new(sec, nsec).unwrap_or(Self::MAX)
    }

    /// Like [`VirtualTime::new`], but `None` when the carry overflows
    pub fn checked_new(sec: u64, nsec: u64) -> Option<Self> {
        Some(Self {
            sec: sec.checked_add(nsec / NANOS_PER_SEC)?,
            nsec: (nsec % NANOS_PER_SEC) as u32,
        })
    }

    pub fn from_secs(sec: u64) -> Self {
        Self { sec, nsec: 0 }
    }

    /// Convert fractional seconds; negative input clamps to zero
    pub fn from_secs_f64(secs: f64) -> Self {
        let secs = secs.max(0.0);
        let whole = secs.trunc();
        let nanos = ((secs - whole) * NANOS_PER_SEC as f64).round() as u64;
        Self::new(whole as u64, nanos)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 / NANOS_PER_SEC as f64
    }

    /// Advance by `nanos` nanoseconds.
    ///
    /// Returns the number of whole seconds the nanosecond component rolled
    /// over into the seconds component.
    pub fn advance(&mut self, nanos: u64) -> u64 {
        let total = nanos.saturating_add(self.nsec as u64);
        let rollovers = total / NANOS_PER_SEC;
        if self.sec.checked_add(rollovers).is_none() {
            *self = Self::MAX;
            return rollovers;
        }
        self.sec += rollovers;
        self.nsec = (total % NANOS_PER_SEC) as u32;
        rollovers
    }

    /// Read a time out of a `{sec, nsec}` or `{secs, nsecs}` map
    pub fn from_value(value: &Value) -> Option<Self> {
        let sec = value.get("sec").or_else(|| value.get("secs"))?.as_u64()?;
        let nsec = value.get("nsec").or_else(|| value.get("nsecs"))?.as_u64()?;
        Self::checked_new(sec, nsec)
    }

    /// Interpret this time as seconds since the Unix epoch
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.sec).ok()?, self.nsec)
    }
}

impl Add for VirtualTime {
    type Output = VirtualTime;

    fn add(self, rhs: VirtualTime) -> VirtualTime {
        match self.sec.checked_add(rhs.sec) {
            Some(sec) => VirtualTime::new(sec, self.nsec as u64 + rhs.nsec as u64),
            None => VirtualTime::MAX,
        }
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_new_normalizes_overflow() {
        let t = VirtualTime::new(1, 2_500_000_000);
        assert_eq!(t, VirtualTime { sec: 3, nsec: 500_000_000 });
    }

    #[test]
    fn test_advance_reports_rollovers() {
        let mut t = VirtualTime::new(0, 900_000_000);
        assert_eq!(t.advance(50_000_000), 0);
        assert_eq!(t.nsec, 950_000_000);

        assert_eq!(t.advance(100_000_000), 1);
        assert_eq!(t, VirtualTime::new(1, 50_000_000));

        assert_eq!(t.advance(2 * NANOS_PER_SEC), 2);
        assert_eq!(t, VirtualTime::new(3, 50_000_000));
    }

    #[test]
    fn test_add_carries_nanoseconds() {
        let a = VirtualTime::new(10, 600_000_000);
        let b = VirtualTime::new(2, 700_000_000);
        assert_eq!(a + b, VirtualTime::new(13, 300_000_000));
    }

    #[test]
    fn test_arithmetic_saturates() {
        assert_eq!(VirtualTime::new(u64::MAX, 1_000_000_000), VirtualTime::MAX);
        assert_eq!(VirtualTime::checked_new(u64::MAX, 1_000_000_000), None);
        assert_eq!(VirtualTime::from_secs(u64::MAX) + VirtualTime::from_secs(1), VirtualTime::MAX);
        assert_eq!(
            VirtualTime::new(u64::MAX, 999_999_999) + VirtualTime::new(0, 1),
            VirtualTime::MAX
        );

        let mut t = VirtualTime::new(u64::MAX, 500_000_000);
        assert_eq!(t.advance(NANOS_PER_SEC), 1);
        assert_eq!(t, VirtualTime::MAX);
    }

    #[test]
    fn test_deserialize_rejects_overflowing_time() {
        let err = serde_json::from_str::<VirtualTime>(r#"{"sec": 18446744073709551615, "nsec": 1000000000}"#)
            .unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_ordering() {
        assert!(VirtualTime::new(1, 999_999_999) < VirtualTime::new(2, 0));
        assert!(VirtualTime::new(2, 1) > VirtualTime::new(2, 0));
    }

    #[test]
    fn test_from_secs_f64() {
        assert_eq!(VirtualTime::from_secs_f64(2.25), VirtualTime::new(2, 250_000_000));
        assert_eq!(VirtualTime::from_secs_f64(-4.0), VirtualTime::ZERO);
    }

    #[test]
    fn test_from_value_accepts_both_spellings() {
        let mut map = BTreeMap::new();
        map.insert("secs".to_string(), Value::Int(4));
        map.insert("nsecs".to_string(), Value::Int(7));
        assert_eq!(VirtualTime::from_value(&Value::Map(map)), Some(VirtualTime::new(4, 7)));

        let json: Value = serde_json::from_str(r#"{"sec": 1, "nsec": 2}"#).unwrap();
        assert_eq!(VirtualTime::from_value(&json), Some(VirtualTime::new(1, 2)));
        assert_eq!(VirtualTime::from_value(&Value::Int(3)), None);
    }

    #[test]
    fn test_serde_aliases() {
        let t: VirtualTime = serde_json::from_str(r#"{"secs": 5, "nsecs": 10}"#).unwrap();
        assert_eq!(t, VirtualTime::new(5, 10));
        assert_eq!(serde_json::to_string(&t).unwrap(), r#"{"sec":5,"nsec":10}"#);

        let t: VirtualTime = serde_json::from_str(r#"{"sec": 1, "nsec": 1500000000}"#).unwrap();
        assert_eq!(t, VirtualTime::new(2, 500_000_000));
    }
}
