// src/time.rs

//! Block time.
//!
//! All time inside the state machine is the block header time, held as
//! nanoseconds since the Unix epoch. Genesis and query output render it as
//! RFC 3339; store keys use the big-endian nanosecond count so that
//! lexicographic order matches chronological order.

use crate::errors::NmxError;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Nanoseconds in one day
pub const NANOS_PER_DAY: u128 = 86_400 * 1_000_000_000;

/// UTC instant with nanosecond resolution
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Unix epoch
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Latest representable instant; used for permanent jail
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Creates a timestamp from Unix nanoseconds
    pub const fn from_unix_nanos(nanos: i64) -> Self {
        Timestamp(nanos)
    }

    /// Creates a timestamp from Unix seconds
    pub const fn from_unix_secs(secs: i64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000_000))
    }

    /// Unix nanoseconds
    pub const fn unix_nanos(&self) -> i64 {
        self.0
    }

    /// Instant `d` later, saturating at [`Timestamp::MAX`]
    pub fn add(self, d: Duration) -> Timestamp {
        let nanos = i64::try_from(d.as_nanos()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(nanos))
    }

    /// Time elapsed since `earlier`; zero if `earlier` is in the future
    pub fn since(self, earlier: Timestamp) -> Duration {
        let diff = self.0.saturating_sub(earlier.0);
        if diff <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(diff as u64)
        }
    }

    /// Big-endian key encoding; pre-epoch instants sort as the epoch
    pub fn to_key_bytes(&self) -> [u8; 8] {
        (self.0.max(0) as u64).to_be_bytes()
    }

    /// Decodes [`Timestamp::to_key_bytes`]
    pub fn from_key_bytes(bytes: [u8; 8]) -> Self {
        Timestamp(u64::from_be_bytes(bytes).min(i64::MAX as u64) as i64)
    }

    /// RFC 3339 rendering with nanoseconds
    pub fn to_rfc3339(&self) -> String {
        Utc.timestamp_nanos(self.0)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// Whole days contained in a duration
pub fn whole_days(d: Duration) -> u64 {
    (d.as_nanos() / NANOS_PER_DAY) as u64
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self)
    }
}

impl FromStr for Timestamp {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = DateTime::parse_from_rfc3339(s)
            .map_err(|e| NmxError::InvalidMessage(format!("invalid time {:?}: {}", s, e)))?;
        parsed
            .with_timezone(&Utc)
            .timestamp_nanos_opt()
            .map(Timestamp)
            .ok_or_else(|| NmxError::InvalidMessage(format!("time out of range: {}", s)))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_rfc3339())
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            Ok(Timestamp(i64::deserialize(deserializer)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_roundtrip() {
        let t = Timestamp::from_unix_nanos(1_700_000_000_123_456_789);
        let s = t.to_string();
        assert!(s.ends_with('Z'));
        assert_eq!(s.parse::<Timestamp>().unwrap(), t);
    }

    #[test]
    fn test_whole_days() {
        let start = Timestamp::from_unix_secs(1_000);
        let later = start.add(Duration::from_secs(86_400 * 2 + 3_600));
        assert_eq!(whole_days(later.since(start)), 2);
        assert_eq!(start.since(later), Duration::ZERO);
    }

    #[test]
    fn test_key_bytes_sort_chronologically() {
        let a = Timestamp::from_unix_secs(10);
        let b = Timestamp::from_unix_secs(11);
        assert!(a.to_key_bytes() < b.to_key_bytes());
        assert_eq!(Timestamp::from_key_bytes(b.to_key_bytes()), b);
    }

    #[test]
    fn test_add_saturates() {
        assert_eq!(Timestamp::MAX.add(Duration::from_secs(1)), Timestamp::MAX);
    }

    #[test]
    fn test_json_is_rfc3339() {
        let t = Timestamp::from_unix_secs(0);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"1970-01-01T00:00:00Z\"");
    }
}
