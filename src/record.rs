//! Data model for entries in the remote log store
//!
//! The producer appends one record per reading. Records are immutable once
//! written; the monitor only ever reads the most recent one and deletes the
//! occasional future-dated anomaly.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in the external log store
///
/// The producer writes `timestamp` as epoch seconds already shifted by its
/// local UTC offset, so all comparisons against wall-clock time must go
/// through [`Record::utc_time`]. Fields beyond the two the monitor cares
/// about are preserved in `extra` so they survive re-serialization and stay
/// visible in debug output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Epoch seconds carrying the source's local UTC offset
    pub timestamp: i64,
    /// Whether the producing device reports it has just rebooted
    #[serde(default)]
    pub reboot: bool,
    /// Remaining producer fields (sensor readings etc.), passed through as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A [`Record`] together with its store-assigned key
///
/// The key is the deletion handle: garbage collection removes exactly one
/// record, addressed by this key.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub key: String,
    pub record: Record,
}

impl Record {
    /// Normalize the producer-local timestamp into UTC.
    ///
    /// Timestamps outside chrono's representable range saturate instead of
    /// failing, which keeps absurd future-dated garbage comparable.
    pub fn utc_time(&self, source_offset: FixedOffset) -> DateTime<Utc> {
        let secs = self.timestamp - i64::from(source_offset.local_minus_utc());
        DateTime::from_timestamp(secs, 0).unwrap_or(if secs > 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
    }
}

impl Datapoint {
    pub fn new(key: impl Into<String>, record: Record) -> Self {
        Self {
            key: key.into(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_deserialization_with_extra_fields() {
        let json = r#"{"timestamp": 1700000000, "reboot": true, "temperature": 21.5, "humidity": 40}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        assert_eq!(record.timestamp, 1700000000);
        assert!(record.reboot);
        assert_eq!(record.extra["temperature"], 21.5);
        assert_eq!(record.extra["humidity"], 40);
    }

    #[test]
    fn test_record_reboot_defaults_to_false() {
        let json = r#"{"timestamp": 1700000000}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        assert!(!record.reboot);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_record_serialization_round_trip_preserves_extra() {
        let json = r#"{"timestamp": 1700000000, "reboot": false, "co2": 417}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        let serialized = serde_json::to_string(&record).unwrap();
        let round_tripped: Record = serde_json::from_str(&serialized).unwrap();
        assert_eq!(record, round_tripped);
    }

    #[test]
    fn test_utc_time_subtracts_source_offset() {
        // Producer at UTC+3 writes local-epoch seconds; normalization must
        // land three hours earlier in UTC.
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let record = Record {
            timestamp: 1700000000,
            reboot: false,
            extra: serde_json::Map::new(),
        };

        let expected = Utc.timestamp_opt(1700000000 - 10800, 0).unwrap();
        assert_eq!(record.utc_time(offset), expected);
    }

    #[test]
    fn test_utc_time_zero_offset_is_identity() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let record = Record {
            timestamp: 1700000000,
            reboot: false,
            extra: serde_json::Map::new(),
        };

        assert_eq!(record.utc_time(offset).timestamp(), 1700000000);
    }

    #[test]
    fn test_utc_time_saturates_out_of_range() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let record = Record {
            timestamp: i64::MAX,
            reboot: false,
            extra: serde_json::Map::new(),
        };

        assert_eq!(record.utc_time(offset), DateTime::<Utc>::MAX_UTC);
    }
}
