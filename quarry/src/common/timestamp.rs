use crate::common::current_epoch_micros;
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Display};

/// The store-native timestamp: whole seconds plus microseconds since the
/// unix epoch.
///
/// Records persist `created_at`, `updated_at` and any date/time value as a
/// `Timestamp`, and convert it back to a UTC [DateTime] when the field is
/// read.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, Default, serde::Deserialize, serde::Serialize)]
pub struct Timestamp {
    seconds: i64,
    micros: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, micros: u32) -> Self {
        Timestamp {
            seconds,
            micros: micros % 1_000_000,
        }
    }

    pub fn now() -> Self {
        let (seconds, micros) = current_epoch_micros();
        Timestamp { seconds, micros }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Timestamp { seconds, micros: 0 }
    }

    pub fn from_datetime(date_time: &DateTime<Utc>) -> Self {
        Timestamp {
            seconds: date_time.timestamp(),
            micros: date_time.timestamp_subsec_micros() % 1_000_000,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn micros(&self) -> u32 {
        self.micros
    }

    /// Whether the timestamp falls inside the range of a UTC [DateTime].
    pub fn is_representable(&self) -> bool {
        DateTime::from_timestamp(self.seconds, self.micros * 1_000).is_some()
    }

    /// Converts to a UTC date/time. Records reject timestamps that are not
    /// representable; raw store values out of range read as the unix epoch.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.seconds, self.micros * 1_000).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp::from_datetime(&value)
    }
}

impl Debug for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timestamp({}, {})", self.seconds, self.micros)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}
