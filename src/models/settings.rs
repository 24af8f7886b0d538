//! Office hours and grace period used to classify a day's punches.

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Settings for attendance classification, fixed for one report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSettings {
    #[serde(with = "hhmm", default = "default_office_start")]
    pub office_start: NaiveTime,
    #[serde(with = "hhmm", default = "default_office_end")]
    pub office_end: NaiveTime,
    #[serde(default = "default_grace_period")]
    pub grace_period_minutes: u32,
}

fn default_office_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_office_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_grace_period() -> u32 {
    15
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            office_start: default_office_start(),
            office_end: default_office_end(),
            grace_period_minutes: default_grace_period(),
        }
    }
}

impl AttendanceSettings {
    fn grace(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.grace_period_minutes))
    }

    /// Latest first punch that is not late. Wraps past midnight.
    pub fn grace_start(&self) -> NaiveTime {
        self.office_start + self.grace()
    }

    /// Earliest last punch that is not an early departure. Wraps past midnight.
    ///
    /// The grace period is added to the office end time as well, so this
    /// boundary sits after closing time.
    pub fn grace_end(&self) -> NaiveTime {
        self.office_end + self.grace()
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) wall-clock time.
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Serde adapter for `HH:MM` time strings.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_clock(&s).ok_or_else(|| de::Error::custom(format!("invalid time '{s}', expected HH:MM")))
    }
}
