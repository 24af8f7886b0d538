//! Late-arrival and early-departure verdicts for each user-day.

use super::aggregator::{Aggregation, DailyAggregate};
use super::format::clock_12h;
use crate::models::{AttendanceSettings, DetailedRecord};

/// Verdicts shared by every punch of one user-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayVerdict {
    pub is_late_arrival: bool,
    pub is_early_departure: bool,
}

/// Compare a day's window against the grace boundaries.
///
/// Both comparisons are strict: a first punch exactly at the grace start is on
/// time, and a last punch exactly at the grace end is not early.
pub fn classify(day: &DailyAggregate, settings: &AttendanceSettings) -> DayVerdict {
    DayVerdict {
        is_late_arrival: day.first_punch > settings.grace_start(),
        is_early_departure: day.last_punch < settings.grace_end(),
    }
}

/// Stamp every punch with its day's verdict and first/last punch strings.
///
/// Records come out grouped by key, each group in punch-time order.
pub fn expand(aggregation: &Aggregation, settings: &AttendanceSettings) -> Vec<DetailedRecord> {
    let mut records = Vec::with_capacity(aggregation.punch_count());

    for ((name, date), group) in &aggregation.days {
        let verdict = classify(&group.aggregate, settings);
        let first_punch = clock_12h(group.aggregate.first_punch);
        let last_punch = clock_12h(group.aggregate.last_punch);

        let mut punches: Vec<_> = group.punches.iter().collect();
        punches.sort_by_key(|p| p.time);

        records.extend(punches.into_iter().map(|punch| DetailedRecord {
            uid: punch.uid.clone(),
            name: name.clone(),
            date: group.aggregate.human_readable_date.clone(),
            time: clock_12h(punch.time),
            is_late_arrival: verdict.is_late_arrival,
            is_early_departure: verdict.is_early_departure,
            first_punch: first_punch.clone(),
            last_punch: last_punch.clone(),
            calendar_date: *date,
            punch_time: punch.time,
        }));
    }

    records
}
