//! Attendance aggregation engine.
//!
//! Turns one complete batch of raw punches into an [`AttendanceReport`]:
//! punches are grouped per user and day, each day is classified against the
//! office hours, and the result is summarized.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDateTime;
//! use zk_attendance_report::engine::build_report;
//! use zk_attendance_report::models::{AttendanceSettings, RawPunch, UserDirectory};
//!
//! let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap();
//! let directory: UserDirectory = [(1, "Ali".to_string())].into_iter().collect();
//! let punches = vec![RawPunch::new("1", at("2025-04-21 09:20"))];
//!
//! let report = build_report(&punches, &directory, &AttendanceSettings::default());
//! assert_eq!(report.summary[0].first_punch, "09:20 AM");
//! ```

pub mod aggregator;
pub mod builder;
pub mod classifier;
pub mod format;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::models::{AttendanceReport, AttendanceSettings, RawPunch, UserDirectory};

pub use aggregator::{Aggregation, DailyAggregate, MalformedPunch, ResolvedPunch, aggregate};
pub use classifier::{DayVerdict, classify};

/// Build a report stamped with the current local time.
pub fn build_report(
    punches: &[RawPunch],
    directory: &UserDirectory,
    settings: &AttendanceSettings,
) -> AttendanceReport {
    build_report_at(punches, directory, settings, Local::now())
}

/// Build a report with an explicit generation timestamp.
///
/// Never fails: malformed punches are dropped and counted, and an empty batch
/// yields an empty report.
pub fn build_report_at(
    punches: &[RawPunch],
    directory: &UserDirectory,
    settings: &AttendanceSettings,
    generated_at: DateTime<Local>,
) -> AttendanceReport {
    debug!(
        "Building report: {} punches, grace start {}, grace end {}",
        punches.len(),
        settings.grace_start(),
        settings.grace_end()
    );

    let aggregation = aggregator::aggregate(punches, directory);
    let mut detailed = classifier::expand(&aggregation, settings);
    builder::sort_detailed(&mut detailed);
    let summary = builder::summarize(&detailed);
    let metadata = builder::metadata(&detailed, aggregation.skipped, generated_at);

    info!(
        "Report built: {} records, {} employees, {} user-days, {} skipped",
        metadata.total_records,
        metadata.total_employees,
        summary.len(),
        metadata.skipped_records
    );

    AttendanceReport {
        summary,
        detailed,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, NaiveTime};
    use std::collections::{HashMap, HashSet};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn directory() -> UserDirectory {
        [(1, "Ali".to_string()), (2, "Sara".to_string()), (3, "Omar".to_string())]
            .into_iter()
            .collect()
    }

    fn sample_punches() -> Vec<RawPunch> {
        vec![
            RawPunch::new("2", at("2025-04-22 08:50")),
            RawPunch::new("1", at("2025-04-21 17:05")),
            RawPunch::new("3", at("2025-04-21 09:15")),
            RawPunch::new("1", at("2025-04-21 09:20")),
            RawPunch::new("x", at("2025-04-21 09:00")),
            RawPunch::new("2", at("2025-04-22 17:30")),
            RawPunch::new("1", at("2025-04-21 09:40")),
            RawPunch::new("77", at("2025-04-22 10:00")),
            RawPunch {
                user_id: "3".to_string(),
                timestamp: None,
            },
            RawPunch::new("3", at("2025-04-21 18:00")),
        ]
    }

    #[test]
    fn test_ali_scenario() {
        let punches = vec![
            RawPunch::new("1", at("2025-04-21 09:20")),
            RawPunch::new("1", at("2025-04-21 09:40")),
            RawPunch::new("1", at("2025-04-21 17:05")),
        ];
        let settings = AttendanceSettings {
            office_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            office_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_period_minutes: 15,
        };
        let report = build_report(&punches, &directory(), &settings);

        assert_eq!(report.summary.len(), 1);
        let row = &report.summary[0];
        assert_eq!(row.name, "Ali");
        assert_eq!(row.date, "21 April Monday 2025");
        assert!(row.is_late_arrival);
        assert!(row.is_early_departure);
        assert_eq!(row.punch_count, 3);
        assert_eq!(row.first_punch, "09:20 AM");
        assert_eq!(row.last_punch, "05:05 PM");
    }

    #[test]
    fn test_exact_grace_start_is_on_time() {
        let punches = vec![RawPunch::new("1", at("2025-04-21 09:15"))];
        let report = build_report(&punches, &directory(), &AttendanceSettings::default());
        assert!(!report.detailed[0].is_late_arrival);
    }

    #[test]
    fn test_empty_batch() {
        let report = build_report(&[], &directory(), &AttendanceSettings::default());
        assert!(report.is_empty());
        assert!(report.summary.is_empty());
        assert_eq!(report.metadata.total_records, 0);
        assert_eq!(report.metadata.total_employees, 0);
        assert_eq!(report.metadata.date_range.start, None);
    }

    #[test]
    fn test_only_malformed_punches() {
        let punches = vec![RawPunch::new("", at("2025-04-21 09:15")), RawPunch::new("1.5", at("2025-04-21 09:15"))];
        let report = build_report(&punches, &directory(), &AttendanceSettings::default());
        assert!(report.is_empty());
        assert_eq!(report.metadata.skipped_records, 2);
    }

    #[test]
    fn test_unknown_user_is_counted() {
        let punches = vec![RawPunch::new("77", at("2025-04-21 08:00"))];
        let report = build_report(&punches, &directory(), &AttendanceSettings::default());
        assert_eq!(report.detailed[0].name, "Unknown");
        assert_eq!(report.summary[0].punch_count, 1);
        assert_eq!(report.metadata.total_employees, 1);
    }

    #[test]
    fn test_report_invariants() {
        let punches = sample_punches();
        let report = build_report(&punches, &directory(), &AttendanceSettings::default());

        assert_eq!(report.metadata.total_records, report.detailed.len());
        assert_eq!(report.metadata.skipped_records, 2);
        assert_eq!(report.detailed.len() + 2, punches.len());

        let names: HashSet<_> = report.detailed.iter().map(|r| &r.name).collect();
        assert_eq!(report.metadata.total_employees, names.len());

        let mut groups: HashMap<(&str, &str), Vec<_>> = HashMap::new();
        for r in &report.detailed {
            groups.entry((r.date.as_str(), r.name.as_str())).or_default().push(r);
        }
        for row in &report.summary {
            let members = &groups[&(row.date.as_str(), row.name.as_str())];
            assert_eq!(row.punch_count, members.len());
            assert!(members.iter().all(|m| m.is_late_arrival == row.is_late_arrival
                && m.is_early_departure == row.is_early_departure
                && m.first_punch == row.first_punch
                && m.last_punch == row.last_punch));
        }
        assert_eq!(groups.len(), report.summary.len());
    }

    #[test]
    fn test_report_is_order_invariant() {
        let generated_at = Local::now();
        let punches = sample_punches();
        let mut reversed = punches.clone();
        reversed.reverse();

        let settings = AttendanceSettings::default();
        let a = build_report_at(&punches, &directory(), &settings, generated_at);
        let b = build_report_at(&reversed, &directory(), &settings, generated_at);
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_order() {
        let report = build_report(&sample_punches(), &directory(), &AttendanceSettings::default());
        let summary: Vec<_> = report.summary.iter().map(|r| (r.calendar_date.to_string(), r.name.clone())).collect();
        assert_eq!(
            summary,
            [
                ("2025-04-21".to_string(), "Ali".to_string()),
                ("2025-04-21".to_string(), "Omar".to_string()),
                ("2025-04-22".to_string(), "Sara".to_string()),
                ("2025-04-22".to_string(), "Unknown".to_string()),
            ]
        );
        let first_three: Vec<_> = report.detailed.iter().take(3).map(|r| r.time.as_str()).collect();
        assert_eq!(first_three, ["09:20 AM", "09:40 AM", "05:05 PM"]);
    }

    #[test]
    fn test_json_shape() {
        let punches = vec![RawPunch::new("1", at("2025-04-21 09:20"))];
        let report = build_report(&punches, &directory(), &AttendanceSettings::default());
        let value = serde_json::to_value(&report).unwrap();

        let detailed = &value["detailed"][0];
        assert_eq!(detailed["uid"], "1");
        assert_eq!(detailed["time"], "09:20 AM");
        assert!(detailed.get("calendar_date").is_none());
        assert_eq!(value["summary"][0]["punch_count"], 1);
        assert_eq!(value["metadata"]["date_range"]["start"], "21 April Monday 2025");
        assert!(value["metadata"]["generated_at"].is_string());
    }
}
