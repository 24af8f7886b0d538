//! Attendance report types returned by the engine.

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde::Serialize;

/// One punch annotated with its day's verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedRecord {
    pub uid: String,
    pub name: String,
    /// Human-readable date, e.g. "21 April Monday 2025".
    pub date: String,
    /// 12-hour punch time, e.g. "09:15 AM".
    pub time: String,
    pub is_late_arrival: bool,
    pub is_early_departure: bool,
    pub first_punch: String,
    pub last_punch: String,
    #[serde(skip)]
    pub calendar_date: NaiveDate,
    #[serde(skip)]
    pub punch_time: NaiveTime,
}

/// One row per user-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub date: String,
    pub name: String,
    pub punch_count: usize,
    pub is_late_arrival: bool,
    pub is_early_departure: bool,
    pub first_punch: String,
    pub last_punch: String,
    #[serde(skip)]
    pub calendar_date: NaiveDate,
}

/// First and last human-readable date present in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMetadata {
    pub total_records: usize,
    pub total_employees: usize,
    pub date_range: DateRange,
    pub generated_at: DateTime<Local>,
    /// Punches dropped because their user id or timestamp was malformed.
    pub skipped_records: usize,
}

/// Complete attendance report for one batch of punches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceReport {
    pub summary: Vec<SummaryRow>,
    pub detailed: Vec<DetailedRecord>,
    pub metadata: ReportMetadata,
}

impl AttendanceReport {
    pub fn is_empty(&self) -> bool {
        self.detailed.is_empty()
    }
}
