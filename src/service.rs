//! Report service orchestration.

use crate::engine::build_report;
use crate::error::Result;
use crate::models::{AttendanceReport, AttendanceSettings, RawPunch};
use crate::source::PunchSource;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Inclusive calendar-date window applied to punches before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(since: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        Self { since, until }
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    /// Punches without a valid timestamp are kept so the engine can count them as skipped.
    pub fn contains(&self, punch: &RawPunch) -> bool {
        let Some(timestamp) = punch.timestamp else {
            return true;
        };
        let date = timestamp.date();
        self.since.is_none_or(|since| date >= since) && self.until.is_none_or(|until| date <= until)
    }
}

/// Fetches from a punch source and builds the attendance report.
pub struct ReportService<S> {
    source: S,
    overrides: BTreeMap<i64, String>,
}

impl<S: PunchSource> ReportService<S> {
    /// Create a new report service.
    pub fn new(source: S) -> Self {
        Self {
            source,
            overrides: BTreeMap::new(),
        }
    }

    /// Names that replace the source's directory entries.
    pub fn with_overrides(mut self, overrides: BTreeMap<i64, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Fetch the directory then the punches and build the report.
    ///
    /// Source failures abort the request; malformed punches do not.
    pub async fn generate(&self, settings: &AttendanceSettings, window: DateWindow) -> Result<AttendanceReport> {
        let start = std::time::Instant::now();

        let mut directory = self.source.fetch_user_directory().await?;
        directory.apply_overrides(&self.overrides);
        debug!("Directory has {} users ({} overrides)", directory.len(), self.overrides.len());

        let mut punches = self.source.fetch_punches().await?;
        let fetched = punches.len();
        if !window.is_unbounded() {
            punches.retain(|p| window.contains(p));
            info!("Date window kept {} of {fetched} punches", punches.len());
        }

        let report = build_report(&punches, &directory, settings);

        info!(
            "Report generated: {} records for {} employees (took {:.1}s)",
            report.metadata.total_records,
            report.metadata.total_employees,
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }
}
