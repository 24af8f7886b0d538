//! Daily summary rows and report metadata.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local, NaiveDate};

use crate::models::{DateRange, DetailedRecord, ReportMetadata, SummaryRow};

/// Presentation order: calendar date, then name, then punch time.
pub fn sort_detailed(records: &mut [DetailedRecord]) {
    records.sort_by(|a, b| {
        (a.calendar_date, &a.name, a.punch_time).cmp(&(b.calendar_date, &b.name, b.punch_time))
    });
}

/// One row per (date, name), ordered by calendar date then name.
///
/// Verdicts and first/last punch are taken from the first record of each
/// group; they are identical across the group.
pub fn summarize(records: &[DetailedRecord]) -> Vec<SummaryRow> {
    let mut rows: BTreeMap<(NaiveDate, &str), SummaryRow> = BTreeMap::new();

    for record in records {
        rows.entry((record.calendar_date, record.name.as_str()))
            .and_modify(|row| row.punch_count += 1)
            .or_insert_with(|| SummaryRow {
                date: record.date.clone(),
                name: record.name.clone(),
                punch_count: 1,
                is_late_arrival: record.is_late_arrival,
                is_early_departure: record.is_early_departure,
                first_punch: record.first_punch.clone(),
                last_punch: record.last_punch.clone(),
                calendar_date: record.calendar_date,
            });
    }

    rows.into_values().collect()
}

/// Counts and date range over the detailed records.
///
/// The date range is the lexicographic minimum and maximum of the
/// human-readable date strings, which is not calendar order.
pub fn metadata(records: &[DetailedRecord], skipped: usize, generated_at: DateTime<Local>) -> ReportMetadata {
    let employees: BTreeSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let dates = records.iter().map(|r| r.date.as_str());

    ReportMetadata {
        total_records: records.len(),
        total_employees: employees.len(),
        date_range: DateRange {
            start: dates.clone().min().map(str::to_string),
            end: dates.max().map(str::to_string),
        },
        generated_at,
        skipped_records: skipped,
    }
}
