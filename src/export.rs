//! Report export: CSV, JSON and Excel files.

use crate::error::Result;
use crate::models::{AttendanceReport, DetailedRecord, SummaryRow};
use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SUMMARY_CSV: &str = "attendance_summary.csv";
pub const DETAILED_CSV: &str = "attendance_detailed.csv";
pub const REPORT_JSON: &str = "attendance_data.json";
pub const REPORT_XLSX: &str = "attendance_report.xlsx";

const SUMMARY_HEADER: [&str; 7] = [
    "date",
    "name",
    "punch_count",
    "is_late_arrival",
    "is_early_departure",
    "first_punch",
    "last_punch",
];
const DETAILED_HEADER: [&str; 8] = [
    "uid",
    "name",
    "date",
    "time",
    "is_late_arrival",
    "is_early_departure",
    "first_punch",
    "last_punch",
];

/// Output file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Summary and detailed CSV files
    Csv,
    /// Whole report as pretty-printed JSON
    Json,
    /// Excel workbook with Summary and Detailed sheets
    Excel,
}

/// Write the report in every requested format.
///
/// Creates `dir` when missing. Returns the written file paths.
pub fn export_report(report: &AttendanceReport, dir: &Path, formats: &[ExportFormat]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for format in formats {
        match format {
            ExportFormat::Csv => {
                let summary_path = dir.join(SUMMARY_CSV);
                write_summary_csv(&report.summary, &summary_path)?;
                written.push(summary_path);

                let detailed_path = dir.join(DETAILED_CSV);
                write_detailed_csv(&report.detailed, &detailed_path)?;
                written.push(detailed_path);
            }
            ExportFormat::Json => {
                let path = dir.join(REPORT_JSON);
                write_json(report, &path)?;
                written.push(path);
            }
            ExportFormat::Excel => {
                let path = dir.join(REPORT_XLSX);
                write_excel(report, &path)?;
                written.push(path);
            }
        }
    }

    info!("Exported {} files to {}", written.len(), dir.display());
    Ok(written)
}

/// Serialize rows with a blank separator row between distinct dates.
///
/// `header` must match the serialized field names of `T`; it is written
/// on its own when there are no rows.
fn write_spaced_csv<T: Serialize>(
    rows: &[T],
    date_of: impl Fn(&T) -> NaiveDate,
    header: &[&str],
    path: &Path,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut previous: Option<NaiveDate> = None;

    for row in rows {
        let date = date_of(row);
        if previous.is_some_and(|p| p != date) {
            writer.write_record(std::iter::repeat_n("", header.len()))?;
        }
        writer.serialize(row)?;
        previous = Some(date);
    }

    // serialize() emits the header with the first row; an empty report still gets one
    if rows.is_empty() {
        writer.write_record(header)?;
    }

    writer.flush()?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_summary_csv(rows: &[SummaryRow], path: &Path) -> Result<()> {
    write_spaced_csv(rows, |r| r.calendar_date, &SUMMARY_HEADER, path)
}

pub fn write_detailed_csv(records: &[DetailedRecord], path: &Path) -> Result<()> {
    write_spaced_csv(records, |r| r.calendar_date, &DETAILED_HEADER, path)
}

pub fn write_json(report: &AttendanceReport, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White)
        .set_border(FormatBorder::Thin)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Write the header row, column widths, autofilter and frozen top row.
fn prepare_sheet(worksheet: &mut Worksheet, name: &str, columns: &[(&str, u16)], rows: usize) -> Result<()> {
    worksheet.set_name(name)?;

    let header_format = header_format();
    for (col, (header, width)) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, *width)?;
    }

    if rows > 0 {
        worksheet.autofilter(0, 0, rows as u32, (columns.len() - 1) as u16)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn summary_sheet(rows: &[SummaryRow]) -> Result<Worksheet> {
    let mut worksheet = Worksheet::new();
    prepare_sheet(
        &mut worksheet,
        "Summary",
        &[
            ("Date", 28),
            ("Name", 30),
            ("Punch Count", 12),
            ("Late Arrival", 12),
            ("Early Departure", 15),
            ("First Punch", 12),
            ("Last Punch", 12),
        ],
        rows.len(),
    )?;

    for (idx, record) in rows.iter().enumerate() {
        let row = (idx + 1) as u32;

        worksheet.write_string(row, 0, &record.date)?;
        worksheet.write_string(row, 1, &record.name)?;
        worksheet.write_number(row, 2, record.punch_count as f64)?;
        worksheet.write_string(row, 3, yes_no(record.is_late_arrival))?;
        worksheet.write_string(row, 4, yes_no(record.is_early_departure))?;
        worksheet.write_string(row, 5, &record.first_punch)?;
        worksheet.write_string(row, 6, &record.last_punch)?;
    }

    Ok(worksheet)
}

fn detailed_sheet(records: &[DetailedRecord]) -> Result<Worksheet> {
    let mut worksheet = Worksheet::new();
    prepare_sheet(
        &mut worksheet,
        "Detailed",
        &[
            ("User ID", 10),
            ("Name", 30),
            ("Date", 28),
            ("Time", 10),
            ("Late Arrival", 12),
            ("Early Departure", 15),
            ("First Punch", 12),
            ("Last Punch", 12),
        ],
        records.len(),
    )?;

    for (idx, record) in records.iter().enumerate() {
        let row = (idx + 1) as u32;

        worksheet.write_string(row, 0, &record.uid)?;
        worksheet.write_string(row, 1, &record.name)?;
        worksheet.write_string(row, 2, &record.date)?;
        worksheet.write_string(row, 3, &record.time)?;
        worksheet.write_string(row, 4, yes_no(record.is_late_arrival))?;
        worksheet.write_string(row, 5, yes_no(record.is_early_departure))?;
        worksheet.write_string(row, 6, &record.first_punch)?;
        worksheet.write_string(row, 7, &record.last_punch)?;
    }

    Ok(worksheet)
}

pub fn write_excel(report: &AttendanceReport, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    workbook.push_worksheet(summary_sheet(&report.summary)?);
    workbook.push_worksheet(detailed_sheet(&report.detailed)?);
    workbook.save(path)?;
    Ok(())
}
