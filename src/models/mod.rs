//! Data models for punches, settings and attendance reports.

pub mod punch;
pub mod report;
pub mod settings;

pub use punch::{DeviceUser, RawPunch, UNKNOWN_USER, UserDirectory};
pub use report::{AttendanceReport, DateRange, DetailedRecord, ReportMetadata, SummaryRow};
pub use settings::{AttendanceSettings, parse_clock};
