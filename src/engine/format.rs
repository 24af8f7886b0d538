//! Human-facing date and time formats shared by reports and exports.

use chrono::{NaiveDate, NaiveTime};

/// "21 April Monday 2025"
pub fn human_date(date: NaiveDate) -> String {
    date.format("%d %B %A %Y").to_string()
}

/// "09:15 AM"
pub fn clock_12h(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}
