//! Groups raw punches into per-user, per-day windows.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::warn;

use super::format::human_date;
use crate::models::{RawPunch, UserDirectory};

/// Grouping key: resolved display name and calendar date.
///
/// Two ids that resolve to the same name share one key, and every id missing
/// from the directory lands in the shared "Unknown" bucket for that day.
pub type DayKey = (String, NaiveDate);

/// A punch that cannot take part in the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedPunch {
    #[error("user id '{0}' is not an integer")]
    InvalidUserId(String),

    #[error("punch from user '{0}' has an invalid timestamp")]
    InvalidTimestamp(String),
}

/// A valid punch joined with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPunch {
    pub uid: String,
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Earliest and latest punch of one user-day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyAggregate {
    pub first_punch: NaiveTime,
    pub last_punch: NaiveTime,
    pub human_readable_date: String,
}

impl DailyAggregate {
    fn seed(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            first_punch: time,
            last_punch: time,
            human_readable_date: human_date(date),
        }
    }

    fn widen(&mut self, time: NaiveTime) {
        if time < self.first_punch {
            self.first_punch = time;
        }
        if time > self.last_punch {
            self.last_punch = time;
        }
    }
}

/// Aggregate for one key plus the punches that built it, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub aggregate: DailyAggregate,
    pub punches: Vec<ResolvedPunch>,
}

/// Output of one aggregation run.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub days: BTreeMap<DayKey, DayGroup>,
    pub skipped: usize,
}

impl Aggregation {
    pub fn punch_count(&self) -> usize {
        self.days.values().map(|g| g.punches.len()).sum()
    }
}

fn resolve(punch: &RawPunch, directory: &UserDirectory) -> Result<ResolvedPunch, MalformedPunch> {
    let user_id = punch
        .user_id
        .trim()
        .parse::<i64>()
        .map_err(|_| MalformedPunch::InvalidUserId(punch.user_id.clone()))?;
    let timestamp = punch
        .timestamp
        .ok_or_else(|| MalformedPunch::InvalidTimestamp(punch.user_id.clone()))?;

    Ok(ResolvedPunch {
        uid: punch.user_id.trim().to_string(),
        name: directory.name_of(user_id).to_string(),
        date: timestamp.date(),
        time: timestamp.time(),
    })
}

/// Fold every valid punch into its user-day group.
///
/// Malformed punches are logged and counted, never returned as errors.
pub fn aggregate(punches: &[RawPunch], directory: &UserDirectory) -> Aggregation {
    let mut result = Aggregation::default();

    for punch in punches {
        let resolved = match resolve(punch, directory) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Skipping punch: {e}");
                result.skipped += 1;
                continue;
            }
        };

        let (date, time) = (resolved.date, resolved.time);
        result
            .days
            .entry((resolved.name.clone(), date))
            .and_modify(|group| group.aggregate.widen(time))
            .or_insert_with(|| DayGroup {
                aggregate: DailyAggregate::seed(date, time),
                punches: Vec::new(),
            })
            .punches
            .push(resolved);
    }

    result
}
