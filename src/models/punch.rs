//! Raw punches and the user directory supplied by a punch source.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Display name used when a punch's user id is not in the directory.
pub const UNKNOWN_USER: &str = "Unknown";

/// One clock-in/out event as recorded by the terminal.
///
/// Kept exactly as the terminal reported it; validation happens during
/// aggregation so that a malformed event can be skipped without failing the
/// whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawPunch {
    /// Enrollment number as text (terminals store it as a string).
    pub user_id: String,
    /// Terminal wall-clock time; `None` when the stored value is not a valid
    /// calendar time.
    pub timestamp: Option<NaiveDateTime>,
}

impl RawPunch {
    pub fn new(user_id: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: Some(timestamp),
        }
    }
}

/// User record read from the terminal (or a users file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUser {
    /// Internal slot number on the terminal.
    #[serde(default)]
    pub uid: u16,
    /// Enrollment number printed on punches.
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub privilege: u8,
    #[serde(default)]
    pub card: u32,
}

impl DeviceUser {
    /// Directory key for this user.
    ///
    /// Punches carry the enrollment number, so that is preferred; the slot
    /// number is used when the enrollment number is not numeric.
    pub fn directory_id(&self) -> i64 {
        self.user_id
            .trim()
            .parse::<i64>()
            .unwrap_or_else(|_| i64::from(self.uid))
    }
}

/// Lookup from user id to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDirectory {
    names: HashMap<i64, String>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from terminal users. Later entries win on duplicate ids.
    pub fn from_users(users: &[DeviceUser]) -> Self {
        users.iter().map(|u| (u.directory_id(), u.name.clone())).collect()
    }

    /// Apply manual name overrides on top of the terminal's names.
    pub fn apply_overrides<'a>(&mut self, overrides: impl IntoIterator<Item = (&'a i64, &'a String)>) {
        for (id, name) in overrides {
            self.names.insert(*id, name.clone());
        }
    }

    /// Display name for `user_id`, or [`UNKNOWN_USER`].
    pub fn name_of(&self, user_id: i64) -> &str {
        self.names.get(&user_id).map(String::as_str).unwrap_or(UNKNOWN_USER)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(i64, String)> for UserDirectory {
    fn from_iter<T: IntoIterator<Item = (i64, String)>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
