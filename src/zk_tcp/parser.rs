//! Attendance and user table parsers (text/binary).

use crate::error::{AppError, Result};
use crate::models::{DeviceUser, RawPunch};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Binary attendance record layouts by firmware generation.
const ATTENDANCE_RECORD_SIZES: [usize; 3] = [40, 16, 8];
/// Binary user record layouts by firmware generation.
const USER_RECORD_SIZES: [usize; 2] = [72, 28];

/// Strip the 4-byte total-size prefix some replies carry.
fn strip_size_header(data: &[u8]) -> &[u8] {
    if data.len() >= 4 {
        let potential_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if potential_size == data.len() - 4 {
            return &data[4..];
        }
    }
    data
}

/// Pick the record size: exact division by the device-reported count when
/// available, otherwise the first known layout that divides the data evenly.
fn record_size(len: usize, count: Option<u32>, known: &[usize]) -> Option<usize> {
    if let Some(count) = count.filter(|&c| c > 0) {
        let count = count as usize;
        if len % count == 0 && known.contains(&(len / count)) {
            return Some(len / count);
        }
    }
    known.iter().copied().find(|size| len % size == 0)
}

/// Decode ZK packed timestamp format.
///
/// ZK encodes timestamps as:
/// `((((year-2000)*12 + month-1)*31 + day-1)*24 + hour)*60 + minute)*60 + second`
///
/// Returns `None` for values that do not name a real calendar day (e.g. 31 February).
pub(crate) fn decode_zk_timestamp(encoded: u32) -> Option<NaiveDateTime> {
    let mut val = encoded;
    let second = val % 60;
    val /= 60;
    let minute = val % 60;
    val /= 60;
    let hour = val % 24;
    val /= 24;
    let day = (val % 31) + 1;
    val /= 31;
    let month = (val % 12) + 1;
    val /= 12;
    let year = val as i32 + 2000;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Inverse of [`decode_zk_timestamp`] for a valid date-time.
#[cfg(test)]
pub(crate) fn encode_zk_timestamp(dt: NaiveDateTime) -> u32 {
    use chrono::{Datelike, Timelike};
    ((((((dt.year() as u32 - 2000) * 12 + dt.month() - 1) * 31 + dt.day() - 1) * 24 + dt.hour()) * 60
        + dt.minute())
        * 60)
        + dt.second()
}

/// Parse attendance data (auto-detect format).
///
/// Punches are returned as stored; a bad timestamp becomes `None` so the
/// caller decides what to do with it. `record_count` is the device's record
/// count, used to tell binary layouts apart. `users` is the terminal's user
/// table; layouts that only store the internal slot number are mapped back to
/// the enrollment number through it.
pub(crate) fn parse_attendance_data(
    data: &[u8],
    record_count: Option<u32>,
    users: &[DeviceUser],
) -> Result<Vec<RawPunch>> {
    let data = strip_size_header(data);
    if data.is_empty() {
        return Ok(Vec::new());
    }

    // Text dumps are printable ASCII with tab separators; binary records carry NUL padding
    let head = &data[..data.len().min(100)];
    let is_text = head.contains(&b'\t') && head.iter().all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace());

    if is_text {
        Ok(parse_text_format(data))
    } else {
        parse_binary_format(data, record_count, users)
    }
}

/// Parse text (TSV) format attendance data.
///
/// Format: `user_id \t [empty] \t YYYY-MM-DD HH:MM:SS \t verify_type \t status`
pub(crate) fn parse_text_format(data: &[u8]) -> Vec<RawPunch> {
    let text = String::from_utf8_lossy(data);
    let mut records = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            warn!("Ignoring attendance line with {} fields: {line}", parts.len());
            continue;
        }

        let timestamp_str = parts[2].trim();
        let timestamp = NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S").ok();
        if timestamp.is_none() {
            debug!("Unparsable timestamp '{timestamp_str}' in line: {line}");
        }

        records.push(RawPunch {
            user_id: parts[0].trim().to_string(),
            timestamp,
        });
    }

    records
}

/// Read a null-padded ASCII field.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parse binary format attendance data.
///
/// Layouts:
/// - 8 bytes: uid(u16) status(u8) timestamp(u32) punch(u8)
/// - 16 bytes: user_id(u32) timestamp(u32) status(u8) punch(u8) reserved(2) workcode(u32)
/// - 40 bytes: uid(u16) user_id(24s) status(u8) timestamp(u32) punch(u8) reserved(8)
///
/// Slot numbers without a user table entry are kept as-is.
fn parse_binary_format(data: &[u8], record_count: Option<u32>, users: &[DeviceUser]) -> Result<Vec<RawPunch>> {
    let size = record_size(data.len(), record_count, &ATTENDANCE_RECORD_SIZES).ok_or_else(|| {
        AppError::TcpInvalidData(format!("Attendance data of {} bytes matches no record layout", data.len()))
    })?;

    debug!("Parsing {} binary attendance records of {size} bytes", data.len() / size);

    let enrollment: HashMap<u16, &str> = users.iter().map(|u| (u.uid, u.user_id.as_str())).collect();
    let by_slot = |uid: u16| {
        enrollment
            .get(&uid)
            .filter(|id| !id.is_empty())
            .map_or_else(|| uid.to_string(), |id| id.to_string())
    };

    let records = data
        .chunks_exact(size)
        .map(|chunk| {
            let (user_id, encoded) = match size {
                8 => (by_slot(le_u16(chunk, 0)), le_u32(chunk, 3)),
                16 => (le_u32(chunk, 0).to_string(), le_u32(chunk, 4)),
                _ => {
                    let user_id = c_string(&chunk[2..26]);
                    // Older firmware leaves the text id empty; go through the slot number
                    let user_id = if user_id.is_empty() {
                        by_slot(le_u16(chunk, 0))
                    } else {
                        user_id
                    };
                    (user_id, le_u32(chunk, 27))
                }
            };

            RawPunch {
                user_id,
                timestamp: decode_zk_timestamp(encoded),
            }
        })
        .collect();

    Ok(records)
}

/// Parse the USERTEMP table.
///
/// Layouts:
/// - 28 bytes: uid(u16) privilege(u8) password(5s) name(8s) card(u32) pad group(u8) tz(i16) user_id(u32)
/// - 72 bytes: uid(u16) privilege(u8) password(8s) name(24s) card(u32) pad group(7s) pad user_id(24s)
///
/// Users without a name get `NN-<user_id>`.
pub(crate) fn parse_user_data(data: &[u8], user_count: Option<u32>) -> Result<Vec<DeviceUser>> {
    let data = strip_size_header(data);
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let size = record_size(data.len(), user_count, &USER_RECORD_SIZES).ok_or_else(|| {
        AppError::TcpInvalidData(format!("User data of {} bytes matches no record layout", data.len()))
    })?;

    let users = data
        .chunks_exact(size)
        .map(|chunk| {
            let (name, card, user_id) = if size == 28 {
                (c_string(&chunk[8..16]), le_u32(chunk, 16), le_u32(chunk, 24).to_string())
            } else {
                (c_string(&chunk[11..35]), le_u32(chunk, 35), c_string(&chunk[48..72]))
            };
            let name = if name.is_empty() { format!("NN-{user_id}") } else { name };

            DeviceUser {
                uid: le_u16(chunk, 0),
                user_id,
                name,
                privilege: chunk[2],
                card,
            }
        })
        .collect();

    Ok(users)
}
