//! ZKTeco protocol packet building, checksum and comm key calculation.

use super::types::{DeviceCapacity, HEADER_SIZE, PAYLOAD_MIN_SIZE, TCP_HEADER, TcpResponse};
use crate::error::{AppError, Result};

/// Calculate ZKTeco checksum (16-bit ones complement).
pub(crate) fn calculate_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in data.chunks(2) {
        if chunk.len() == 2 {
            sum += u16::from_le_bytes([chunk[0], chunk[1]]) as u32;
        } else {
            sum += chunk[0] as u32;
        }
    }
    // Fold to 16 bits
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}

/// Build a protocol packet.
///
/// Increments `reply_id` after building the packet.
pub(crate) fn build_packet(command: u16, data: &[u8], session_id: u16, reply_id: &mut u16) -> Vec<u8> {
    let payload_len = PAYLOAD_MIN_SIZE + data.len();
    let mut packet = Vec::with_capacity(HEADER_SIZE + payload_len);

    packet.extend_from_slice(&TCP_HEADER);
    packet.extend_from_slice(&(payload_len as u32).to_le_bytes());
    packet.extend_from_slice(&command.to_le_bytes());
    packet.extend_from_slice(&[0, 0]); // checksum placeholder
    packet.extend_from_slice(&session_id.to_le_bytes());
    packet.extend_from_slice(&reply_id.to_le_bytes());
    packet.extend_from_slice(data);

    // Checksum covers the payload starting at byte 8
    let checksum = calculate_checksum(&packet[HEADER_SIZE..]);
    packet[10..12].copy_from_slice(&checksum.to_le_bytes());

    *reply_id = reply_id.wrapping_add(1);

    packet
}

/// Extract data size from PREPARE_DATA response.
pub(crate) fn get_data_size_from_response(response: &TcpResponse) -> Result<usize> {
    if response.data.len() >= 4 {
        let size =
            u32::from_le_bytes([response.data[0], response.data[1], response.data[2], response.data[3]]) as usize;
        return Ok(size);
    }

    Err(AppError::TcpProtocolError(
        "Cannot extract size from response".to_string(),
    ))
}

/// Scramble the numeric comm key with the session id for CMD_AUTH.
///
/// The key's bits are reversed, the session id added, and the result mixed
/// with "ZKSO" and a tick byte.
pub(crate) fn make_commkey(key: u32, session_id: u16, ticks: u8) -> [u8; 4] {
    let mut k: u32 = 0;
    for i in 0..32 {
        k = if key & (1 << i) != 0 { (k << 1) | 1 } else { k << 1 };
    }
    k = k.wrapping_add(u32::from(session_id));

    let b = k.to_le_bytes();
    let b = [b[0] ^ b'Z', b[1] ^ b'K', b[2] ^ b'S', b[3] ^ b'O'];
    // swap the two 16-bit halves
    let b = [b[2], b[3], b[0], b[1]];

    [b[0] ^ ticks, b[1] ^ ticks, ticks, b[3] ^ ticks]
}

/// Parse the CMD_GET_FREE_SIZES reply (twenty little-endian i32 fields).
pub(crate) fn parse_free_sizes(data: &[u8]) -> Result<DeviceCapacity> {
    if data.len() < 80 {
        return Err(AppError::TcpInvalidData(format!(
            "Free sizes response too small: {} bytes",
            data.len()
        )));
    }

    let field = |index: usize| {
        let at = index * 4;
        let value = i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        value.max(0) as u32
    };

    Ok(DeviceCapacity {
        users: field(4),
        fingers: field(6),
        records: field(8),
        users_cap: field(15),
        records_cap: field(16),
    })
}
