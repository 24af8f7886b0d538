//! Unit tests for ZKTeco TCP client.

use super::client::ZkTcpClient;
use super::fake_device::{self, FAKE_SESSION, FakeDevice};
use super::parser::{decode_zk_timestamp, encode_zk_timestamp, parse_attendance_data, parse_user_data};
use super::protocol::calculate_checksum;
use super::types::{
    CMD_AUTH, CMD_CONNECT, CMD_FREE_DATA, CMD_PREPARE_BUFFER, HEADER_SIZE, PAYLOAD_MIN_SIZE,
    TCP_HEADER,
};
use crate::error::AppError;
use chrono::NaiveDateTime;

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// 40-byte attendance record with a text user id.
fn record_40(user_id: &str, ts: NaiveDateTime) -> Vec<u8> {
    let mut record = vec![0u8; 40];
    record[2..2 + user_id.len()].copy_from_slice(user_id.as_bytes());
    record[27..31].copy_from_slice(&encode_zk_timestamp(ts).to_le_bytes());
    record
}

/// 8-byte attendance record that stores only the slot number.
fn record_8(uid: u16, ts: NaiveDateTime) -> Vec<u8> {
    let mut record = vec![0u8; 8];
    record[0..2].copy_from_slice(&uid.to_le_bytes());
    record[3..7].copy_from_slice(&encode_zk_timestamp(ts).to_le_bytes());
    record
}

/// 72-byte user record.
fn user_72(uid: u16, user_id: &str, name: &str) -> Vec<u8> {
    let mut record = vec![0u8; 72];
    record[0..2].copy_from_slice(&uid.to_le_bytes());
    record[11..11 + name.len()].copy_from_slice(name.as_bytes());
    record[48..48 + user_id.len()].copy_from_slice(user_id.as_bytes());
    record
}

#[test]
fn test_calculate_checksum() {
    // CMD_CONNECT payload with zero session/reply
    let data = [0xE8, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    assert_eq!(calculate_checksum(&data), 0xFC17);
}

#[test]
fn test_checksum_empty_data() {
    let data: [u8; 0] = [];
    let checksum = calculate_checksum(&data);
    assert_eq!(checksum, 0xFFFF); // Complement of 0
}

#[test]
fn test_build_packet_structure() {
    let mut client = ZkTcpClient::new("127.0.0.1", 4370, 30);
    let packet = client.build_packet_for_test(CMD_CONNECT, &[]);

    assert_eq!(&packet[0..4], &TCP_HEADER);

    let payload_len = u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]);
    assert_eq!(payload_len as usize, PAYLOAD_MIN_SIZE);

    let command = u16::from_le_bytes([packet[8], packet[9]]);
    assert_eq!(command, CMD_CONNECT);

    assert_eq!(packet.len(), HEADER_SIZE + PAYLOAD_MIN_SIZE);
}

#[test]
fn test_build_packet_with_data() {
    let mut client = ZkTcpClient::new("127.0.0.1", 4370, 30);
    let extra_data = [0x01, 0x02, 0x03, 0x04];
    let packet = client.build_packet_for_test(CMD_CONNECT, &extra_data);

    let payload_len = u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]);
    assert_eq!(payload_len as usize, PAYLOAD_MIN_SIZE + extra_data.len());
    assert_eq!(&packet[16..20], &extra_data);
}

#[test]
fn test_reply_id_increments() {
    let mut client = ZkTcpClient::new("127.0.0.1", 4370, 30);
    assert_eq!(client.reply_id(), 0);

    let _ = client.build_packet_for_test(CMD_CONNECT, &[]);
    assert_eq!(client.reply_id(), 1);

    let _ = client.build_packet_for_test(super::types::CMD_EXIT, &[]);
    assert_eq!(client.reply_id(), 2);
}

#[test]
fn test_decode_zk_timestamp() {
    assert_eq!(decode_zk_timestamp(0), Some(at("2000-01-01 00:00:00")));
    let ts = at("2025-04-21 09:20:37");
    assert_eq!(decode_zk_timestamp(encode_zk_timestamp(ts)), Some(ts));
}

#[test]
fn test_decode_zk_timestamp_impossible_day() {
    // day index 30 in February -> 31 February
    let encoded = ((((25 * 12 + 1) * 31 + 30) * 24 + 9) * 60) * 60;
    assert_eq!(decode_zk_timestamp(encoded), None);
}

#[test]
fn test_parse_text_format() {
    let data = b"20\t\t2025-12-02 07:36:58\t2\t0\n65\t\t2025-12-02 08:15:23\t2\t0\n";

    let records = parse_attendance_data(data, None, &[]).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, "20");
    assert_eq!(records[0].timestamp, Some(at("2025-12-02 07:36:58")));
    assert_eq!(records[1].user_id, "65");
}

#[test]
fn test_parse_text_format_keeps_malformed_punches() {
    let data = b"invalid\t\t2025-12-02 07:36:58\t2\t0\n20\t\tyesterday\t2\t0\nshort\n";

    let records = parse_attendance_data(data, None, &[]).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, "invalid");
    assert!(records[0].timestamp.is_some());
    assert_eq!(records[1].user_id, "20");
    assert_eq!(records[1].timestamp, None);
}

#[test]
fn test_parse_binary_40_byte_records() {
    let mut data = record_40("20", at("2025-04-21 09:20:00"));
    data.extend(record_40("65", at("2025-04-21 17:05:00")));

    let records = parse_attendance_data(&data, Some(2), &[]).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, "20");
    assert_eq!(records[1].user_id, "65");
    assert_eq!(records[1].timestamp, Some(at("2025-04-21 17:05:00")));
}

#[test]
fn test_parse_binary_8_byte_records_by_count() {
    // 80 bytes divides by 40 and 8; the device count decides
    let mut data = Vec::new();
    for uid in 101u16..=110 {
        data.extend(record_8(uid, at("2025-04-21 08:00:00")));
    }

    let records = parse_attendance_data(&data, Some(10), &[]).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[9].user_id, "110");
}

#[test]
fn test_parse_binary_8_byte_records_use_enrollment_number() {
    let mut table = user_72(1, "26", "Ali");
    table.extend(user_72(2, "", "Blank"));
    let users = parse_user_data(&table, Some(2)).unwrap();

    let mut data = record_8(1, at("2025-04-21 09:20:00"));
    data.extend(record_8(2, at("2025-04-21 09:25:00")));
    data.extend(record_8(9, at("2025-04-21 09:30:00")));

    let records = parse_attendance_data(&data, Some(3), &users).unwrap();
    assert_eq!(records[0].user_id, "26");
    assert_eq!(records[0].timestamp, Some(at("2025-04-21 09:20:00")));
    // Empty enrollment number and unknown slot both keep the slot
    assert_eq!(records[1].user_id, "2");
    assert_eq!(records[2].user_id, "9");
}

#[test]
fn test_parse_binary_40_byte_empty_id_uses_slot() {
    let users = parse_user_data(&user_72(3, "41", "Omar"), Some(1)).unwrap();
    let mut record = record_40("", at("2025-04-21 09:00:00"));
    record[0..2].copy_from_slice(&3u16.to_le_bytes());
    let mut data = record;
    data.extend(record_40("55", at("2025-04-21 10:00:00")));

    let records = parse_attendance_data(&data, Some(2), &users).unwrap();
    assert_eq!(records[0].user_id, "41");
    assert_eq!(records[1].user_id, "55");
}

#[test]
fn test_parse_binary_strips_size_prefix() {
    let table = record_40("7", at("2025-04-21 09:00:00"));
    let mut data = (table.len() as u32).to_le_bytes().to_vec();
    data.extend(&table);

    let records = parse_attendance_data(&data, None, &[]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "7");
}

#[test]
fn test_parse_binary_unknown_layout() {
    let err = parse_attendance_data(&[1u8; 13], None, &[]).unwrap_err();
    assert!(matches!(err, AppError::TcpInvalidData(_)));
}

#[test]
fn test_parse_user_data_72() {
    let mut data = user_72(1, "26", "Ali Shehzad");
    data.extend(user_72(2, "27", ""));

    let users = parse_user_data(&data, Some(2)).unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].uid, 1);
    assert_eq!(users[0].user_id, "26");
    assert_eq!(users[0].name, "Ali Shehzad");
    assert_eq!(users[1].name, "NN-27");
}

#[test]
fn test_parse_user_data_28() {
    let mut record = vec![0u8; 28];
    record[0..2].copy_from_slice(&5u16.to_le_bytes());
    record[8..11].copy_from_slice(b"Ali");
    record[24..28].copy_from_slice(&42u32.to_le_bytes());

    let users = parse_user_data(&record, Some(1)).unwrap();
    assert_eq!(users[0].user_id, "42");
    assert_eq!(users[0].name, "Ali");
}

#[tokio::test]
async fn test_session_reads_users_and_attendance() {
    let device = FakeDevice {
        users: user_72(1, "26", "Ali"),
        attendance: record_40("26", at("2025-04-21 09:20:00")),
        user_count: 1,
        record_count: 1,
        ..Default::default()
    };
    let (port, log) = fake_device::spawn(device).await;

    let mut client = ZkTcpClient::new("127.0.0.1", port, 5);
    client.connect().await.unwrap();
    assert!(client.is_connected());

    let capacity = client.get_capacity().await.unwrap();
    assert_eq!(capacity.records, 1);
    let users = client.read_users(Some(capacity.users)).await.unwrap();
    assert_eq!(users[0].name, "Ali");
    let punches = client.read_attendance(Some(capacity.records), &users).await.unwrap();
    assert_eq!(punches.len(), 1);
    assert_eq!(punches[0].user_id, "26");

    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
    assert_eq!(log.lock().unwrap()[0], CMD_CONNECT);
}

#[tokio::test]
async fn test_connect_with_comm_key() {
    let device = FakeDevice {
        password: Some(1234),
        ..Default::default()
    };
    let (port, log) = fake_device::spawn(device).await;

    let mut client = ZkTcpClient::new("127.0.0.1", port, 5).with_password(1234);
    client.connect().await.unwrap();
    client.disconnect().await.unwrap();

    let commands = log.lock().unwrap().clone();
    assert_eq!(&commands[..2], &[CMD_CONNECT, CMD_AUTH]);
}

#[tokio::test]
async fn test_wrong_comm_key_is_rejected() {
    let device = FakeDevice {
        password: Some(1234),
        ..Default::default()
    };
    let (port, _log) = fake_device::spawn(device).await;

    let mut client = ZkTcpClient::new("127.0.0.1", port, 5).with_password(1);
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, AppError::DeviceUnauthorized));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_failed_read_frees_buffer() {
    let device = FakeDevice {
        broken_attlog: true,
        ..Default::default()
    };
    let (port, log) = fake_device::spawn(device).await;

    let mut client = ZkTcpClient::new("127.0.0.1", port, 5);
    client.connect().await.unwrap();
    let err = client.read_attendance(None, &[]).await.unwrap_err();
    assert!(err.is_connector());
    client.disconnect().await.unwrap();

    let commands = log.lock().unwrap().clone();
    let prepare = commands.iter().position(|&c| c == CMD_PREPARE_BUFFER).unwrap();
    assert_eq!(commands[prepare + 1], CMD_FREE_DATA);
}

#[tokio::test]
async fn test_diagnose_reports_session() {
    let (port, _log) = fake_device::spawn(FakeDevice::default()).await;

    let mut client = ZkTcpClient::new("127.0.0.1", port, 5);
    let diagnosis = client.diagnose_connection().await;
    assert!(diagnosis.tcp_reachable);
    assert!(diagnosis.protocol_ok);
    assert_eq!(diagnosis.session_id, Some(FAKE_SESSION));
    assert!(diagnosis.to_string().contains("Protocol OK: true"));
    assert!(!client.is_connected());
}
