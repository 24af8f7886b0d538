//! In-process terminal that speaks enough of the protocol for tests.

use super::protocol::{build_packet, make_commkey};
use super::types::{
    CMD_ACK_OK, CMD_ACK_UNAUTH, CMD_ATTLOG_RRQ, CMD_AUTH, CMD_CONNECT, CMD_DATA, CMD_EXIT, CMD_GET_FREE_SIZES,
    CMD_PREPARE_BUFFER, CMD_USERTEMP_RRQ, HEADER_SIZE, PAYLOAD_MIN_SIZE,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) const FAKE_SESSION: u16 = 0x1234;
const CMD_ACK_ERROR: u16 = 2001;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDevice {
    /// Raw user table (without size prefix).
    pub users: Vec<u8>,
    /// Raw attendance table (without size prefix).
    pub attendance: Vec<u8>,
    pub user_count: u32,
    pub record_count: u32,
    /// Comm key the device insists on, if any.
    pub password: Option<u32>,
    /// Answer the ATTLOG request with an unusable reply.
    pub broken_attlog: bool,
}

/// Commands received, in order, across all sessions.
pub(crate) type CommandLog = Arc<Mutex<Vec<u16>>>;

/// Listen on an ephemeral port and serve sessions until the test ends.
pub(crate) async fn spawn(device: FakeDevice) -> (u16, CommandLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let log: CommandLog = Arc::default();

    let served = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            serve(&mut socket, &device, &served).await;
        }
    });

    (port, log)
}

/// Snapshot of the log once the client's fire-and-forget EXIT has arrived.
pub(crate) async fn settled(log: &CommandLog) -> Vec<u16> {
    for _ in 0..100 {
        let commands = log.lock().unwrap().clone();
        if commands.last() == Some(&CMD_EXIT) {
            return commands;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    log.lock().unwrap().clone()
}

fn with_size_prefix(table: &[u8]) -> Vec<u8> {
    let mut data = (table.len() as u32).to_le_bytes().to_vec();
    data.extend_from_slice(table);
    data
}

fn free_sizes(device: &FakeDevice) -> Vec<u8> {
    let mut data = vec![0u8; 80];
    data[16..20].copy_from_slice(&(device.user_count as i32).to_le_bytes());
    data[32..36].copy_from_slice(&(device.record_count as i32).to_le_bytes());
    data
}

async fn serve(socket: &mut TcpStream, device: &FakeDevice, log: &CommandLog) {
    let mut reply_id = 0u16;

    loop {
        let mut header = [0u8; HEADER_SIZE];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut payload = vec![0u8; len];
        if socket.read_exact(&mut payload).await.is_err() {
            return;
        }

        let command = u16::from_le_bytes([payload[0], payload[1]]);
        let data = &payload[PAYLOAD_MIN_SIZE..];
        log.lock().unwrap().push(command);

        let (code, body) = match command {
            CMD_EXIT => return,
            CMD_CONNECT if device.password.is_some() => (CMD_ACK_UNAUTH, Vec::new()),
            CMD_AUTH => {
                let expected = make_commkey(device.password.unwrap_or(0), FAKE_SESSION, 50);
                if data == expected { (CMD_ACK_OK, Vec::new()) } else { (CMD_ACK_ERROR, Vec::new()) }
            }
            CMD_GET_FREE_SIZES => (CMD_ACK_OK, free_sizes(device)),
            CMD_PREPARE_BUFFER => {
                let table = i16::from_le_bytes([data[1], data[2]]) as u16;
                match table {
                    CMD_ATTLOG_RRQ if device.broken_attlog => (CMD_ACK_OK, Vec::new()),
                    CMD_ATTLOG_RRQ => (CMD_DATA, with_size_prefix(&device.attendance)),
                    CMD_USERTEMP_RRQ => (CMD_DATA, with_size_prefix(&device.users)),
                    _ => (CMD_ACK_ERROR, Vec::new()),
                }
            }
            _ => (CMD_ACK_OK, Vec::new()),
        };

        let packet = build_packet(code, &body, FAKE_SESSION, &mut reply_id);
        if socket.write_all(&packet).await.is_err() {
            return;
        }
    }
}
