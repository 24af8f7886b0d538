//! ZkTcpClient struct and public API.

use super::io::{exchange, write_packet};
use super::parser::{parse_attendance_data, parse_user_data};
use super::protocol::{build_packet, make_commkey, parse_free_sizes};
use super::transfer::{Link, free_data, read_with_buffer};
use super::types::{
    CMD_ACK_OK, CMD_ACK_UNAUTH, CMD_ATTLOG_RRQ, CMD_AUTH, CMD_CONNECT, CMD_DISABLEDEVICE, CMD_ENABLEDEVICE,
    CMD_EXIT, CMD_GET_FREE_SIZES, CMD_TESTVOICE, CMD_USERTEMP_RRQ, DeviceCapacity, FCT_ATTLOG, FCT_USER,
    TcpResponse,
};
use crate::error::{AppError, Result};
use crate::models::{DeviceUser, RawPunch};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Tick byte mixed into the comm key.
const AUTH_TICKS: u8 = 50;

/// ZKTeco TCP client for binary protocol communication.
pub struct ZkTcpClient {
    stream: Option<TcpStream>,
    session_id: u16,
    reply_id: u16,
    ip: String,
    port: u16,
    password: u32,
    timeout_duration: Duration,
}

impl ZkTcpClient {
    /// Create a new TCP client.
    pub fn new(ip: &str, port: u16, timeout_secs: u64) -> Self {
        Self {
            stream: None,
            session_id: 0,
            reply_id: 0,
            ip: ip.to_string(),
            port,
            password: 0,
            timeout_duration: Duration::from_secs(timeout_secs),
        }
    }

    /// Set the numeric communication password (comm key).
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Connect to the device and establish a session.
    ///
    /// Authenticates with the comm key when the device requires it.
    pub async fn connect(&mut self) -> Result<()> {
        let addr = self.addr();
        info!("TCP connecting to {} (timeout={:?})", addr, self.timeout_duration);

        let stream = timeout(self.timeout_duration, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                error!("Connection timeout to {addr}");
                AppError::TcpConnectionFailed(format!("Connection timeout to {addr}"))
            })?
            .map_err(|e| {
                error!("Failed to connect to {addr}: {e}");
                AppError::TcpConnectionFailed(format!("Failed to connect to {addr}: {e}"))
            })?;

        self.stream = Some(stream);
        self.session_id = 0;
        self.reply_id = 0;

        let response = self.send_command(CMD_CONNECT, &[]).await?;
        self.session_id = response.session_id;

        match response.code {
            CMD_ACK_OK => {}
            CMD_ACK_UNAUTH => {
                debug!("Device requires authentication");
                let key = make_commkey(self.password, self.session_id, AUTH_TICKS);
                let auth = self.send_command(CMD_AUTH, &key).await?;
                if auth.code != CMD_ACK_OK {
                    error!("Authentication rejected, code={}", auth.code);
                    self.stream = None;
                    return Err(AppError::DeviceUnauthorized);
                }
            }
            code => {
                error!("Unexpected connect response code {code}");
                self.stream = None;
                return Err(AppError::TcpProtocolError(format!(
                    "Unexpected connect response code {code}"
                )));
            }
        }

        info!("Connected to device, session_id={}", self.session_id);
        Ok(())
    }

    /// Disconnect from the device.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(ref mut stream) = self.stream {
            info!("Disconnecting from device");
            // Send CMD_EXIT but don't wait for response (device may not respond)
            let packet = build_packet(CMD_EXIT, &[], self.session_id, &mut self.reply_id);
            let _ = write_packet(stream, &packet, Duration::from_secs(2)).await;
        }
        self.stream = None;
        self.session_id = 0;
        self.reply_id = 0;
        Ok(())
    }

    /// Check if connected to the device.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Lock the keypad and sensor while reading.
    pub async fn disable_device(&mut self) -> Result<()> {
        debug!("Disabling device");
        self.expect_ack(CMD_DISABLEDEVICE, &[]).await
    }

    /// Unlock the device after reading.
    pub async fn enable_device(&mut self) -> Result<()> {
        debug!("Re-enabling device");
        self.expect_ack(CMD_ENABLEDEVICE, &[]).await
    }

    /// Play one of the device's voice prompts (0 = "thank you").
    pub async fn test_voice(&mut self, index: u32) -> Result<()> {
        self.expect_ack(CMD_TESTVOICE, &index.to_le_bytes()).await
    }

    /// Read user/record counts and capacities.
    pub async fn get_capacity(&mut self) -> Result<DeviceCapacity> {
        let response = self.send_command(CMD_GET_FREE_SIZES, &[]).await?;
        let capacity = parse_free_sizes(&response.data)?;
        debug!(
            "Device capacity: {} users, {} records (cap {})",
            capacity.users, capacity.records, capacity.records_cap
        );
        Ok(capacity)
    }

    /// Download every attendance record.
    ///
    /// `record_count` comes from [`get_capacity`](Self::get_capacity) and
    /// selects the binary record layout. `users` (from
    /// [`read_users`](Self::read_users)) maps slot numbers to enrollment
    /// numbers for firmware that stores only the slot.
    pub async fn read_attendance(&mut self, record_count: Option<u32>, users: &[DeviceUser]) -> Result<Vec<RawPunch>> {
        debug!("Starting attendance download");
        let raw_data = self.read_table(CMD_ATTLOG_RRQ, FCT_ATTLOG).await?;
        debug!("Downloaded {} bytes of raw attendance data", raw_data.len());
        let punches = parse_attendance_data(&raw_data, record_count, users)?;
        info!("Read {} attendance records", punches.len());
        Ok(punches)
    }

    /// Download the user table.
    pub async fn read_users(&mut self, user_count: Option<u32>) -> Result<Vec<DeviceUser>> {
        debug!("Starting user download");
        let raw_data = self.read_table(CMD_USERTEMP_RRQ, FCT_USER).await?;
        let users = parse_user_data(&raw_data, user_count)?;
        info!("Read {} users", users.len());
        Ok(users)
    }

    /// Buffered read of one table; frees the device buffer on failure.
    async fn read_table(&mut self, command: u16, fct: i32) -> Result<Vec<u8>> {
        let timeout_duration = self.timeout_duration;
        let session_id = self.session_id;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AppError::TcpConnectionFailed("Not connected".to_string()))?;

        let mut link = Link {
            stream,
            session_id,
            reply_id: &mut self.reply_id,
            timeout: timeout_duration,
        };

        match read_with_buffer(&mut link, command, fct).await {
            Ok(data) => Ok(data),
            Err(e) => {
                error!("Error during download: {e}, cleaning up");
                free_data(&mut link).await;
                Err(e)
            }
        }
    }

    /// Send a command and require CMD_ACK_OK.
    async fn expect_ack(&mut self, command: u16, data: &[u8]) -> Result<()> {
        let response = self.send_command(command, data).await?;
        if response.code != CMD_ACK_OK {
            return Err(AppError::TcpProtocolError(format!(
                "Command {command} answered with code {}",
                response.code
            )));
        }
        Ok(())
    }

    /// Send a command and receive response with metadata.
    async fn send_command(&mut self, command: u16, data: &[u8]) -> Result<TcpResponse> {
        let packet = build_packet(command, data, self.session_id, &mut self.reply_id);
        let timeout_duration = self.timeout_duration;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AppError::TcpConnectionFailed("Not connected".to_string()))?;

        exchange(stream, &packet, timeout_duration).await
    }

    /// Diagnose connection issues. Returns detailed status info.
    pub async fn diagnose_connection(&mut self) -> ConnectionDiagnosis {
        let addr = self.addr();
        let start = std::time::Instant::now();

        let tcp_result = timeout(self.timeout_duration, TcpStream::connect(&addr)).await;
        let tcp_connect_ms = start.elapsed().as_millis() as u64;

        let mut diagnosis = ConnectionDiagnosis {
            tcp_reachable: false,
            tcp_connect_ms,
            tcp_error: None,
            protocol_ok: false,
            protocol_error: None,
            session_id: None,
            device_response_code: None,
        };

        match tcp_result {
            Err(_) => {
                diagnosis.tcp_error = Some("TCP connection timeout".to_string());
                return diagnosis;
            }
            Ok(Err(e)) => {
                diagnosis.tcp_error = Some(format!("TCP error: {e}"));
                return diagnosis;
            }
            Ok(Ok(stream)) => {
                diagnosis.tcp_reachable = true;
                self.stream = Some(stream);
            }
        }

        match self.send_command(CMD_CONNECT, &[]).await {
            Err(e) => {
                self.stream = None;
                diagnosis.protocol_error = Some(e.to_string());
            }
            Ok(response) => {
                self.session_id = response.session_id;
                diagnosis.protocol_ok = true;
                diagnosis.session_id = Some(response.session_id);
                diagnosis.device_response_code = Some(response.code);
                if let Err(e) = self.disconnect().await {
                    warn!("Disconnect after diagnosis failed: {e}");
                }
            }
        }

        diagnosis
    }

    /// Get reply_id for testing purposes.
    #[cfg(test)]
    pub(crate) fn reply_id(&self) -> u16 {
        self.reply_id
    }

    /// Build packet for testing purposes.
    #[cfg(test)]
    pub(crate) fn build_packet_for_test(&mut self, command: u16, data: &[u8]) -> Vec<u8> {
        build_packet(command, data, self.session_id, &mut self.reply_id)
    }
}

/// Diagnostic information about connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectionDiagnosis {
    /// Whether TCP port was reachable
    pub tcp_reachable: bool,
    /// Time to establish TCP connection (ms)
    pub tcp_connect_ms: u64,
    /// TCP-level error if any
    pub tcp_error: Option<String>,
    /// Whether ZKTeco protocol handshake succeeded
    pub protocol_ok: bool,
    /// Protocol-level error if any
    pub protocol_error: Option<String>,
    /// Session ID from device (if connected)
    pub session_id: Option<u16>,
    /// Response code from CMD_CONNECT
    pub device_response_code: Option<u16>,
}

impl std::fmt::Display for ConnectionDiagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Connection Diagnosis ===")?;
        writeln!(f, "TCP Reachable: {}", self.tcp_reachable)?;
        writeln!(f, "TCP Connect Time: {}ms", self.tcp_connect_ms)?;

        if let Some(ref err) = self.tcp_error {
            writeln!(f, "TCP Error: {err}")?;
        }

        if self.tcp_reachable {
            writeln!(f, "Protocol OK: {}", self.protocol_ok)?;
            if let Some(ref err) = self.protocol_error {
                writeln!(f, "Protocol Error: {err}")?;
            }
            if let Some(code) = self.device_response_code {
                writeln!(f, "Device Response Code: {code}")?;
            }
            if let Some(sid) = self.session_id {
                writeln!(f, "Session ID: {sid}")?;
            }
        }

        Ok(())
    }
}
