//! Buffered data transfer orchestration (chunked reads).

use super::io::{exchange, read_raw_data, read_response};
use super::protocol::{build_packet, get_data_size_from_response};
use super::types::{
    CMD_ACK_OK, CMD_DATA, CMD_FREE_DATA, CMD_PREPARE_BUFFER, CMD_PREPARE_DATA, CMD_READ_BUFFER, MAX_CHUNK,
    PAYLOAD_MIN_SIZE, TcpResponse,
};
use crate::error::{AppError, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, error};

/// Protocol state shared by one buffered transfer.
pub(crate) struct Link<'a> {
    pub stream: &'a mut TcpStream,
    pub session_id: u16,
    pub reply_id: &'a mut u16,
    pub timeout: Duration,
}

impl Link<'_> {
    async fn request(&mut self, command: u16, data: &[u8]) -> Result<TcpResponse> {
        let packet = build_packet(command, data, self.session_id, self.reply_id);
        exchange(self.stream, &packet, self.timeout).await
    }
}

/// Read a whole device table using buffered commands.
///
/// `command` selects the table (e.g. ATTLOG or USERTEMP) and `fct` its
/// sub-function. Small tables come back inline in a CMD_DATA reply; larger
/// ones are announced with PREPARE_DATA and pulled in chunks.
pub(crate) async fn read_with_buffer(link: &mut Link<'_>, command: u16, fct: i32) -> Result<Vec<u8>> {
    // Layout: flag(1) + command(i16) + fct(i32) + ext(i32)
    let mut cmd_data = Vec::with_capacity(11);
    cmd_data.push(1u8);
    cmd_data.extend_from_slice(&(command as i16).to_le_bytes());
    cmd_data.extend_from_slice(&fct.to_le_bytes());
    cmd_data.extend_from_slice(&0i32.to_le_bytes());

    debug!("PREPARE_BUFFER: command={command}, fct={fct}");

    let response = link.request(CMD_PREPARE_BUFFER, &cmd_data).await?;

    debug!(
        "PREPARE_BUFFER response: code={}, data_len={}, tcp_length={}",
        response.code,
        response.data.len(),
        response.tcp_length
    );

    if response.code == CMD_DATA {
        return complete_inline_data(link, response).await;
    }

    // CMD_PREPARE_DATA response - size is at offset 1-5 in data portion
    if response.data.len() < 5 {
        error!("PREPARE_BUFFER response data too small: {} bytes", response.data.len());
        return Err(AppError::TcpProtocolError(format!(
            "PREPARE_BUFFER response data too small: {} bytes",
            response.data.len()
        )));
    }

    let size = u32::from_le_bytes([response.data[1], response.data[2], response.data[3], response.data[4]]) as usize;

    debug!("PREPARE_DATA: total size = {size} bytes");

    if size == 0 {
        return Ok(Vec::new());
    }

    let remain = size % MAX_CHUNK;
    let packets = (size - remain) / MAX_CHUNK;

    debug!("Reading {packets} full chunks + {remain} bytes remaining");

    let mut all_data = Vec::with_capacity(size);
    let mut start: u32 = 0;

    for i in 0..packets {
        debug!("Reading chunk {}/{packets} at offset {start}", i + 1);
        let chunk = read_chunk(link, start, MAX_CHUNK as u32).await?;
        all_data.extend_from_slice(&chunk);
        start += MAX_CHUNK as u32;
    }

    if remain > 0 {
        debug!("Reading final {remain} bytes at offset {start}");
        let chunk = read_chunk(link, start, remain as u32).await?;
        all_data.extend_from_slice(&chunk);
    }

    debug!("Freeing device buffer");
    free_data(link).await;

    Ok(all_data)
}

/// Release the device-side transfer buffer. Failures are only logged.
pub(crate) async fn free_data(link: &mut Link<'_>) {
    if let Err(e) = link.request(CMD_FREE_DATA, &[]).await {
        debug!("FREE_DATA failed: {e}");
    }
}

/// Append any bytes of a CMD_DATA reply that did not fit in the first read.
async fn complete_inline_data(link: &mut Link<'_>, response: TcpResponse) -> Result<Vec<u8>> {
    // tcp_length includes the 8-byte header, so actual data = tcp_length - 8
    let expected_data_len = response.tcp_length.saturating_sub(PAYLOAD_MIN_SIZE);
    let mut data = response.data;

    if data.len() < expected_data_len {
        let need = expected_data_len - data.len();
        debug!("Need {need} more bytes of raw data");
        let more = read_raw_data(link.stream, need, link.timeout).await?;
        data.extend_from_slice(&more);
    }

    Ok(data)
}

/// Read a chunk from the device buffer, retrying up to three times.
async fn read_chunk(link: &mut Link<'_>, start: u32, size: u32) -> Result<Vec<u8>> {
    let mut cmd_data = Vec::with_capacity(8);
    cmd_data.extend_from_slice(&(start as i32).to_le_bytes());
    cmd_data.extend_from_slice(&(size as i32).to_le_bytes());

    for retry in 0..3 {
        if retry > 0 {
            debug!("Retry {retry}/3 for chunk at {start}");
        }

        let response = link.request(CMD_READ_BUFFER, &cmd_data).await?;

        debug!(
            "READ_BUFFER response: code={}, data_len={}, tcp_length={}",
            response.code,
            response.data.len(),
            response.tcp_length
        );

        if let Some(data) = receive_chunk(link, response).await? {
            return Ok(data);
        }
    }

    error!("Failed to read chunk at offset {start} after 3 retries");
    Err(AppError::TcpProtocolError(format!(
        "Failed to read chunk at offset {start} after 3 retries"
    )))
}

/// Receive chunk data after a READ_BUFFER command.
async fn receive_chunk(link: &mut Link<'_>, response: TcpResponse) -> Result<Option<Vec<u8>>> {
    match response.code {
        CMD_DATA => complete_inline_data(link, response).await.map(Some),
        CMD_PREPARE_DATA => {
            let size = get_data_size_from_response(&response)?;
            receive_tcp_data(link, &response, size).await.map(Some)
        }
        code => {
            debug!("receive_chunk: unexpected response code {code}");
            Ok(None)
        }
    }
}

/// Receive TCP data after PREPARE_DATA response.
async fn receive_tcp_data(link: &mut Link<'_>, response: &TcpResponse, size: usize) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(size);

    // Anything after the 8-byte size block is already chunk data
    if response.data.len() > 8 {
        data.extend_from_slice(&response.data[8..]);
    }

    if data.len() < size {
        let need = size - data.len();
        let more = read_raw_data(link.stream, need, link.timeout).await?;
        data.extend_from_slice(&more);
    }

    let ack_response = read_response(link.stream, link.timeout).await?;
    if ack_response.code != CMD_ACK_OK {
        debug!("Expected ACK_OK but got {} after data receive", ack_response.code);
    }

    Ok(data)
}
