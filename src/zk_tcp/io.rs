//! Framed socket I/O: every read and write is bounded by the session timeout.

use super::types::{HEADER_SIZE, MAX_PAYLOAD, PAYLOAD_MIN_SIZE, TCP_HEADER, TcpResponse};
use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{error, trace};

/// Largest slice handed to a single `read` while streaming raw data.
const RAW_READ_CHUNK: usize = 65536;

/// Run one socket operation under `limit`.
///
/// Elapsed time becomes [`AppError::DeviceTimeout`]; an I/O failure means the
/// link is gone and becomes [`AppError::TcpConnectionFailed`].
async fn timed<T>(limit: Duration, what: &str, op: impl Future<Output = std::io::Result<T>>) -> Result<T> {
    match timeout(limit, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("{what} failed: {e}");
            Err(AppError::TcpConnectionFailed(format!("{what} failed: {e}")))
        }
        Err(_) => {
            error!("{what} timed out after {limit:?}");
            Err(AppError::DeviceTimeout(format!("{what} timeout")))
        }
    }
}

/// Validate the 8-byte frame header and return the payload length it announces.
pub(crate) fn parse_header(header: &[u8; HEADER_SIZE]) -> Result<usize> {
    if header[0..4] != TCP_HEADER {
        return Err(AppError::TcpProtocolError(format!(
            "Invalid TCP header: {:02X?}",
            &header[0..4]
        )));
    }

    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if length > MAX_PAYLOAD {
        return Err(AppError::TcpProtocolError(format!("Payload too large: {length} bytes")));
    }
    Ok(length)
}

/// Split a payload into reply code, session id and data.
///
/// Payload layout: code(u16) checksum(u16) session(u16) reply(u16) data...
pub(crate) fn decode_payload(mut payload: Vec<u8>) -> Result<TcpResponse> {
    if payload.len() < PAYLOAD_MIN_SIZE {
        return Err(AppError::TcpProtocolError(format!(
            "Payload too small: {} bytes",
            payload.len()
        )));
    }

    let tcp_length = payload.len();
    let code = u16::from_le_bytes([payload[0], payload[1]]);
    let session_id = u16::from_le_bytes([payload[4], payload[5]]);
    let data = payload.split_off(PAYLOAD_MIN_SIZE);

    Ok(TcpResponse {
        code,
        session_id,
        data,
        tcp_length,
    })
}

pub(crate) async fn write_packet<S>(stream: &mut S, packet: &[u8], limit: Duration) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    trace!("TX ({} bytes): {:02X?}", packet.len(), &packet[..packet.len().min(32)]);
    timed(limit, "Write", stream.write_all(packet)).await
}

/// Read one framed reply.
pub(crate) async fn read_response<S>(stream: &mut S, limit: Duration) -> Result<TcpResponse>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_SIZE];
    timed(limit, "Header read", stream.read_exact(&mut header)).await?;
    trace!("RX header: {header:02X?}");

    let length = parse_header(&header).inspect_err(|e| error!("{e}"))?;

    let mut payload = vec![0u8; length];
    timed(limit, "Payload read", stream.read_exact(&mut payload)).await?;

    decode_payload(payload).inspect_err(|e| error!("{e}"))
}

/// Send a request packet and wait for its reply.
pub(crate) async fn exchange<S>(stream: &mut S, packet: &[u8], limit: Duration) -> Result<TcpResponse>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    write_packet(stream, packet, limit).await?;
    read_response(stream, limit).await
}

/// Read up to `size` unframed bytes that follow a data reply.
///
/// Returns fewer bytes when the peer closes the connection early.
pub(crate) async fn read_raw_data<S>(stream: &mut S, size: usize, limit: Duration) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut data = vec![0u8; size];
    let mut received = 0;

    while received < size {
        let end = received + (size - received).min(RAW_READ_CHUNK);
        let n = timed(limit, "Raw read", stream.read(&mut data[received..end])).await?;
        if n == 0 {
            break;
        }
        received += n;
    }

    data.truncate(received);
    Ok(data)
}
