//! ZKTeco protocol types and constants.

// Command codes
pub(crate) const CMD_CONNECT: u16 = 1000;
pub(crate) const CMD_EXIT: u16 = 1001;
pub(crate) const CMD_DISABLEDEVICE: u16 = 1003;
pub(crate) const CMD_ENABLEDEVICE: u16 = 1004;
pub(crate) const CMD_TESTVOICE: u16 = 1017;
pub(crate) const CMD_AUTH: u16 = 1102;
pub(crate) const CMD_GET_FREE_SIZES: u16 = 50;
pub(crate) const CMD_USERTEMP_RRQ: u16 = 9;
pub(crate) const CMD_ATTLOG_RRQ: u16 = 13;

// Data transfer commands
pub(crate) const CMD_PREPARE_DATA: u16 = 1500;
pub(crate) const CMD_DATA: u16 = 1501;
pub(crate) const CMD_FREE_DATA: u16 = 1502;
pub(crate) const CMD_PREPARE_BUFFER: u16 = 1503;
pub(crate) const CMD_READ_BUFFER: u16 = 1504;

// Response codes
pub(crate) const CMD_ACK_OK: u16 = 2000;
pub(crate) const CMD_ACK_UNAUTH: u16 = 2005;

// Table selectors for buffered reads
pub(crate) const FCT_ATTLOG: i32 = 0;
pub(crate) const FCT_USER: i32 = 5;

// Protocol constants
pub(crate) const TCP_HEADER: [u8; 4] = [0x50, 0x50, 0x82, 0x7D];
pub(crate) const HEADER_SIZE: usize = 8;
pub(crate) const PAYLOAD_MIN_SIZE: usize = 8; // cmd(2) + checksum(2) + session(2) + reply(2)
pub(crate) const MAX_CHUNK: usize = 0xFFC0; // ~65KB per chunk for TCP
pub(crate) const MAX_PAYLOAD: usize = 1_000_000;

/// Response from device including metadata.
#[derive(Debug, Clone)]
pub(crate) struct TcpResponse {
    /// Response code from device
    pub code: u16,
    /// Session ID echoed (or assigned) by the device
    pub session_id: u16,
    /// Payload data (after 8-byte header)
    pub data: Vec<u8>,
    /// Expected TCP payload length from header
    pub tcp_length: usize,
}

/// Storage usage reported by CMD_GET_FREE_SIZES.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCapacity {
    pub users: u32,
    pub fingers: u32,
    pub records: u32,
    pub users_cap: u32,
    pub records_cap: u32,
}
