//! Error types and handling.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// TCP connection failed
    #[error("TCP connection failed: {0}")]
    TcpConnectionFailed(String),

    /// TCP protocol error (bad header, unexpected reply, short payload)
    #[error("TCP protocol error: {0}")]
    TcpProtocolError(String),

    /// Device communication timeout
    #[error("Device timeout: {0}")]
    DeviceTimeout(String),

    /// Device rejected the communication key
    #[error("Device rejected the communication password")]
    DeviceUnauthorized,

    /// Offline punch dump could not be opened or read
    #[error("Punch source unavailable: {0}")]
    SourceUnavailable(String),

    /// TCP data parsing error
    #[error("TCP invalid data: {0}")]
    TcpInvalidData(String),

    /// Data parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Excel export error
    #[error("Export error: {0}")]
    Export(String),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a parse error with message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Whether this failure came from the punch source (terminal or dump file).
    ///
    /// Connector errors abort the whole request; they are never produced by
    /// the aggregation engine itself.
    pub fn is_connector(&self) -> bool {
        matches!(
            self,
            Self::TcpConnectionFailed(_)
                | Self::TcpProtocolError(_)
                | Self::DeviceTimeout(_)
                | Self::DeviceUnauthorized
                | Self::SourceUnavailable(_)
                | Self::TcpInvalidData(_)
        )
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Export(err.to_string())
    }
}
