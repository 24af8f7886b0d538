//! ZKTeco TCP binary protocol client.
//!
//! Implements the binary protocol on port 4370 for reading the attendance log
//! and user table from a terminal's flash storage.

mod client;
mod io;
pub(crate) mod parser;
mod protocol;
mod transfer;
mod types;

#[cfg(test)]
pub(crate) mod fake_device;
#[cfg(test)]
mod tests;

// Re-export public API
pub use client::{ConnectionDiagnosis, ZkTcpClient};
pub use types::DeviceCapacity;
