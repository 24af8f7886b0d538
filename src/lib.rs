pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod service;
pub mod source;
pub mod zk_tcp;

pub use error::{AppError, Result};
