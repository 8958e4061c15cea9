//! Error types for the monitor.

use dccex_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while running the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Reading a file or socket failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML configuration is malformed.
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// The serial port could not be opened or enumerated.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Writing to the command station failed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A `--tcp` address could not be parsed or resolved.
    #[error("Invalid TCP address '{0}', expected host:port")]
    InvalidAddress(String),

    /// Neither the file nor the flags named a transport.
    #[error("No transport configured; pass --tcp or --serial")]
    NoTransport,
}

/// Result type for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
