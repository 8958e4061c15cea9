//! DCC-EX Monitor
//!
//! Connects a [`dccex_protocol::Session`] to a command station over TCP or a
//! serial port, synchronizes the requested lists and logs every event the
//! station reports.

#![warn(missing_docs)]

pub mod config;
pub mod delegate;
pub mod error;
pub mod monitor;
pub mod transport;

pub use config::{ListsConfig, MonitorConfig, TransportConfig};
pub use delegate::TracingDelegate;
pub use error::{MonitorError, MonitorResult};
pub use monitor::Monitor;
pub use transport::{SerialChannel, TcpChannel, Transport};
