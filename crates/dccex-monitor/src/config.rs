//! Monitor configuration.
//!
//! Loaded from a YAML file and then overridden by command line flags.
//!
//! ```yaml
//! transport:
//!   type: tcp
//!   host: 192.168.4.1
//!   port: 2560
//! session:
//!   heartbeat_ms: 5000
//! lists:
//!   turntables: false
//! poll_interval_ms: 10
//! ```

use std::fs;
use std::path::Path;

use dccex_protocol::{ListSelection, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Default DCC-EX TCP port on an EX-CommandStation.
pub const DEFAULT_TCP_PORT: u16 = 2560;

/// Default serial baud rate of an EX-CommandStation.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default delay between polls of the session.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

// ============================================================================
// Transport
// ============================================================================

/// How to reach the command station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Network socket.
    Tcp {
        /// Host name or IP address.
        host: String,
        /// TCP port, 2560 unless set.
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    /// Serial port, e.g. `/dev/ttyACM0` or `COM3`.
    Serial {
        /// Device path or COM port name.
        port: String,
        /// Baud rate, 115200 unless set.
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl TransportConfig {
    /// Parse a `host:port` pair. The port may be omitted.
    pub fn parse_tcp(address: &str) -> MonitorResult<Self> {
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| MonitorError::InvalidAddress(address.to_string()))?;
                (host, port)
            }
            None => (address, DEFAULT_TCP_PORT),
        };
        if host.is_empty() {
            return Err(MonitorError::InvalidAddress(address.to_string()));
        }
        Ok(TransportConfig::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

// ============================================================================
// Lists
// ============================================================================

/// Which lists to synchronize after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListsConfig {
    /// Fetch the roster.
    pub roster: bool,
    /// Fetch turnouts.
    pub turnouts: bool,
    /// Fetch routes and automations.
    pub routes: bool,
    /// Fetch turntables and their positions.
    pub turntables: bool,
}

impl Default for ListsConfig {
    fn default() -> Self {
        ListsConfig {
            roster: true,
            turnouts: true,
            routes: true,
            turntables: true,
        }
    }
}

impl ListsConfig {
    /// Synchronize nothing.
    pub fn none() -> Self {
        ListsConfig {
            roster: false,
            turnouts: false,
            routes: false,
            turntables: false,
        }
    }

    /// True if any list is wanted.
    pub fn any(&self) -> bool {
        self.roster || self.turnouts || self.routes || self.turntables
    }

    /// The equivalent session list selection.
    pub fn selection(&self) -> ListSelection {
        ListSelection {
            roster: self.roster,
            turnouts: self.turnouts,
            routes: self.routes,
            turntables: self.turntables,
        }
    }
}

// ============================================================================
// Monitor
// ============================================================================

/// Top-level monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Command station connection. Must be set by the file or the CLI.
    pub transport: Option<TransportConfig>,
    /// Session tunables.
    pub session: SessionConfig,
    /// Lists to synchronize.
    pub lists: ListsConfig,
    /// Delay between polls of the session.
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            transport: None,
            session: SessionConfig::default(),
            lists: ListsConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl MonitorConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str) -> MonitorResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> MonitorResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// The transport, or an error if none was configured.
    pub fn transport(&self) -> MonitorResult<&TransportConfig> {
        self.transport.as_ref().ok_or(MonitorError::NoTransport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_address() {
        assert_eq!(
            TransportConfig::parse_tcp("192.168.4.1:2560").unwrap(),
            TransportConfig::Tcp {
                host: "192.168.4.1".to_string(),
                port: 2560
            }
        );
        assert_eq!(
            TransportConfig::parse_tcp("dccex.local").unwrap(),
            TransportConfig::Tcp {
                host: "dccex.local".to_string(),
                port: DEFAULT_TCP_PORT
            }
        );
        assert!(TransportConfig::parse_tcp("host:port").is_err());
        assert!(TransportConfig::parse_tcp(":2560").is_err());
    }

    #[test]
    fn test_lists_selection() {
        let lists = ListsConfig {
            routes: false,
            ..ListsConfig::default()
        };
        let selection = lists.selection();
        assert!(selection.roster);
        assert!(!selection.routes);
        assert!(lists.any());
        assert!(!ListsConfig::none().any());
    }

    #[test]
    fn test_empty_config() {
        let config = MonitorConfig::from_yaml("{}").unwrap();
        assert_eq!(config.transport, None);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.session, SessionConfig::default());
        assert!(matches!(config.transport(), Err(MonitorError::NoTransport)));
    }
}
