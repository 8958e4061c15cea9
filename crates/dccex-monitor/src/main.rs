//! dccex-monitor - watch a DCC-EX command station from the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use dccex_monitor::config::DEFAULT_BAUD_RATE;
use dccex_monitor::transport::available_serial_ports;
use dccex_monitor::{ListsConfig, Monitor, MonitorConfig, MonitorResult, TransportConfig};
use tracing_subscriber::EnvFilter;

/// Connect to a DCC-EX command station and log everything it reports.
#[derive(Parser, Debug)]
#[command(name = "dccex-monitor", version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connect over TCP to host[:port]
    #[arg(long, conflicts_with = "serial")]
    tcp: Option<String>,

    /// Connect to a serial port
    #[arg(long)]
    serial: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Send a heartbeat after this many idle milliseconds
    #[arg(long)]
    heartbeat_ms: Option<u64>,

    /// Skip roster, turnout, route and turntable synchronization
    #[arg(long)]
    no_lists: bool,

    /// Log filter, e.g. "debug" or "dccex_protocol=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    /// Load the config file, if any, then apply flags on top.
    fn resolve_config(&self) -> MonitorResult<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_file(path)?,
            None => MonitorConfig::default(),
        };

        if let Some(address) = &self.tcp {
            config.transport = Some(TransportConfig::parse_tcp(address)?);
        }
        if let Some(port) = &self.serial {
            config.transport = Some(TransportConfig::Serial {
                port: port.clone(),
                baud_rate: self.baud.unwrap_or(DEFAULT_BAUD_RATE),
            });
        } else if let (Some(baud), Some(TransportConfig::Serial { baud_rate, .. })) =
            (self.baud, config.transport.as_mut())
        {
            *baud_rate = baud;
        }
        if let Some(interval) = self.heartbeat_ms {
            config.session.heartbeat_ms = Some(interval);
        }
        if self.no_lists {
            config.lists = ListsConfig::none();
        }
        Ok(config)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> MonitorResult<()> {
    if cli.list_ports {
        for port in available_serial_ports()? {
            println!("{}", port);
        }
        return Ok(());
    }

    let config = cli.resolve_config()?;
    let mut monitor = Monitor::connect(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    monitor.run(&running)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
