//! Byte channels over real transports.
//!
//! Both channels poll their underlying device without blocking and keep an
//! internal queue so the session can read one byte at a time.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use dccex_protocol::{ByteChannel, LINE_TERMINATOR};
use serialport::SerialPort;

use crate::config::TransportConfig;
use crate::error::{MonitorError, MonitorResult};

/// Time allowed to establish a TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Serial read timeout. Reads only happen when bytes are already waiting.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 512;

// ============================================================================
// TCP
// ============================================================================

/// Non-blocking TCP connection to a command station.
pub struct TcpChannel {
    stream: TcpStream,
    peer: SocketAddr,
    inbound: VecDeque<u8>,
    closed: bool,
}

impl TcpChannel {
    /// Connect to `host:port`, trying each resolved address in turn.
    pub fn connect(host: &str, port: u16) -> MonitorResult<Self> {
        let mut last_error = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(Self::from_stream(stream)?),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => MonitorError::Io(e),
            None => MonitorError::InvalidAddress(format!("{}:{}", host, port)),
        })
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(TcpChannel {
            stream,
            peer,
            inbound: VecDeque::new(),
            closed: false,
        })
    }

    /// Address of the command station.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// False once the station has closed the connection or a read failed.
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    fn fill(&mut self) {
        if self.closed {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    tracing::info!("Connection to {} closed", self.peer);
                    self.closed = true;
                    break;
                }
                Ok(n) => self.inbound.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Read from {} failed: {}", self.peer, e);
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl ByteChannel for TcpChannel {
    fn available(&mut self) -> usize {
        self.fill();
        self.inbound.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        // Commands are short; write them whole rather than queueing partial writes.
        self.stream.set_nonblocking(false)?;
        let result = self
            .stream
            .write_all(line.as_bytes())
            .and_then(|_| self.stream.write_all(LINE_TERMINATOR.as_bytes()))
            .and_then(|_| self.stream.flush());
        self.stream.set_nonblocking(true)?;
        result
    }
}

// ============================================================================
// Serial
// ============================================================================

/// Serial (USB) connection to a command station.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    name: String,
    inbound: VecDeque<u8>,
    closed: bool,
}

impl SerialChannel {
    /// Open `port` at `baud_rate`, 8N1 without flow control.
    pub fn open(port: &str, baud_rate: u32) -> MonitorResult<Self> {
        let device = serialport::new(port, baud_rate)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|e| {
                match e.kind() {
                    serialport::ErrorKind::NoDevice => {
                        tracing::error!("Serial port {} not found or busy", port)
                    }
                    serialport::ErrorKind::Io(kind) => {
                        tracing::error!("Serial port {} I/O error: {:?}", port, kind)
                    }
                    _ => tracing::error!("Serial port {} failed to open: {}", port, e),
                }
                MonitorError::Serial(e)
            })?;
        Ok(SerialChannel {
            port: device,
            name: port.to_string(),
            inbound: VecDeque::new(),
            closed: false,
        })
    }

    /// Name the port was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// False once the port has reported an error.
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    fn fill(&mut self) {
        if self.closed {
            return;
        }
        let waiting = match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                tracing::warn!("Serial port {} failed: {}", self.name, e);
                self.closed = true;
                return;
            }
        };
        if waiting == 0 {
            return;
        }
        let mut chunk = vec![0u8; waiting.min(READ_CHUNK)];
        match self.port.read(&mut chunk) {
            Ok(n) => self.inbound.extend(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => {
                tracing::warn!("Read from {} failed: {}", self.name, e);
                self.closed = true;
            }
        }
    }
}

impl ByteChannel for SerialChannel {
    fn available(&mut self) -> usize {
        self.fill();
        self.inbound.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(LINE_TERMINATOR.as_bytes())?;
        self.port.flush()
    }
}

/// Names of the serial ports present on this machine.
pub fn available_serial_ports() -> MonitorResult<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

// ============================================================================
// Transport
// ============================================================================

/// Either concrete channel, chosen from configuration.
pub enum Transport {
    /// Network socket.
    Tcp(TcpChannel),
    /// Serial port.
    Serial(SerialChannel),
}

impl Transport {
    /// Open the configured transport.
    pub fn open(config: &TransportConfig) -> MonitorResult<Self> {
        match config {
            TransportConfig::Tcp { host, port } => {
                let channel = TcpChannel::connect(host, *port)?;
                tracing::info!("Connected to {}", channel.peer());
                Ok(Transport::Tcp(channel))
            }
            TransportConfig::Serial { port, baud_rate } => {
                let channel = SerialChannel::open(port, *baud_rate)?;
                tracing::info!("Opened {} at {} baud", port, baud_rate);
                Ok(Transport::Serial(channel))
            }
        }
    }

    /// Whether the underlying channel is still usable.
    pub fn is_open(&self) -> bool {
        match self {
            Transport::Tcp(c) => c.is_open(),
            Transport::Serial(c) => c.is_open(),
        }
    }

    /// Human readable endpoint.
    pub fn describe(&self) -> String {
        match self {
            Transport::Tcp(c) => c.peer().to_string(),
            Transport::Serial(c) => c.name().to_string(),
        }
    }
}

impl ByteChannel for Transport {
    fn available(&mut self) -> usize {
        match self {
            Transport::Tcp(c) => c.available(),
            Transport::Serial(c) => c.available(),
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        match self {
            Transport::Tcp(c) => c.read_byte(),
            Transport::Serial(c) => c.read_byte(),
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            Transport::Tcp(c) => c.write_line(line),
            Transport::Serial(c) => c.write_line(line),
        }
    }
}
