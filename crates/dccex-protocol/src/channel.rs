//! Byte channel contract between the session and a transport.
//!
//! The session never blocks: it asks how many bytes are ready, reads them one
//! at a time, and writes whole command lines.

use std::collections::VecDeque;
use std::io;

use bytes::{BufMut, BytesMut};

/// Line terminator appended to every outbound command.
pub const LINE_TERMINATOR: &str = "\r\n";

/// A non-blocking duplex byte stream.
pub trait ByteChannel {
    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Read one byte, or `None` if nothing is ready.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write one command line, adding the transport's terminator.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }
}

/// In-memory loopback channel.
///
/// Bytes queued with [`load`](MemoryChannel::load) are what the session reads;
/// everything the session writes accumulates until
/// [`take_output`](MemoryChannel::take_output) drains it.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    inbound: VecDeque<u8>,
    outbound: BytesMut,
}

impl MemoryChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue text for the session to read.
    pub fn load(&mut self, data: &str) {
        self.load_bytes(data.as_bytes());
    }

    /// Queue raw bytes for the session to read.
    pub fn load_bytes(&mut self, data: &[u8]) {
        self.inbound.extend(data);
    }

    /// Drain everything written so far.
    pub fn take_output(&mut self) -> String {
        let out = self.outbound.split();
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Drain everything written so far as individual lines.
    pub fn take_lines(&mut self) -> Vec<String> {
        self.take_output()
            .split(LINE_TERMINATOR)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether queued inbound bytes remain.
    pub fn has_pending_input(&self) -> bool {
        !self.inbound.is_empty()
    }
}

impl ByteChannel for MemoryChannel {
    fn available(&mut self) -> usize {
        self.inbound.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.outbound.put_slice(line.as_bytes());
        self.outbound.put_slice(LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_channel_loopback() {
        let mut channel = MemoryChannel::new();
        channel.load("<p1>");
        assert_eq!(channel.available(), 4);
        assert_eq!(channel.read_byte(), Some(b'<'));
        assert_eq!(channel.available(), 3);

        channel.write_line("<s>").unwrap();
        channel.write_line("<#>").unwrap();
        assert_eq!(channel.take_output(), "<s>\r\n<#>\r\n");
        assert_eq!(channel.take_output(), "");
    }

    #[test]
    fn test_take_lines() {
        let mut channel = MemoryChannel::new();
        channel.write_line("<JR>").unwrap();
        channel.write_line("<JT>").unwrap();
        assert_eq!(channel.take_lines(), vec!["<JR>", "<JT>"]);
    }

    #[test]
    fn test_empty_read() {
        let mut channel = MemoryChannel::new();
        assert_eq!(channel.read_byte(), None);
        assert!(!channel.has_pending_input());
    }
}
