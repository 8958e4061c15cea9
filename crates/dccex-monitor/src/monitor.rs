//! The polling loop.
//!
//! The session is single threaded and never blocks, so the monitor simply
//! polls it at a fixed interval until asked to stop or the station hangs up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use dccex_protocol::{ByteChannel, ProtocolDelegate, Session};

use crate::config::{ListsConfig, MonitorConfig};
use crate::delegate::TracingDelegate;
use crate::error::MonitorResult;
use crate::transport::Transport;

/// A session bound to a channel plus the monitor's polling policy.
pub struct Monitor<C: ByteChannel = Transport> {
    session: Session<C>,
    lists: ListsConfig,
    poll_interval: Duration,
    lists_reported: bool,
}

impl Monitor<Transport> {
    /// Open the configured transport and build a monitor around it.
    pub fn connect(config: &MonitorConfig) -> MonitorResult<Self> {
        let transport = Transport::open(config.transport()?)?;
        Ok(Self::new(config, transport, Box::new(TracingDelegate::new())))
    }

    /// Poll until `running` is cleared or the connection closes.
    pub fn run(&mut self, running: &AtomicBool) -> MonitorResult<()> {
        self.start()?;
        while running.load(Ordering::SeqCst) {
            self.poll()?;
            if !self.session.channel().is_some_and(Transport::is_open) {
                tracing::warn!("Command station closed the connection");
                break;
            }
            thread::sleep(self.poll_interval);
        }
        self.shutdown();
        Ok(())
    }
}

impl<C: ByteChannel> Monitor<C> {
    /// Build a monitor over an already opened channel.
    pub fn new(config: &MonitorConfig, channel: C, delegate: Box<dyn ProtocolDelegate>) -> Self {
        let mut session = Session::new(config.session.clone());
        session.connect(channel);
        session.set_delegate(delegate);
        Monitor {
            session,
            lists: config.lists,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            lists_reported: false,
        }
    }

    /// Ask the station to identify itself.
    pub fn start(&mut self) -> MonitorResult<()> {
        self.session.request_server_version()?;
        Ok(())
    }

    /// One iteration: drain input, then advance list synchronization.
    pub fn poll(&mut self) -> MonitorResult<()> {
        self.session.check()?;
        if !self.lists.any() || self.lists_reported {
            return Ok(());
        }
        self.session.get_lists(self.lists.selection())?;
        if self.session.received_lists() {
            self.lists_reported = true;
            tracing::info!(
                roster = self.session.roster_count(),
                turnouts = self.session.turnout_count(),
                routes = self.session.route_count(),
                turntables = self.session.turntable_count(),
                "Lists synchronized"
            );
        }
        Ok(())
    }

    /// Whether the requested lists have all arrived.
    pub fn lists_synchronized(&self) -> bool {
        self.lists_reported
    }

    /// Send the disconnect notice and release the channel.
    pub fn shutdown(&mut self) -> Option<C> {
        let channel = self.session.disconnect();
        if channel.is_some() {
            tracing::info!("Disconnected");
        }
        channel
    }

    /// The underlying protocol session.
    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// The underlying protocol session, mutably, for sending commands.
    pub fn session_mut(&mut self) -> &mut Session<C> {
        &mut self.session
    }
}
