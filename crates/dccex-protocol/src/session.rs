//! The protocol engine.
//!
//! A [`Session`] owns the byte channel, reassembles frames from the inbound
//! stream, keeps the [`Registry`] in step with what the command station
//! reports, and renders every outbound [`Command`].
//!
//! # Polling
//!
//! Nothing runs in the background. Call [`Session::check`] regularly: it
//! drains whatever bytes are ready, dispatches each complete frame, and sends
//! a heartbeat if one is due. [`Session::get_lists`] can be called on the same
//! cadence; it only sends when the next list is due.
//!
//! # Armed and idle
//!
//! Until a delegate is attached with [`Session::set_delegate`] the session is
//! idle: inbound frames are read and discarded and every outbound operation is
//! a silent no-op.

mod dispatch;

use bytes::BytesMut;
use log::{debug, trace, warn};

use crate::channel::ByteChannel;
use crate::clock::{Clock, MonotonicClock};
use crate::commands::{Command, PowerTarget};
use crate::config::SessionConfig;
use crate::consist::Consist;
use crate::entities::{Route, Turnout, Turntable};
use crate::error::ProtocolResult;
use crate::events::ProtocolDelegate;
use crate::frame::Tokenizer;
use crate::loco::{Loco, LocoRef};
use crate::registry::{EntityList, Registry};
use crate::sync::{ListKind, ListSelection, ListSync, SyncStep};
use crate::types::{Direction, RouteType, ServerVersion, TrackMode, TurntableType, MAX_SPEED};

/// Activity code an EX-Turntable uses to return to its home position.
const EX_TURNTABLE_HOME_ACTIVITY: i32 = 2;

/// Client session with one command station.
pub struct Session<C, K = MonotonicClock> {
    channel: Option<C>,
    clock: K,
    delegate: Option<Box<dyn ProtocolDelegate>>,
    buffer: BytesMut,
    max_buffer: usize,
    tokenizer: Tokenizer,
    registry: Registry,
    lists: ListSync,
    version: Option<ServerVersion>,
    last_response_ms: u64,
    heartbeat_ms: Option<u64>,
    last_sent_ms: u64,
}

impl<C: ByteChannel> Session<C, MonotonicClock> {
    /// Create an unconnected session timed by the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: ByteChannel, K: Clock> Session<C, K> {
    /// Create an unconnected session with a custom clock.
    pub fn with_clock(config: SessionConfig, clock: K) -> Self {
        Session {
            channel: None,
            clock,
            delegate: None,
            buffer: BytesMut::with_capacity(config.max_command_buffer),
            max_buffer: config.max_command_buffer,
            tokenizer: Tokenizer::new(config.max_command_params),
            registry: Registry::new(),
            lists: ListSync::new(),
            version: None,
            last_response_ms: 0,
            heartbeat_ms: config.heartbeat_ms,
            last_sent_ms: 0,
        }
    }

    // ========== Connection ==========

    /// Attach the byte channel, replacing any previous one.
    pub fn connect(&mut self, channel: C) {
        self.buffer.clear();
        self.last_response_ms = self.clock.now_millis();
        self.channel = Some(channel);
    }

    /// Send the disconnect notice and detach the channel.
    ///
    /// The notice is best effort; a write failure is logged and the channel is
    /// still returned.
    pub fn disconnect(&mut self) -> Option<C> {
        if let Err(e) = self.send(&Command::Disconnect) {
            warn!("Failed to send disconnect notice: {}", e);
        }
        self.channel.take()
    }

    /// Whether a channel is attached.
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// The attached channel.
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// The attached channel, mutably.
    pub fn channel_mut(&mut self) -> Option<&mut C> {
        self.channel.as_mut()
    }

    /// Attach the event sink. The session does nothing until one is attached.
    pub fn set_delegate(&mut self, delegate: Box<dyn ProtocolDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Detach and return the event sink, idling the session.
    pub fn take_delegate(&mut self) -> Option<Box<dyn ProtocolDelegate>> {
        self.delegate.take()
    }

    /// Whether an event sink is attached.
    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /// Send `<#>` whenever nothing has been sent for `interval_ms`.
    pub fn enable_heartbeat(&mut self, interval_ms: u64) {
        self.heartbeat_ms = Some(interval_ms);
    }

    /// Stop sending heartbeats.
    pub fn disable_heartbeat(&mut self) {
        self.heartbeat_ms = None;
    }

    // ========== Inbound ==========

    /// Drain the channel, dispatch complete frames, and send a heartbeat if due.
    ///
    /// Only a failed heartbeat write is reported; everything that goes wrong
    /// while dispatching is logged and skipped.
    pub fn check(&mut self) -> ProtocolResult<()> {
        loop {
            let Some(channel) = self.channel.as_mut() else {
                break;
            };
            if channel.available() == 0 {
                break;
            }
            let Some(byte) = channel.read_byte() else {
                break;
            };

            if self.buffer.len() + 1 < self.max_buffer {
                self.buffer.extend_from_slice(&[byte]);
            } else {
                trace!("Inbound buffer full, discarding {} bytes", self.buffer.len());
                self.buffer.clear();
            }

            if byte == b'>' {
                let raw = self.buffer.split().freeze();
                self.process_frame(&raw);
            }
        }

        self.heartbeat()
    }

    fn process_frame(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        match self.tokenizer.parse(&text) {
            Ok(frame) => {
                trace!("<== {}", text);
                self.dispatch(&frame);
            }
            Err(e) => trace!("Dropped frame {:?}: {}", text, e),
        }
    }

    fn heartbeat(&mut self) -> ProtocolResult<()> {
        let Some(interval) = self.heartbeat_ms else {
            return Ok(());
        };
        if self.clock.now_millis().saturating_sub(self.last_sent_ms) > interval {
            self.send(&Command::Heartbeat)?;
        }
        Ok(())
    }

    // ========== Outbound ==========

    /// Send a command.
    ///
    /// A no-op without a delegate or channel. Resets the heartbeat timer.
    pub fn send(&mut self, command: &Command) -> ProtocolResult<()> {
        if self.delegate.is_none() {
            return Ok(());
        }
        self.write(command)
    }

    /// Write without the delegate check. Dispatch only runs while armed, and
    /// holds the delegate while it does.
    fn write(&mut self, command: &Command) -> ProtocolResult<()> {
        let Some(channel) = self.channel.as_mut() else {
            return Ok(());
        };
        let line = command.to_command_string();
        trace!("==> {}", line);
        channel.write_line(&line)?;
        self.last_sent_ms = self.clock.now_millis();
        Ok(())
    }

    /// Send arbitrary command text, adding the brackets.
    pub fn send_command(&mut self, command: &str) -> ProtocolResult<()> {
        self.send(&Command::Raw {
            command: command.to_string(),
        })
    }

    /// Send from inside dispatch, where failures must not interrupt processing.
    fn send_quietly(&mut self, command: Command) {
        if let Err(e) = self.write(&command) {
            warn!("Failed to send {}: {}", command, e);
        }
    }

    // ========== Server ==========

    /// Ask for the server banner.
    pub fn request_server_version(&mut self) -> ProtocolResult<()> {
        self.send(&Command::RequestServerVersion)
    }

    /// Whether the server version has been received.
    pub fn received_version(&self) -> bool {
        self.version.is_some()
    }

    /// Server version, once received.
    pub fn version(&self) -> Option<ServerVersion> {
        self.version
    }

    /// Clock time of the last processed frame, or of connecting.
    pub fn last_server_response(&self) -> u64 {
        self.last_response_ms
    }

    /// Ask how many locos the command station can drive.
    pub fn request_supported_locos(&mut self) -> ProtocolResult<()> {
        self.send(&Command::RequestSupportedLocos)
    }

    // ========== Lists ==========

    /// Request the next required list, if one is due.
    ///
    /// Safe to call on every poll: at most one overview request is ever in
    /// flight, and lists are fetched in the order roster, turnouts, routes,
    /// turntables.
    pub fn get_lists(&mut self, selection: ListSelection) -> ProtocolResult<()> {
        match self.lists.next_step(selection) {
            SyncStep::Request(kind) => {
                if self.delegate.is_none() || self.channel.is_none() {
                    return Ok(());
                }
                debug!("Requesting {:?} list", kind);
                self.send(&kind.overview_command())?;
                self.lists.mark_requested(kind);
            }
            SyncStep::Waiting(_) => {}
            SyncStep::Complete => {}
        }
        Ok(())
    }

    /// Whether every required list has been received.
    pub fn received_lists(&self) -> bool {
        self.lists.all_received()
    }

    /// Sync state of each list.
    pub fn list_sync(&self) -> &ListSync {
        &self.lists
    }

    /// Everything learnt from the command station.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn clear_list(&mut self, kind: ListKind) {
        match kind {
            ListKind::Roster => self.registry.roster.clear(),
            ListKind::Turnouts => self.registry.turnouts.clear(),
            ListKind::Routes => self.registry.routes.clear(),
            ListKind::Turntables => self.registry.turntables.clear(),
        }
    }

    fn refresh_list(&mut self, kind: ListKind) {
        self.clear_list(kind);
        self.lists.reset(kind);
    }

    /// Empty every list.
    pub fn clear_all_lists(&mut self) {
        self.registry.clear();
    }

    /// Empty every list and fetch them all again on the next
    /// [`get_lists`](Self::get_lists).
    pub fn refresh_all_lists(&mut self) {
        for kind in ListKind::ORDER {
            self.refresh_list(kind);
        }
    }

    // ========== Locos ==========

    /// Set a loco's speed and direction. Speed is clamped to 0-126.
    pub fn set_throttle(&mut self, loco: &Loco, speed: u8, direction: Direction) -> ProtocolResult<()> {
        self.throttle(loco.address(), speed, direction)
    }

    fn throttle(&mut self, address: i32, speed: u8, direction: Direction) -> ProtocolResult<()> {
        self.send(&Command::Throttle {
            address,
            speed: speed.min(MAX_SPEED),
            direction,
        })
    }

    /// Turn a loco function on.
    pub fn function_on(&mut self, loco: &Loco, function: u8) -> ProtocolResult<()> {
        self.function(loco.address(), function, true)
    }

    /// Turn a loco function off.
    pub fn function_off(&mut self, loco: &Loco, function: u8) -> ProtocolResult<()> {
        self.function(loco.address(), function, false)
    }

    fn function(&mut self, address: i32, function: u8, on: bool) -> ProtocolResult<()> {
        if address < 0 {
            return Ok(());
        }
        self.send(&Command::Function { address, function, on })
    }

    /// Ask the command station to broadcast a loco's current state.
    pub fn request_loco_update(&mut self, address: i32) -> ProtocolResult<()> {
        self.send(&Command::RequestLocoUpdate { address })
    }

    /// Read the address of the loco on the programming track.
    pub fn read_loco(&mut self) -> ProtocolResult<()> {
        self.send(&Command::ReadLocoAddress)
    }

    /// Stop every loco.
    pub fn emergency_stop(&mut self) -> ProtocolResult<()> {
        self.send(&Command::EmergencyStop)
    }

    // ========== Consists ==========

    /// Drive every member of a consist, inverting direction for members that
    /// face backwards.
    pub fn set_consist_throttle(
        &mut self,
        consist: &Consist,
        speed: u8,
        direction: Direction,
    ) -> ProtocolResult<()> {
        for member in consist.members() {
            self.throttle(member.address(), speed, member.direction_for(direction))?;
        }
        Ok(())
    }

    /// Turn a function on for every member of a consist.
    pub fn consist_function_on(&mut self, consist: &Consist, function: u8) -> ProtocolResult<()> {
        for member in consist.members() {
            self.function(member.address(), function, true)?;
        }
        Ok(())
    }

    /// Turn a function off for every member of a consist.
    pub fn consist_function_off(&mut self, consist: &Consist, function: u8) -> ProtocolResult<()> {
        for member in consist.members() {
            self.function(member.address(), function, false)?;
        }
        Ok(())
    }

    // ========== Roster ==========

    /// Roster locos in wire order.
    pub fn roster(&self) -> &EntityList<LocoRef> {
        &self.registry.roster
    }

    /// Number of roster locos.
    pub fn roster_count(&self) -> usize {
        self.registry.roster.len()
    }

    /// Whether the roster has been fully received.
    pub fn received_roster(&self) -> bool {
        self.lists.is_received(ListKind::Roster)
    }

    /// Roster loco with this address.
    pub fn find_loco_in_roster(&self, address: i32) -> Option<LocoRef> {
        self.registry.roster.get(address).cloned()
    }

    /// Empty the roster. Handles held elsewhere stay valid.
    pub fn clear_roster(&mut self) {
        self.clear_list(ListKind::Roster);
    }

    /// Empty the roster and fetch it again on the next `get_lists`.
    pub fn refresh_roster(&mut self) {
        self.refresh_list(ListKind::Roster);
    }

    // ========== Turnouts ==========

    /// Turnouts in wire order.
    pub fn turnouts(&self) -> &EntityList<Turnout> {
        &self.registry.turnouts
    }

    /// Number of turnouts.
    pub fn turnout_count(&self) -> usize {
        self.registry.turnouts.len()
    }

    /// Whether the turnout list has been fully received.
    pub fn received_turnout_list(&self) -> bool {
        self.lists.is_received(ListKind::Turnouts)
    }

    /// Turnout with this id.
    pub fn turnout(&self, id: i32) -> Option<&Turnout> {
        self.registry.turnouts.get(id)
    }

    /// Close a turnout.
    pub fn close_turnout(&mut self, id: i32) -> ProtocolResult<()> {
        self.send(&Command::Turnout { id, thrown: false })
    }

    /// Throw a turnout.
    pub fn throw_turnout(&mut self, id: i32) -> ProtocolResult<()> {
        self.send(&Command::Turnout { id, thrown: true })
    }

    /// Flip a known turnout. Unknown ids are ignored.
    pub fn toggle_turnout(&mut self, id: i32) -> ProtocolResult<()> {
        match self.registry.turnouts.get(id) {
            Some(turnout) => {
                let thrown = !turnout.is_thrown();
                self.send(&Command::Turnout { id, thrown })
            }
            None => Ok(()),
        }
    }

    /// Empty the turnout list.
    pub fn clear_turnout_list(&mut self) {
        self.clear_list(ListKind::Turnouts);
    }

    /// Empty the turnout list and fetch it again on the next `get_lists`.
    pub fn refresh_turnout_list(&mut self) {
        self.refresh_list(ListKind::Turnouts);
    }

    // ========== Routes ==========

    /// Routes and automations in wire order.
    pub fn routes(&self) -> &EntityList<Route> {
        &self.registry.routes
    }

    /// Number of routes and automations.
    pub fn route_count(&self) -> usize {
        self.registry.routes.len()
    }

    /// Whether the route list has been fully received.
    pub fn received_route_list(&self) -> bool {
        self.lists.is_received(ListKind::Routes)
    }

    /// Route with this id.
    pub fn route(&self, id: i32) -> Option<&Route> {
        self.registry.routes.get(id)
    }

    /// Start a route or automation.
    pub fn start_route(&mut self, id: i32) -> ProtocolResult<()> {
        self.send(&Command::StartRoute { id })
    }

    /// Start an automation with a loco.
    ///
    /// Ignored unless `automation_id` is a known automation; plain routes
    /// cannot take a loco.
    pub fn hand_off_loco(&mut self, address: i32, automation_id: i32) -> ProtocolResult<()> {
        let is_automation = self
            .registry
            .routes
            .get(automation_id)
            .is_some_and(|r| r.route_type() == RouteType::Automation);
        if !is_automation {
            return Ok(());
        }
        self.send(&Command::HandOffLoco { address, automation_id })
    }

    /// Pause all automations.
    pub fn pause_routes(&mut self) -> ProtocolResult<()> {
        self.send(&Command::PauseRoutes)
    }

    /// Resume all automations.
    pub fn resume_routes(&mut self) -> ProtocolResult<()> {
        self.send(&Command::ResumeRoutes)
    }

    /// Empty the route list.
    pub fn clear_route_list(&mut self) {
        self.clear_list(ListKind::Routes);
    }

    /// Empty the route list and fetch it again on the next `get_lists`.
    pub fn refresh_route_list(&mut self) {
        self.refresh_list(ListKind::Routes);
    }

    // ========== Turntables ==========

    /// Turntables in wire order.
    pub fn turntables(&self) -> &EntityList<Turntable> {
        &self.registry.turntables
    }

    /// Number of turntables.
    pub fn turntable_count(&self) -> usize {
        self.registry.turntables.len()
    }

    /// Whether every turntable and its positions have been received.
    pub fn received_turntable_list(&self) -> bool {
        self.lists.is_received(ListKind::Turntables)
    }

    /// Turntable with this id.
    pub fn turntable(&self, id: i32) -> Option<&Turntable> {
        self.registry.turntables.get(id)
    }

    /// Rotate a known turntable to a position.
    ///
    /// EX-Turntables take an activity code, which is forced to "home" when
    /// the target is position 0. Unknown ids are ignored.
    pub fn rotate_turntable(&mut self, id: i32, position: i32, activity: i32) -> ProtocolResult<()> {
        let Some(turntable) = self.registry.turntables.get(id) else {
            return Ok(());
        };
        let activity = match turntable.turntable_type() {
            TurntableType::ExTurntable if position == 0 => Some(EX_TURNTABLE_HOME_ACTIVITY),
            TurntableType::ExTurntable => Some(activity),
            _ => None,
        };
        self.send(&Command::RotateTurntable { id, position, activity })
    }

    /// Empty the turntable list.
    pub fn clear_turntable_list(&mut self) {
        self.clear_list(ListKind::Turntables);
    }

    /// Empty the turntable list and fetch it again on the next `get_lists`.
    pub fn refresh_turntable_list(&mut self) {
        self.refresh_list(ListKind::Turntables);
    }

    // ========== Track Power ==========

    fn power(&mut self, on: bool, target: PowerTarget) -> ProtocolResult<()> {
        self.send(&Command::Power { on, target })
    }

    /// Power every track on.
    pub fn power_on(&mut self) -> ProtocolResult<()> {
        self.power(true, PowerTarget::All)
    }

    /// Power every track off.
    pub fn power_off(&mut self) -> ProtocolResult<()> {
        self.power(false, PowerTarget::All)
    }

    /// Power the main track on.
    pub fn power_main_on(&mut self) -> ProtocolResult<()> {
        self.power(true, PowerTarget::Main)
    }

    /// Power the main track off.
    pub fn power_main_off(&mut self) -> ProtocolResult<()> {
        self.power(false, PowerTarget::Main)
    }

    /// Power the programming track on.
    pub fn power_prog_on(&mut self) -> ProtocolResult<()> {
        self.power(true, PowerTarget::Prog)
    }

    /// Power the programming track off.
    pub fn power_prog_off(&mut self) -> ProtocolResult<()> {
        self.power(false, PowerTarget::Prog)
    }

    /// Drive the programming track as part of the main.
    pub fn join_prog(&mut self) -> ProtocolResult<()> {
        self.send(&Command::JoinProg)
    }

    /// Power one track output on.
    pub fn power_track_on(&mut self, track: char) -> ProtocolResult<()> {
        self.power(true, PowerTarget::Track(track))
    }

    /// Power one track output off.
    pub fn power_track_off(&mut self, track: char) -> ProtocolResult<()> {
        self.power(false, PowerTarget::Track(track))
    }

    /// Change a track output's mode. `address` is only sent for DC modes.
    pub fn set_track_type(&mut self, track: char, mode: TrackMode, address: i32) -> ProtocolResult<()> {
        self.send(&Command::SetTrackType { track, mode, address })
    }

    // ========== Accessories ==========

    /// Activate a paired accessory.
    pub fn activate_accessory(&mut self, address: i32, sub_address: i32) -> ProtocolResult<()> {
        self.send(&Command::Accessory { address, sub_address, active: true })
    }

    /// Deactivate a paired accessory.
    pub fn deactivate_accessory(&mut self, address: i32, sub_address: i32) -> ProtocolResult<()> {
        self.send(&Command::Accessory { address, sub_address, active: false })
    }

    /// Activate a linear-addressed accessory.
    pub fn activate_linear_accessory(&mut self, address: i32) -> ProtocolResult<()> {
        self.send(&Command::LinearAccessory { address, active: true })
    }

    /// Deactivate a linear-addressed accessory.
    pub fn deactivate_linear_accessory(&mut self, address: i32) -> ProtocolResult<()> {
        self.send(&Command::LinearAccessory { address, active: false })
    }

    // ========== CV Programming ==========

    /// Read a CV on the programming track.
    pub fn read_cv(&mut self, cv: u16) -> ProtocolResult<()> {
        self.send(&Command::ReadCv { cv })
    }

    /// Check a CV holds `value`.
    pub fn validate_cv(&mut self, cv: u16, value: u8) -> ProtocolResult<()> {
        self.send(&Command::ValidateCv { cv, value })
    }

    /// Check one CV bit.
    pub fn validate_cv_bit(&mut self, cv: u16, bit: u8, value: u8) -> ProtocolResult<()> {
        self.send(&Command::ValidateCvBit { cv, bit, value })
    }

    /// Write the address of the loco on the programming track.
    pub fn write_loco_address(&mut self, address: i32) -> ProtocolResult<()> {
        self.send(&Command::WriteLocoAddress { address })
    }

    /// Write a CV on the programming track.
    pub fn write_cv(&mut self, cv: u16, value: u8) -> ProtocolResult<()> {
        self.send(&Command::WriteCv { cv, value })
    }

    /// Write one CV bit on the programming track.
    pub fn write_cv_bit(&mut self, cv: u16, bit: u8, value: u8) -> ProtocolResult<()> {
        self.send(&Command::WriteCvBit { cv, bit, value })
    }

    /// Write a CV on the main track.
    pub fn write_cv_on_main(&mut self, address: i32, cv: u16, value: u8) -> ProtocolResult<()> {
        self.send(&Command::WriteCvOnMain { address, cv, value })
    }

    /// Write one CV bit on the main track.
    pub fn write_cv_bit_on_main(
        &mut self,
        address: i32,
        cv: u16,
        bit: u8,
        value: u8,
    ) -> ProtocolResult<()> {
        self.send(&Command::WriteCvBitOnMain { address, cv, bit, value })
    }
}
