//! Delegate that logs every protocol event.

use dccex_protocol::{Loco, LocoBroadcast, ProtocolDelegate, ServerVersion, TrackMode, TrackPower};

/// Logs each callback as one `info` line and counts them.
#[derive(Debug, Default)]
pub struct TracingDelegate {
    events: u64,
}

impl TracingDelegate {
    /// Create a delegate with a zero event count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events logged so far.
    pub fn event_count(&self) -> u64 {
        self.events
    }

    fn record(&mut self) {
        self.events += 1;
    }
}

impl ProtocolDelegate for TracingDelegate {
    fn received_server_version(&mut self, version: ServerVersion) {
        self.record();
        tracing::info!(%version, "Command station version");
    }

    fn received_message(&mut self, message: &str) {
        self.record();
        tracing::info!(text = message, "Broadcast message");
    }

    fn received_screen_update(&mut self, screen: i32, row: i32, text: &str) {
        self.record();
        tracing::info!(screen, row, text, "Screen update");
    }

    fn received_loco_update(&mut self, loco: &Loco) {
        self.record();
        tracing::info!(
            address = loco.address(),
            name = loco.name().unwrap_or(""),
            speed = loco.speed(),
            direction = ?loco.direction(),
            functions = format_args!("{:#010x}", loco.function_states()),
            "Loco update"
        );
    }

    fn received_loco_broadcast(&mut self, broadcast: &LocoBroadcast) {
        self.record();
        tracing::debug!(
            address = broadcast.address,
            speed = broadcast.speed,
            direction = ?broadcast.direction,
            "Loco broadcast"
        );
    }

    fn received_roster_list(&mut self) {
        self.record();
        tracing::info!("Roster received");
    }

    fn received_turnout_list(&mut self) {
        self.record();
        tracing::info!("Turnout list received");
    }

    fn received_route_list(&mut self) {
        self.record();
        tracing::info!("Route list received");
    }

    fn received_turntable_list(&mut self) {
        self.record();
        tracing::info!("Turntable list received");
    }

    fn received_turnout_action(&mut self, id: i32, thrown: bool) {
        self.record();
        tracing::info!(id, thrown, "Turnout");
    }

    fn received_turntable_action(&mut self, id: i32, position: i32, moving: bool) {
        self.record();
        tracing::info!(id, position, moving, "Turntable");
    }

    fn received_track_power(&mut self, state: TrackPower) {
        self.record();
        tracing::info!(?state, "Track power");
    }

    fn received_individual_track_power(&mut self, state: TrackPower, track: i32) {
        self.record();
        tracing::info!(?state, track, "Individual track power");
    }

    fn received_track_type(&mut self, track: char, mode: TrackMode, address: i32) {
        self.record();
        tracing::info!(%track, mode = mode.as_str(), address, "Track type");
    }

    fn received_read_loco(&mut self, address: i32) {
        self.record();
        tracing::info!(address, "Read loco address");
    }

    fn received_write_loco(&mut self, address: i32) {
        self.record();
        tracing::info!(address, "Wrote loco address");
    }

    fn received_write_cv(&mut self, cv: i32, value: i32) {
        self.record();
        tracing::info!(cv, value, "Wrote CV");
    }

    fn received_validate_cv(&mut self, cv: i32, value: i32) {
        self.record();
        tracing::info!(cv, value, "Validated CV");
    }

    fn received_validate_cv_bit(&mut self, cv: i32, bit: i32, value: i32) {
        self.record();
        tracing::info!(cv, bit, value, "Validated CV bit");
    }
}
