//! Notifications from the session to the application.
//!
//! Implement [`ProtocolDelegate`] to receive callbacks, or attach an
//! [`mpsc::Sender<Event>`](std::sync::mpsc::Sender) and read tagged [`Event`]s
//! from the other end. Every method has an empty default so implementors only
//! override what they care about.

use std::sync::mpsc;

use crate::loco::{Loco, LocoBroadcast};
use crate::types::{Direction, ServerVersion, TrackMode, TrackPower};

/// Receiver of semantic events decoded from the command station.
///
/// Callbacks run synchronously from inside [`Session::check`](crate::Session::check).
#[allow(unused_variables)]
pub trait ProtocolDelegate {
    /// The server banner was parsed.
    fn received_server_version(&mut self, version: ServerVersion) {}

    /// A broadcast text message (`<m "...">`).
    fn received_message(&mut self, message: &str) {}

    /// A line for an attached display (`<@ screen row "text">`).
    fn received_screen_update(&mut self, screen: i32, row: i32, text: &str) {}

    /// A roster loco was updated by a broadcast.
    fn received_loco_update(&mut self, loco: &Loco) {}

    /// Any loco broadcast, roster or not.
    fn received_loco_broadcast(&mut self, broadcast: &LocoBroadcast) {}

    /// The roster has been fully received.
    fn received_roster_list(&mut self) {}

    /// The turnout list has been fully received.
    fn received_turnout_list(&mut self) {}

    /// The route list has been fully received.
    fn received_route_list(&mut self) {}

    /// Every turntable and all its positions have been received.
    fn received_turntable_list(&mut self) {}

    /// A known turnout changed state.
    fn received_turnout_action(&mut self, id: i32, thrown: bool) {}

    /// A turntable moved or stopped.
    fn received_turntable_action(&mut self, id: i32, position: i32, moving: bool) {}

    /// Global (or main track) power changed.
    fn received_track_power(&mut self, state: TrackPower) {}

    /// Power of one track changed. `track` is the keyword hash of the track
    /// name; single letters hash to their character code.
    fn received_individual_track_power(&mut self, state: TrackPower, track: i32) {}

    /// A track output's mode was reported.
    fn received_track_type(&mut self, track: char, mode: TrackMode, address: i32) {}

    /// Address read from the programming track (`-1` on failure).
    fn received_read_loco(&mut self, address: i32) {}

    /// Result of writing a loco address (`-1` on failure).
    fn received_write_loco(&mut self, address: i32) {}

    /// Result of a CV read or write.
    fn received_write_cv(&mut self, cv: i32, value: i32) {}

    /// Result of a CV validation.
    fn received_validate_cv(&mut self, cv: i32, value: i32) {}

    /// Result of a CV bit validation.
    fn received_validate_cv_bit(&mut self, cv: i32, bit: i32, value: i32) {}
}

/// A delegate callback as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// See [`ProtocolDelegate::received_server_version`].
    ServerVersion(ServerVersion),
    /// See [`ProtocolDelegate::received_message`].
    Message(String),
    /// See [`ProtocolDelegate::received_screen_update`].
    ScreenUpdate {
        /// Screen number.
        screen: i32,
        /// Row number.
        row: i32,
        /// Row text.
        text: String,
    },
    /// See [`ProtocolDelegate::received_loco_update`].
    LocoUpdate {
        /// Roster address.
        address: i32,
        /// Speed after the update.
        speed: u8,
        /// Direction after the update.
        direction: Direction,
        /// Function states after the update.
        function_states: u32,
    },
    /// See [`ProtocolDelegate::received_loco_broadcast`].
    LocoBroadcast(LocoBroadcast),
    /// See [`ProtocolDelegate::received_roster_list`].
    RosterList,
    /// See [`ProtocolDelegate::received_turnout_list`].
    TurnoutList,
    /// See [`ProtocolDelegate::received_route_list`].
    RouteList,
    /// See [`ProtocolDelegate::received_turntable_list`].
    TurntableList,
    /// See [`ProtocolDelegate::received_turnout_action`].
    TurnoutAction {
        /// Turnout id.
        id: i32,
        /// New state.
        thrown: bool,
    },
    /// See [`ProtocolDelegate::received_turntable_action`].
    TurntableAction {
        /// Turntable id.
        id: i32,
        /// Target position.
        position: i32,
        /// Whether it is rotating.
        moving: bool,
    },
    /// See [`ProtocolDelegate::received_track_power`].
    TrackPower(TrackPower),
    /// See [`ProtocolDelegate::received_individual_track_power`].
    IndividualTrackPower {
        /// Power state.
        state: TrackPower,
        /// Keyword hash of the track name.
        track: i32,
    },
    /// See [`ProtocolDelegate::received_track_type`].
    TrackType {
        /// Track letter.
        track: char,
        /// Mode.
        mode: TrackMode,
        /// Cab address for DC modes, otherwise 0.
        address: i32,
    },
    /// See [`ProtocolDelegate::received_read_loco`].
    ReadLoco(i32),
    /// See [`ProtocolDelegate::received_write_loco`].
    WriteLoco(i32),
    /// See [`ProtocolDelegate::received_write_cv`].
    WriteCv {
        /// CV number.
        cv: i32,
        /// Value.
        value: i32,
    },
    /// See [`ProtocolDelegate::received_validate_cv`].
    ValidateCv {
        /// CV number.
        cv: i32,
        /// Value.
        value: i32,
    },
    /// See [`ProtocolDelegate::received_validate_cv_bit`].
    ValidateCvBit {
        /// CV number.
        cv: i32,
        /// Bit.
        bit: i32,
        /// Value.
        value: i32,
    },
}

/// Forwards every callback as an [`Event`]. A closed receiver drops events.
impl ProtocolDelegate for mpsc::Sender<Event> {
    fn received_server_version(&mut self, version: ServerVersion) {
        let _ = self.send(Event::ServerVersion(version));
    }

    fn received_message(&mut self, message: &str) {
        let _ = self.send(Event::Message(message.to_string()));
    }

    fn received_screen_update(&mut self, screen: i32, row: i32, text: &str) {
        let _ = self.send(Event::ScreenUpdate {
            screen,
            row,
            text: text.to_string(),
        });
    }

    fn received_loco_update(&mut self, loco: &Loco) {
        let _ = self.send(Event::LocoUpdate {
            address: loco.address(),
            speed: loco.speed(),
            direction: loco.direction(),
            function_states: loco.function_states(),
        });
    }

    fn received_loco_broadcast(&mut self, broadcast: &LocoBroadcast) {
        let _ = self.send(Event::LocoBroadcast(*broadcast));
    }

    fn received_roster_list(&mut self) {
        let _ = self.send(Event::RosterList);
    }

    fn received_turnout_list(&mut self) {
        let _ = self.send(Event::TurnoutList);
    }

    fn received_route_list(&mut self) {
        let _ = self.send(Event::RouteList);
    }

    fn received_turntable_list(&mut self) {
        let _ = self.send(Event::TurntableList);
    }

    fn received_turnout_action(&mut self, id: i32, thrown: bool) {
        let _ = self.send(Event::TurnoutAction { id, thrown });
    }

    fn received_turntable_action(&mut self, id: i32, position: i32, moving: bool) {
        let _ = self.send(Event::TurntableAction { id, position, moving });
    }

    fn received_track_power(&mut self, state: TrackPower) {
        let _ = self.send(Event::TrackPower(state));
    }

    fn received_individual_track_power(&mut self, state: TrackPower, track: i32) {
        let _ = self.send(Event::IndividualTrackPower { state, track });
    }

    fn received_track_type(&mut self, track: char, mode: TrackMode, address: i32) {
        let _ = self.send(Event::TrackType { track, mode, address });
    }

    fn received_read_loco(&mut self, address: i32) {
        let _ = self.send(Event::ReadLoco(address));
    }

    fn received_write_loco(&mut self, address: i32) {
        let _ = self.send(Event::WriteLoco(address));
    }

    fn received_write_cv(&mut self, cv: i32, value: i32) {
        let _ = self.send(Event::WriteCv { cv, value });
    }

    fn received_validate_cv(&mut self, cv: i32, value: i32) {
        let _ = self.send(Event::ValidateCv { cv, value });
    }

    fn received_validate_cv_bit(&mut self, cv: i32, bit: i32, value: i32) {
        let _ = self.send(Event::ValidateCvBit { cv, bit, value });
    }
}
