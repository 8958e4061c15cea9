//! Commands that can be sent to the command station.
//!
//! Every command is a single bracketed line. The literal formats below are
//! what the command station firmware matches on, so they must not drift:
//!
//! - Power: `<1>`, `<0 MAIN>`, `<1 PROG>`, `<1 JOIN>`, `<1 A>`
//! - Throttle: `<t {address} {speed} {direction}>`, `<F {address} {function} {0|1}>`
//! - Lists: `<JR>`, `<JT {id}>`, `<JA>`, `<JO>`, `<JP {id}>`
//! - Turnouts and routes: `<T {id} {0|1}>`, `</ START {address} {automation}>`
//! - Programming: `<R {cv}>`, `<W {cv} {value}>`, `<b {address} {cv} {bit} {value}>`

use std::fmt;

use crate::types::{Direction, TrackMode};

/// Target of a power command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTarget {
    /// Every track.
    All,
    /// The main track.
    Main,
    /// The programming track.
    Prog,
    /// A single track output by letter (`A`-`H`).
    Track(char),
}

/// Commands that can be sent to the command station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ========== Session Commands ==========
    /// Ask for the server banner (`<s>`).
    RequestServerVersion,

    /// Keep-alive ping (`<#>`).
    Heartbeat,

    /// Ask how many locos the command station can drive (`<#>`).
    RequestSupportedLocos,

    /// Tell the command station this client is going away.
    Disconnect,

    /// Send arbitrary command text, wrapped in brackets.
    Raw {
        /// Command text without the brackets.
        command: String,
    },

    // ========== List Commands ==========
    /// Roster overview (`<JR>`).
    RosterList,

    /// Roster detail for one loco.
    RosterEntry {
        /// DCC address.
        address: i32,
    },

    /// Turnout overview (`<JT>`).
    TurnoutList,

    /// Turnout detail.
    TurnoutEntry {
        /// Turnout id.
        id: i32,
    },

    /// Route/automation overview (`<JA>`).
    RouteList,

    /// Route detail.
    RouteEntry {
        /// Route id.
        id: i32,
    },

    /// Turntable overview (`<JO>`).
    TurntableList,

    /// Turntable detail.
    TurntableEntry {
        /// Turntable id.
        id: i32,
    },

    /// Positions of one turntable.
    TurntableIndexList {
        /// Turntable id.
        id: i32,
    },

    // ========== Loco Commands ==========
    /// Set speed and direction.
    Throttle {
        /// DCC address.
        address: i32,
        /// Speed (0-126).
        speed: u8,
        /// Direction.
        direction: Direction,
    },

    /// Ask for a loco broadcast of the current state (`<t {address}>`).
    RequestLocoUpdate {
        /// DCC address.
        address: i32,
    },

    /// Turn a decoder function on or off.
    Function {
        /// DCC address.
        address: i32,
        /// Function number.
        function: u8,
        /// On or off.
        on: bool,
    },

    /// Read the address of the loco on the programming track (`<R>`).
    ReadLocoAddress,

    /// Stop every loco immediately (`<!>`).
    EmergencyStop,

    // ========== Turnout, Route and Turntable Commands ==========
    /// Throw or close a turnout.
    Turnout {
        /// Turnout id.
        id: i32,
        /// Throw (`1`) or close (`0`).
        thrown: bool,
    },

    /// Start a route or automation.
    StartRoute {
        /// Route id.
        id: i32,
    },

    /// Start an automation with a loco.
    HandOffLoco {
        /// DCC address of the loco.
        address: i32,
        /// Automation id.
        automation_id: i32,
    },

    /// Pause all automations (`</PAUSE>`).
    PauseRoutes,

    /// Resume all automations (`</RESUME>`).
    ResumeRoutes,

    /// Rotate a turntable.
    RotateTurntable {
        /// Turntable id.
        id: i32,
        /// Target position index.
        position: i32,
        /// EX-Turntable activity; `None` for DCC turntables.
        activity: Option<i32>,
    },

    // ========== Track Commands ==========
    /// Switch track power.
    Power {
        /// On or off.
        on: bool,
        /// Which track(s).
        target: PowerTarget,
    },

    /// Join the programming track to the main (`<1 JOIN>`).
    JoinProg,

    /// Change a track output's mode.
    SetTrackType {
        /// Track letter.
        track: char,
        /// New mode.
        mode: TrackMode,
        /// Cab address for DC modes.
        address: i32,
    },

    // ========== Accessory Commands ==========
    /// Activate or deactivate a paired accessory.
    Accessory {
        /// Accessory address.
        address: i32,
        /// Sub-address.
        sub_address: i32,
        /// Activate (`1`) or deactivate (`0`).
        active: bool,
    },

    /// Activate or deactivate a linear-addressed accessory.
    LinearAccessory {
        /// Linear address.
        address: i32,
        /// Activate (`1`) or deactivate (`0`).
        active: bool,
    },

    // ========== Programming Commands ==========
    /// Read a CV on the programming track.
    ReadCv {
        /// CV number.
        cv: u16,
    },

    /// Check a CV holds a value.
    ValidateCv {
        /// CV number.
        cv: u16,
        /// Expected value.
        value: u8,
    },

    /// Check a single CV bit.
    ValidateCvBit {
        /// CV number.
        cv: u16,
        /// Bit (0-7).
        bit: u8,
        /// Expected bit value.
        value: u8,
    },

    /// Write a loco address on the programming track.
    WriteLocoAddress {
        /// New address.
        address: i32,
    },

    /// Write a CV on the programming track.
    WriteCv {
        /// CV number.
        cv: u16,
        /// Value.
        value: u8,
    },

    /// Write a single CV bit on the programming track.
    WriteCvBit {
        /// CV number.
        cv: u16,
        /// Bit (0-7).
        bit: u8,
        /// Bit value.
        value: u8,
    },

    /// Write a CV on the main track.
    WriteCvOnMain {
        /// Loco address.
        address: i32,
        /// CV number.
        cv: u16,
        /// Value.
        value: u8,
    },

    /// Write a single CV bit on the main track.
    WriteCvBitOnMain {
        /// Loco address.
        address: i32,
        /// CV number.
        cv: u16,
        /// Bit (0-7).
        bit: u8,
        /// Bit value.
        value: u8,
    },
}

impl Command {
    /// Get the bracketed command string without a line terminator.
    pub fn to_command_string(&self) -> String {
        self.to_string()
    }
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Session
            Command::RequestServerVersion => write!(f, "<s>"),
            Command::Heartbeat | Command::RequestSupportedLocos => write!(f, "<#>"),
            Command::Disconnect => write!(f, "<U DISCONNECT>"),
            Command::Raw { command } => write!(f, "<{}>", command),

            // Lists
            Command::RosterList => write!(f, "<JR>"),
            Command::RosterEntry { address } => write!(f, "<JR {}>", address),
            Command::TurnoutList => write!(f, "<JT>"),
            Command::TurnoutEntry { id } => write!(f, "<JT {}>", id),
            Command::RouteList => write!(f, "<JA>"),
            Command::RouteEntry { id } => write!(f, "<JA {}>", id),
            Command::TurntableList => write!(f, "<JO>"),
            Command::TurntableEntry { id } => write!(f, "<JO {}>", id),
            Command::TurntableIndexList { id } => write!(f, "<JP {}>", id),

            // Locos
            Command::Throttle { address, speed, direction } => {
                write!(f, "<t {} {} {}>", address, speed, direction.as_wire())
            }
            Command::RequestLocoUpdate { address } => write!(f, "<t {}>", address),
            Command::Function { address, function, on } => {
                write!(f, "<F {} {} {}>", address, function, flag(*on))
            }
            Command::ReadLocoAddress => write!(f, "<R>"),
            Command::EmergencyStop => write!(f, "<!>"),

            // Turnouts, routes, turntables
            Command::Turnout { id, thrown } => write!(f, "<T {} {}>", id, flag(*thrown)),
            Command::StartRoute { id } => write!(f, "</ START {}>", id),
            Command::HandOffLoco { address, automation_id } => {
                write!(f, "</ START {} {}>", address, automation_id)
            }
            Command::PauseRoutes => write!(f, "</PAUSE>"),
            Command::ResumeRoutes => write!(f, "</RESUME>"),
            Command::RotateTurntable { id, position, activity } => match activity {
                Some(activity) => write!(f, "<I {} {} {}>", id, position, activity),
                None => write!(f, "<I {} {}>", id, position),
            },

            // Track
            Command::Power { on, target } => {
                let state = flag(*on);
                match target {
                    PowerTarget::All => write!(f, "<{}>", state),
                    PowerTarget::Main => write!(f, "<{} MAIN>", state),
                    PowerTarget::Prog => write!(f, "<{} PROG>", state),
                    PowerTarget::Track(track) => write!(f, "<{} {}>", state, track),
                }
            }
            Command::JoinProg => write!(f, "<1 JOIN>"),
            Command::SetTrackType { track, mode, address } => {
                if mode.is_dc() {
                    write!(f, "<= {} {} {}>", track, mode.as_str(), address)
                } else {
                    write!(f, "<= {} {}>", track, mode.as_str())
                }
            }

            // Accessories
            Command::Accessory { address, sub_address, active } => {
                write!(f, "<a {} {} {}>", address, sub_address, flag(*active))
            }
            Command::LinearAccessory { address, active } => {
                write!(f, "<a {} {}>", address, flag(*active))
            }

            // Programming
            Command::ReadCv { cv } => write!(f, "<R {}>", cv),
            Command::ValidateCv { cv, value } => write!(f, "<V {} {}>", cv, value),
            Command::ValidateCvBit { cv, bit, value } => write!(f, "<V {} {} {}>", cv, bit, value),
            Command::WriteLocoAddress { address } => write!(f, "<W {}>", address),
            Command::WriteCv { cv, value } => write!(f, "<W {} {}>", cv, value),
            Command::WriteCvBit { cv, bit, value } => write!(f, "<B {} {} {}>", cv, bit, value),
            Command::WriteCvOnMain { address, cv, value } => {
                write!(f, "<w {} {} {}>", address, cv, value)
            }
            Command::WriteCvBitOnMain { address, cv, bit, value } => {
                write!(f, "<b {} {} {} {}>", address, cv, bit, value)
            }
        }
    }
}
