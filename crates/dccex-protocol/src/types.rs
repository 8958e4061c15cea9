//! Common types used in the protocol.

use crate::frame::keyword;

/// Minimum throttle speed.
pub const MIN_SPEED: u8 = 0;
/// Maximum throttle speed (128-step mode less stop and emergency stop).
pub const MAX_SPEED: u8 = 126;

/// Direction of travel for a locomotive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Reverse (`0` on the wire).
    Reverse,
    /// Forward (`1` on the wire).
    #[default]
    Forward,
}

impl Direction {
    /// The wire value used in throttle commands.
    pub fn as_wire(self) -> u8 {
        match self {
            Direction::Reverse => 0,
            Direction::Forward => 1,
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Reverse => Direction::Forward,
            Direction::Forward => Direction::Reverse,
        }
    }
}

/// Which way a locomotive faces within a consist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    /// Facing the same way as the consist.
    #[default]
    Forward,
    /// Facing backwards; throttle direction is inverted for this member.
    Reversed,
}

/// Where a locomotive object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocoSource {
    /// Part of the command station roster.
    Roster,
    /// Created locally for control of a loco not in the roster.
    Entry,
}

/// Track power state reported by the command station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackPower {
    /// Power off (`0`).
    Off,
    /// Power on (`1`).
    On,
    /// Anything else.
    Unknown,
}

impl TrackPower {
    /// Decode the numeric state from a power broadcast.
    pub fn from_wire(value: i32) -> TrackPower {
        match value {
            0 => TrackPower::Off,
            1 => TrackPower::On,
            _ => TrackPower::Unknown,
        }
    }
}

/// Track manager mode of a single track output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackMode {
    /// Normal DCC operation.
    Main,
    /// DCC programming track.
    Prog,
    /// DC.
    Dc,
    /// DC with reversed polarity.
    Dcx,
    /// Output unused.
    None,
}

impl TrackMode {
    /// The keyword used for this mode on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackMode::Main => "MAIN",
            TrackMode::Prog => "PROG",
            TrackMode::Dc => "DC",
            TrackMode::Dcx => "DCX",
            TrackMode::None => "NONE",
        }
    }

    /// Decode a hashed keyword parameter.
    pub fn from_keyword(hash: i32) -> Option<TrackMode> {
        match hash {
            keyword::MAIN => Some(TrackMode::Main),
            keyword::PROG => Some(TrackMode::Prog),
            keyword::DC => Some(TrackMode::Dc),
            keyword::DCX => Some(TrackMode::Dcx),
            keyword::NONE => Some(TrackMode::None),
            _ => None,
        }
    }

    /// Whether this mode takes a cab address.
    pub fn is_dc(self) -> bool {
        matches!(self, TrackMode::Dc | TrackMode::Dcx)
    }
}

/// Kind of entry in the route list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RouteType {
    /// A plain route (`R`).
    Route,
    /// An automation that can be handed a loco (`A`).
    Automation,
    /// Not yet reported, or an unrecognised tag.
    #[default]
    Unknown,
}

impl RouteType {
    /// Decode the keyword tag from a route entry.
    pub fn from_keyword(hash: i32) -> RouteType {
        match hash {
            keyword::R => RouteType::Route,
            keyword::A => RouteType::Automation,
            _ => RouteType::Unknown,
        }
    }
}

/// Kind of turntable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurntableType {
    /// DCC accessory turntable (`0`).
    Dcc,
    /// EX-Turntable (`1`).
    ExTurntable,
    /// Not yet reported, or an unrecognised type.
    #[default]
    Unknown,
}

impl TurntableType {
    /// Decode the numeric type from a turntable entry.
    pub fn from_wire(value: i32) -> TurntableType {
        match value {
            0 => TurntableType::Dcc,
            1 => TurntableType::ExTurntable,
            _ => TurntableType::Unknown,
        }
    }
}

/// Firmware version of the command station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
    /// Patch version.
    pub patch: u16,
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Length of the `DCCEX V` prefix skipped before the version numbers.
const BANNER_PREFIX_LEN: usize = 7;

/// Largest value accepted for a single version component.
const MAX_VERSION_PART: u16 = 999;

impl ServerVersion {
    /// Extract the version from the server banner.
    ///
    /// The banner looks like `DCCEX V-5.0.4 / MEGA / STANDARD_MOTOR_SHIELD / 7`.
    /// After the prefix, each number introduced by `-` or `.` is taken in turn
    /// until three are found. Returns `None` if fewer than three are present.
    pub fn parse_banner(banner: &str) -> Option<ServerVersion> {
        let section = banner.as_bytes().get(BANNER_PREFIX_LEN..)?;
        let mut parts = [0u16; 3];
        let mut found = 0;
        let mut i = 0;

        while i < section.len() && found < parts.len() {
            let introducer = section[i] == b'-' || section[i] == b'.';
            let digits = section[i + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if !introducer || digits == 0 {
                i += 1;
                continue;
            }

            let mut value: u32 = 0;
            for &b in &section[i + 1..i + 1 + digits] {
                value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            }
            if value > u32::from(MAX_VERSION_PART) {
                return None;
            }
            parts[found] = value as u16;
            found += 1;
            i += 1 + digits;
        }

        (found == parts.len()).then(|| ServerVersion {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_banner() {
        let version =
            ServerVersion::parse_banner("DCCEX V-92.210.10 / MEGA / STANDARD_MOTOR_SHIELD / 7")
                .unwrap();
        assert_eq!(version, ServerVersion { major: 92, minor: 210, patch: 10 });
        assert_eq!(version.to_string(), "92.210.10");
    }

    #[test]
    fn test_parse_banner_with_label() {
        let version = ServerVersion::parse_banner("DCCEX V-1.2.3-smartass / MEGA").unwrap();
        assert_eq!(version, ServerVersion { major: 1, minor: 2, patch: 3 });
    }

    #[test]
    fn test_parse_banner_too_few_numbers() {
        assert_eq!(ServerVersion::parse_banner("DCCEX V-1.2"), None);
        assert_eq!(ServerVersion::parse_banner("DCCEX"), None);
        assert_eq!(ServerVersion::parse_banner(""), None);
    }

    #[test]
    fn test_parse_banner_rejects_huge_component() {
        assert_eq!(ServerVersion::parse_banner("DCCEX V-1000.2.3"), None);
    }

    #[test]
    fn test_track_mode_keywords() {
        for mode in [
            TrackMode::Main,
            TrackMode::Prog,
            TrackMode::Dc,
            TrackMode::Dcx,
            TrackMode::None,
        ] {
            let hash = crate::frame::keyword_hash(mode.as_str());
            assert_eq!(TrackMode::from_keyword(hash), Some(mode));
        }
        assert_eq!(TrackMode::from_keyword(0), None);
    }

    #[test]
    fn test_route_type_keywords() {
        assert_eq!(RouteType::from_keyword('R' as i32), RouteType::Route);
        assert_eq!(RouteType::from_keyword('A' as i32), RouteType::Automation);
        assert_eq!(RouteType::from_keyword('X' as i32), RouteType::Unknown);
    }

    #[test]
    fn test_direction_wire_values() {
        assert_eq!(Direction::Forward.as_wire(), 1);
        assert_eq!(Direction::Reverse.as_wire(), 0);
        assert_eq!(Direction::Forward.reversed(), Direction::Reverse);
    }
}
