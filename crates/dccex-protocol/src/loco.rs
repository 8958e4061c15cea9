//! Locomotives and their decoder functions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::{Direction, LocoSource};

/// Maximum number of decoder functions tracked per loco.
pub const MAX_FUNCTIONS: usize = 32;

/// Shared handle to a loco.
///
/// Roster locos are owned by the session's registry; consists and the
/// application hold clones of the handle and see broadcast updates as they
/// arrive.
pub type LocoRef = Rc<RefCell<Loco>>;

/// A locomotive, either from the roster or created locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loco {
    address: i32,
    name: Option<String>,
    speed: u8,
    direction: Direction,
    function_states: u32,
    function_names: Vec<Option<String>>,
    momentary_flags: u32,
    source: LocoSource,
}

impl Loco {
    /// Create a loco with no name, stopped and facing forward.
    pub fn new(address: i32, source: LocoSource) -> Self {
        Loco {
            address,
            name: None,
            speed: 0,
            direction: Direction::Forward,
            function_states: 0,
            function_names: vec![None; MAX_FUNCTIONS],
            momentary_flags: 0,
            source,
        }
    }

    /// Create a loco wrapped in a shared handle.
    pub fn shared(address: i32, source: LocoSource) -> LocoRef {
        Rc::new(RefCell::new(Loco::new(address, source)))
    }

    /// DCC address.
    pub fn address(&self) -> i32 {
        self.address
    }

    /// Display name, once known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Last known speed (0-126).
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Set the last known speed.
    pub fn set_speed(&mut self, speed: u8) {
        self.speed = speed;
    }

    /// Last known direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Set the last known direction.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Roster or locally created.
    pub fn source(&self) -> LocoSource {
        self.source
    }

    /// Bitmap of function states, bit N for function N.
    pub fn function_states(&self) -> u32 {
        self.function_states
    }

    /// Replace the function state bitmap.
    pub fn set_function_states(&mut self, states: u32) {
        self.function_states = states;
    }

    /// Whether function `function` is on.
    pub fn is_function_on(&self, function: usize) -> bool {
        function < MAX_FUNCTIONS && self.function_states & (1 << function) != 0
    }

    /// Label of function `function`, if the roster provided one.
    pub fn function_name(&self, function: usize) -> Option<&str> {
        self.function_names.get(function)?.as_deref()
    }

    /// Whether function `function` is momentary rather than latching.
    pub fn is_function_momentary(&self, function: usize) -> bool {
        function < MAX_FUNCTIONS && self.momentary_flags & (1 << function) != 0
    }

    /// Load function labels from a roster entry.
    ///
    /// Labels are `/` separated; a leading `*` marks the function momentary.
    /// An empty list leaves the current labels untouched.
    pub fn setup_functions(&mut self, function_list: &str) {
        if function_list.is_empty() {
            return;
        }

        self.function_names.iter_mut().for_each(|n| *n = None);
        self.momentary_flags = 0;

        for (index, label) in function_list.split('/').take(MAX_FUNCTIONS).enumerate() {
            let label = match label.strip_prefix('*') {
                Some(rest) => {
                    self.momentary_flags |= 1 << index;
                    rest
                }
                None => label,
            };
            self.function_names[index] = Some(label.to_string());
        }
    }
}

/// Low 28 bits of a function map carry function states.
const FUNCTION_MAP_MASK: i32 = 0x0FFF_FFFF;

/// State carried by one loco broadcast (`<l cab reg speedByte functMap>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocoBroadcast {
    /// DCC address.
    pub address: i32,
    /// Decoded speed (0-126).
    pub speed: u8,
    /// Decoded direction.
    pub direction: Direction,
    /// Function states, masked to 28 functions.
    pub function_map: u32,
}

impl LocoBroadcast {
    /// Decode the raw speed byte and function map.
    ///
    /// Bit 7 of the speed byte is the direction. The remaining value reserves
    /// `1` for emergency stop, so speeds above it are shifted down by one.
    pub fn decode(address: i32, speed_byte: i32, function_map: i32) -> Self {
        let direction = if speed_byte >= 128 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let mut speed = if speed_byte >= 128 { speed_byte - 128 } else { speed_byte };
        speed = if speed > 1 { speed - 1 } else { 0 };

        LocoBroadcast {
            address,
            speed: speed.clamp(0, i32::from(crate::types::MAX_SPEED)) as u8,
            direction,
            function_map: (function_map & FUNCTION_MAP_MASK) as u32,
        }
    }

    /// Copy the broadcast state onto a loco.
    pub fn apply(&self, loco: &mut Loco) {
        loco.set_speed(self.speed);
        loco.set_direction(self.direction);
        loco.set_function_states(self.function_map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_loco_defaults() {
        let loco = Loco::new(42, LocoSource::Roster);
        assert_eq!(loco.address(), 42);
        assert_eq!(loco.name(), None);
        assert_eq!(loco.speed(), 0);
        assert_eq!(loco.direction(), Direction::Forward);
        assert_eq!(loco.function_states(), 0);
        assert_eq!(loco.source(), LocoSource::Roster);
    }

    #[test]
    fn test_setup_functions() {
        let mut loco = Loco::new(3, LocoSource::Roster);
        loco.setup_functions("Lights/*Horn//Bell");

        assert_eq!(loco.function_name(0), Some("Lights"));
        assert_eq!(loco.function_name(1), Some("Horn"));
        assert_eq!(loco.function_name(2), Some(""));
        assert_eq!(loco.function_name(3), Some("Bell"));
        assert_eq!(loco.function_name(4), None);
        assert!(!loco.is_function_momentary(0));
        assert!(loco.is_function_momentary(1));
        assert!(!loco.is_function_momentary(3));
    }

    #[test]
    fn test_setup_functions_replaces_previous() {
        let mut loco = Loco::new(3, LocoSource::Roster);
        loco.setup_functions("*A/*B/*C");
        loco.setup_functions("X");
        assert_eq!(loco.function_name(0), Some("X"));
        assert_eq!(loco.function_name(1), None);
        assert!(!loco.is_function_momentary(1));

        loco.setup_functions("");
        assert_eq!(loco.function_name(0), Some("X"));
    }

    #[test]
    fn test_setup_functions_caps_at_max() {
        let labels = vec!["F"; MAX_FUNCTIONS + 5].join("/");
        let mut loco = Loco::new(3, LocoSource::Roster);
        loco.setup_functions(&labels);
        assert_eq!(loco.function_name(MAX_FUNCTIONS - 1), Some("F"));
        assert_eq!(loco.function_name(MAX_FUNCTIONS), None);
    }

    #[test]
    fn test_function_states() {
        let mut loco = Loco::new(3, LocoSource::Entry);
        loco.set_function_states(0b101);
        assert!(loco.is_function_on(0));
        assert!(!loco.is_function_on(1));
        assert!(loco.is_function_on(2));
        assert!(!loco.is_function_on(40));
    }

    #[test]
    fn test_broadcast_speed_decoding() {
        let b = LocoBroadcast::decode(3, 150, 0);
        assert_eq!((b.direction, b.speed), (Direction::Forward, 21));

        let b = LocoBroadcast::decode(3, 12, 0);
        assert_eq!((b.direction, b.speed), (Direction::Reverse, 11));

        let b = LocoBroadcast::decode(3, 160, 0);
        assert_eq!((b.direction, b.speed), (Direction::Forward, 31));

        let b = LocoBroadcast::decode(3, 129, 0);
        assert_eq!((b.direction, b.speed), (Direction::Forward, 0));

        let b = LocoBroadcast::decode(3, 1, 0);
        assert_eq!((b.direction, b.speed), (Direction::Reverse, 0));
    }

    #[test]
    fn test_broadcast_masks_function_map() {
        let b = LocoBroadcast::decode(3, 128, -1);
        assert_eq!(b.function_map, 0x0FFF_FFFF);
    }

    #[test]
    fn test_broadcast_apply() {
        let mut loco = Loco::new(3, LocoSource::Roster);
        LocoBroadcast::decode(3, 150, 0b11).apply(&mut loco);
        assert_eq!(loco.speed(), 21);
        assert_eq!(loco.direction(), Direction::Forward);
        assert!(loco.is_function_on(1));
    }
}
