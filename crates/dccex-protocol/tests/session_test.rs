//! Integration tests driving a full session over the in-memory channel.
//!
//! Each test plays the command station: it loads reply frames into the
//! channel, runs `check`, then inspects what the session wrote back and which
//! events reached the application.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};

use dccex_protocol::{
    Consist, Direction, Event, Facing, ListSelection, Loco, ManualClock, MemoryChannel,
    ProtocolDelegate, RouteType, ServerVersion, Session, SessionConfig, TrackPower, TurntableType,
};
use rand::Rng;

/// A session wired to a memory channel, a manual clock and an event receiver.
struct Harness {
    session: Session<MemoryChannel, ManualClock>,
    events: Receiver<Event>,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    fn with_config(config: SessionConfig) -> Self {
        let clock = ManualClock::new();
        let (tx, events) = mpsc::channel();
        let mut session = Session::with_clock(config, clock.clone());
        session.connect(MemoryChannel::new());
        session.set_delegate(Box::new(tx));
        Harness {
            session,
            events,
            clock,
        }
    }

    /// Deliver frames from the command station and process them.
    fn feed(&mut self, data: &str) {
        self.session.channel_mut().unwrap().load(data);
        self.session.check().expect("check should not fail");
    }

    /// Commands written since the last call.
    fn sent(&mut self) -> Vec<String> {
        self.session.channel_mut().unwrap().take_lines()
    }

    /// Events delivered since the last call.
    fn events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }
}

fn only(kind: &str) -> ListSelection {
    ListSelection {
        roster: kind == "roster",
        turnouts: kind == "turnouts",
        routes: kind == "routes",
        turntables: kind == "turntables",
    }
}

// ============================================================================
// Stream Handling Tests
// ============================================================================

#[test]
fn test_garbage_letters_then_message() {
    let mut h = Harness::new();
    let mut rng = rand::thread_rng();
    let garbage: String = (0..500)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect();

    h.feed(&format!("{}<m \"Hello World\">", garbage));

    assert_eq!(h.events(), vec![Event::Message("Hello World".into())]);
}

#[test]
fn test_garbage_bytes_then_message() {
    let mut h = Harness::new();
    let mut rng = rand::thread_rng();
    let garbage: Vec<u8> = std::iter::repeat_with(|| rng.gen::<u8>())
        .filter(|b| *b != b'<' && *b != b'>')
        .take(500)
        .collect();

    let channel = h.session.channel_mut().unwrap();
    channel.load_bytes(&garbage);
    channel.load("<m \"Hello World\">");
    h.session.check().unwrap();

    assert_eq!(h.events(), vec![Event::Message("Hello World".into())]);
}

#[test]
fn test_oversized_frame_is_discarded() {
    let config = SessionConfig {
        max_command_buffer: 16,
        ..Default::default()
    };
    let mut h = Harness::with_config(config);

    h.feed("<m \"this message is far too long\"><m \"ok\">");

    assert_eq!(h.events(), vec![Event::Message("ok".into())]);
}

#[test]
fn test_parameter_cap_drops_frame() {
    let config = SessionConfig {
        max_command_params: 3,
        ..Default::default()
    };
    let mut h = Harness::with_config(config);

    h.feed("<l 3 0 150 3><r 1 3>");

    assert_eq!(h.events(), vec![Event::WriteCv { cv: 1, value: 3 }]);
}

#[test]
fn test_frame_split_across_checks() {
    let mut h = Harness::new();
    h.feed("<m \"Hel");
    assert!(h.events().is_empty());
    h.feed("lo\">");
    assert_eq!(h.events(), vec![Event::Message("Hello".into())]);
}

// ============================================================================
// Server Tests
// ============================================================================

#[test]
fn test_server_version_banner() {
    let mut h = Harness::new();
    assert!(!h.session.received_version());

    h.session.request_server_version().unwrap();
    assert_eq!(h.sent(), vec!["<s>"]);

    h.feed("<iDCCEX V-5.0.4 / MEGA / STANDARD_MOTOR_SHIELD / 7>");
    let version = ServerVersion {
        major: 5,
        minor: 0,
        patch: 4,
    };
    assert_eq!(h.events(), vec![Event::ServerVersion(version)]);
    assert!(h.session.received_version());
    assert_eq!(h.session.version(), Some(version));
}

#[test]
fn test_short_banner_is_ignored() {
    let mut h = Harness::new();
    h.feed("<iDCCEX V-5.0>");
    assert!(h.events().is_empty());
    assert_eq!(h.session.version(), None);
}

#[test]
fn test_idle_session_ignores_everything() {
    let clock = ManualClock::new();
    let mut session: Session<MemoryChannel, ManualClock> =
        Session::with_clock(SessionConfig::default().with_heartbeat(10), clock.clone());
    session.connect(MemoryChannel::new());

    session.channel_mut().unwrap().load("<jR 1 2><m \"hi\">");
    clock.set(100);
    session.check().unwrap();
    session.get_lists(ListSelection::all()).unwrap();
    session.power_on().unwrap();

    assert!(session.channel_mut().unwrap().take_lines().is_empty());
    assert_eq!(session.roster_count(), 0);
    assert!(!session.channel().unwrap().has_pending_input());

    // Arming the session makes it speak
    let (tx, rx) = mpsc::channel();
    session.set_delegate(Box::new(tx));
    session.channel_mut().unwrap().load("<m \"hi\">");
    session.check().unwrap();
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Event::Message("hi".into())]);
    assert_eq!(session.channel_mut().unwrap().take_lines(), vec!["<#>"]);
}

#[test]
fn test_heartbeat_interval() {
    let mut h = Harness::with_config(SessionConfig::default().with_heartbeat(2000));

    h.clock.set(1500);
    h.feed("");
    assert!(h.sent().is_empty());

    h.clock.set(2500);
    h.feed("");
    assert_eq!(h.sent(), vec!["<#>"]);

    h.clock.set(3000);
    h.feed("");
    assert!(h.sent().is_empty());
}

// ============================================================================
// List Synchronization Tests
// ============================================================================

#[test]
fn test_lists_requested_one_at_a_time_in_order() {
    let mut h = Harness::new();
    let all = ListSelection::all();

    for (request, reply, event) in [
        ("<JR>", "<jR>", Event::RosterList),
        ("<JT>", "<jT>", Event::TurnoutList),
        ("<JA>", "<jA>", Event::RouteList),
        ("<JO>", "<jO>", Event::TurntableList),
    ] {
        h.session.get_lists(all).unwrap();
        assert_eq!(h.sent(), vec![request]);

        // Nothing more goes out while the list is in flight
        h.session.get_lists(all).unwrap();
        h.session.get_lists(all).unwrap();
        assert!(h.sent().is_empty());
        assert!(!h.session.received_lists());

        h.feed(reply);
        assert_eq!(h.events(), vec![event]);
    }

    h.session.get_lists(all).unwrap();
    assert!(h.sent().is_empty());
    assert!(h.session.received_lists());
}

#[test]
fn test_roster_walk() {
    let mut h = Harness::new();
    h.session.get_lists(only("roster")).unwrap();
    assert_eq!(h.sent(), vec!["<JR>"]);

    h.feed("<jR 10 2 10000>");
    assert_eq!(h.sent(), vec!["<JR 10>"]);
    assert_eq!(h.session.roster_count(), 3);

    h.feed("<jR 10 \"Loco 10\" \"Lights/*Horn\">");
    assert_eq!(h.sent(), vec!["<JR 2>"]);
    h.feed("<jR 2 \"Loco 2\" \"\">");
    assert_eq!(h.sent(), vec!["<JR 10000>"]);
    assert!(h.events().is_empty());

    h.feed("<jR 10000 \"Loco 10000\" \"Bell\">");
    assert!(h.sent().is_empty());
    assert_eq!(h.events(), vec![Event::RosterList]);
    assert!(h.session.received_roster());

    let addresses: Vec<i32> = h.session.roster().iter().map(|l| l.borrow().address()).collect();
    assert_eq!(addresses, vec![10, 2, 10000]);

    let loco = h.session.find_loco_in_roster(10).unwrap();
    let loco = loco.borrow();
    assert_eq!(loco.name(), Some("Loco 10"));
    assert_eq!(loco.function_name(1), Some("Horn"));
    assert!(loco.is_function_momentary(1));
    assert!(!loco.is_function_momentary(0));

    h.session.get_lists(only("roster")).unwrap();
    assert!(h.session.received_lists());
}

#[test]
fn test_repeated_overview_is_ignored() {
    let mut h = Harness::new();
    h.feed("<jR 1 2>");
    assert_eq!(h.sent(), vec!["<JR 1>"]);

    h.feed("<jR 1 2 3>");
    assert!(h.sent().is_empty());
    assert_eq!(h.session.roster_count(), 2);
}

#[test]
fn test_refresh_roster_fetches_again() {
    let mut h = Harness::new();
    h.session.get_lists(only("roster")).unwrap();
    h.feed("<jR 3>");
    h.feed("<jR 3 \"Mogul\" \"\">");
    h.session.get_lists(only("roster")).unwrap();
    assert!(h.session.received_lists());
    h.sent();

    h.session.refresh_roster();
    assert_eq!(h.session.roster_count(), 0);
    assert!(!h.session.received_roster());
    assert!(!h.session.received_lists());

    h.session.get_lists(only("roster")).unwrap();
    assert_eq!(h.sent(), vec!["<JR>"]);
}

#[test]
fn test_empty_marker_completes_a_populated_list() {
    let mut h = Harness::new();
    h.session.get_lists(only("roster")).unwrap();
    h.feed("<jR 1 2>");
    assert_eq!(h.sent(), vec!["<JR>", "<JR 1>"]);
    h.events();

    // The station's roster emptied before the walk finished.
    h.feed("<jR>");
    assert_eq!(h.events(), vec![Event::RosterList]);
    assert!(h.session.received_roster());
    h.session.get_lists(only("roster")).unwrap();
    assert!(h.session.received_lists());
    assert!(h.sent().is_empty());
}

#[test]
fn test_turnout_walk_and_broadcasts() {
    let mut h = Harness::new();
    h.session.get_lists(only("turnouts")).unwrap();
    assert_eq!(h.sent(), vec!["<JT>"]);

    h.feed("<jT 100 101>");
    assert_eq!(h.sent(), vec!["<JT 100>"]);
    h.feed("<jT 100 T \"Yard entry\">");
    assert_eq!(h.sent(), vec!["<JT 101>"]);
    h.feed("<jT 101 C \"Main\">");
    assert!(h.sent().is_empty());
    assert_eq!(h.events(), vec![Event::TurnoutList]);

    let turnout = h.session.turnout(100).unwrap();
    assert_eq!(turnout.name(), Some("Yard entry"));
    assert!(turnout.is_thrown());
    assert!(!h.session.turnout(101).unwrap().is_thrown());

    h.feed("<H 101 1><H 999 1>");
    assert_eq!(h.events(), vec![Event::TurnoutAction { id: 101, thrown: true }]);
    assert!(h.session.turnout(101).unwrap().is_thrown());

    h.session.toggle_turnout(100).unwrap();
    h.session.toggle_turnout(999).unwrap();
    h.session.throw_turnout(5).unwrap();
    assert_eq!(h.sent(), vec!["<T 100 0>", "<T 5 1>"]);
}

#[test]
fn test_route_walk_and_hand_off() {
    let mut h = Harness::new();
    h.session.get_lists(only("routes")).unwrap();
    assert_eq!(h.sent(), vec!["<JA>"]);

    h.feed("<jA 200 300>");
    assert_eq!(h.sent(), vec!["<JA 200>"]);
    h.feed("<jA 200 R \"Station approach\">");
    assert_eq!(h.sent(), vec!["<JA 300>"]);
    h.feed("<jA 300 A \"Shuttle\">");
    assert_eq!(h.events(), vec![Event::RouteList]);

    assert_eq!(h.session.route(200).unwrap().route_type(), RouteType::Route);
    assert_eq!(h.session.route(300).unwrap().route_type(), RouteType::Automation);

    h.session.hand_off_loco(3, 200).unwrap();
    h.session.hand_off_loco(3, 300).unwrap();
    h.session.start_route(200).unwrap();
    h.session.pause_routes().unwrap();
    h.session.resume_routes().unwrap();
    assert_eq!(
        h.sent(),
        vec!["</ START 3 300>", "</ START 200>", "</PAUSE>", "</RESUME>"]
    );
}

#[test]
fn test_two_turntables_with_interleaved_positions() {
    let mut h = Harness::new();
    h.session.get_lists(only("turntables")).unwrap();
    assert_eq!(h.sent(), vec!["<JO>"]);

    h.feed("<jO 1 2>");
    assert_eq!(h.sent(), vec!["<JO 1>"]);

    h.feed("<jO 1 1 0 3 \"EX-Turntable\">");
    assert_eq!(h.sent(), vec!["<JP 1>", "<JO 2>"]);
    h.feed("<jO 2 0 1 2 \"DCC Turntable\">");
    assert_eq!(h.sent(), vec!["<JP 2>"]);
    assert!(h.events().is_empty());

    h.feed("<jP 1 0 900 \"\"><jP 2 0 0 \"\"><jP 1 1 450 \"Bay 1\"><jP 2 1 1800 \"Shed\">");
    assert!(h.events().is_empty());
    assert!(!h.session.received_turntable_list());

    h.feed("<jP 1 2 1350 \"Bay 2\">");
    assert_eq!(h.events(), vec![Event::TurntableList]);
    assert!(h.session.received_turntable_list());

    let tt = h.session.turntable(1).unwrap();
    assert_eq!(tt.turntable_type(), TurntableType::ExTurntable);
    assert_eq!(tt.index_count(), 3);
    assert_eq!(tt.index_by_id(0).unwrap().name(), "Home");
    assert_eq!(tt.index_by_id(2).unwrap().angle(), 1350);
    assert_eq!(h.session.turntable(2).unwrap().index(), 1);
}

#[test]
fn test_turntable_without_positions_completes_on_entry() {
    let mut h = Harness::new();
    h.feed("<jO 5>");
    assert_eq!(h.sent(), vec!["<JO 5>"]);

    h.feed("<jO 5 0 0 0 \"Fixed\">");
    assert_eq!(h.sent(), vec!["<JP 5>"]);
    assert_eq!(h.events(), vec![Event::TurntableList]);
}

#[test]
fn test_turntable_rotate_and_broadcast() {
    let mut h = Harness::new();
    h.feed("<jO 1 2>");
    h.feed("<jO 1 1 0 0 \"EX\">");
    h.feed("<jO 2 0 0 0 \"DCC\">");
    h.sent();
    h.events();

    h.session.rotate_turntable(1, 0, 5).unwrap();
    h.session.rotate_turntable(1, 2, 3).unwrap();
    h.session.rotate_turntable(2, 1, 3).unwrap();
    h.session.rotate_turntable(9, 1, 3).unwrap();
    assert_eq!(h.sent(), vec!["<I 1 0 2>", "<I 1 2 3>", "<I 2 1>"]);

    h.feed("<I 1 2 1><I 7 1 0>");
    assert_eq!(
        h.events(),
        vec![
            Event::TurntableAction { id: 1, position: 2, moving: true },
            Event::TurntableAction { id: 7, position: 1, moving: false },
        ]
    );
    let tt = h.session.turntable(1).unwrap();
    assert!(tt.is_moving());
    assert_eq!(tt.index(), 2);
}

// ============================================================================
// Loco Tests
// ============================================================================

#[test]
fn test_loco_broadcast_updates_roster_and_consist() {
    let mut h = Harness::new();
    h.feed("<jR 3>");
    h.feed("<jR 3 \"Mogul\" \"Lights\">");
    h.sent();
    h.events();

    let loco = h.session.find_loco_in_roster(3).unwrap();
    let mut consist = Consist::new();
    consist.add_loco(&loco, Facing::Forward);
    consist.add_loco_by_address(4, Facing::Reversed);

    h.feed("<l 3 0 150 1>");
    let events = h.events();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        Event::LocoUpdate {
            address: 3,
            speed: 21,
            direction: Direction::Forward,
            function_states: 1,
        }
    );
    assert!(matches!(&events[1], Event::LocoBroadcast(b) if b.address == 3 && b.speed == 21));

    assert_eq!(consist.speed(), 21);
    assert_eq!(consist.direction(), Direction::Forward);
    assert!(consist.is_function_on(0));

    h.feed("<l 3 0 12 0>");
    assert_eq!(consist.speed(), 11);
    assert_eq!(consist.direction(), Direction::Reverse);
}

/// Reads a consist sharing a roster loco from inside the update callback.
struct ConsistWatcher {
    consist: Rc<RefCell<Consist>>,
    seen: Rc<RefCell<Vec<(u8, Direction)>>>,
}

impl ProtocolDelegate for ConsistWatcher {
    fn received_loco_update(&mut self, loco: &Loco) {
        let consist = self.consist.borrow();
        assert_eq!(consist.speed(), loco.speed());
        self.seen.borrow_mut().push((consist.speed(), consist.direction()));
    }
}

#[test]
fn test_loco_update_callback_may_read_shared_locos() {
    let mut session = Session::with_clock(SessionConfig::default(), ManualClock::new());
    session.connect(MemoryChannel::new());
    let (tx, _rx) = mpsc::channel();
    session.set_delegate(Box::new(tx));
    session.channel_mut().unwrap().load("<jR 3><jR 3 \"Mogul\" \"\">");
    session.check().unwrap();

    let loco = session.find_loco_in_roster(3).unwrap();
    let consist = Rc::new(RefCell::new(Consist::new()));
    consist.borrow_mut().add_loco(&loco, Facing::Forward);
    let seen = Rc::new(RefCell::new(Vec::new()));
    session.set_delegate(Box::new(ConsistWatcher {
        consist: consist.clone(),
        seen: seen.clone(),
    }));

    session.channel_mut().unwrap().load("<l 3 0 150 0>");
    session.check().unwrap();

    assert_eq!(*seen.borrow(), vec![(21, Direction::Forward)]);
    assert_eq!(loco.borrow().speed(), 21);
}

#[test]
fn test_loco_commands() {
    let mut h = Harness::new();
    h.feed("<jR 3>");
    h.feed("<jR 3 \"Mogul\" \"\">");
    h.sent();

    let loco = h.session.find_loco_in_roster(3).unwrap();
    h.session.set_throttle(&loco.borrow(), 50, Direction::Forward).unwrap();
    h.session.function_on(&loco.borrow(), 2).unwrap();
    h.session.function_off(&loco.borrow(), 2).unwrap();
    h.session.request_loco_update(3).unwrap();
    h.session.read_loco().unwrap();
    h.session.emergency_stop().unwrap();
    h.session.request_supported_locos().unwrap();
    assert_eq!(
        h.sent(),
        vec!["<t 3 50 1>", "<F 3 2 1>", "<F 3 2 0>", "<t 3>", "<R>", "<!>", "<#>"]
    );
}

// ============================================================================
// Track and Programming Tests
// ============================================================================

#[test]
fn test_power_broadcasts() {
    let mut h = Harness::new();
    h.feed("<p1><p0 PROG><p1 MAIN>");
    let events = h.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], Event::TrackPower(TrackPower::On));
    assert!(matches!(events[1], Event::IndividualTrackPower { state: TrackPower::Off, .. }));
    assert!(matches!(events[2], Event::IndividualTrackPower { state: TrackPower::On, .. }));
    assert_eq!(events[3], Event::TrackPower(TrackPower::On));
}

#[test]
fn test_programming_round_trip() {
    let mut h = Harness::new();
    h.session.read_cv(1).unwrap();
    h.session.write_cv(3, 10).unwrap();
    h.session.write_cv_bit(29, 5, 1).unwrap();
    h.session.validate_cv(1, 3).unwrap();
    h.session.validate_cv_bit(29, 5, 1).unwrap();
    h.session.write_loco_address(1234).unwrap();
    h.session.write_cv_on_main(3, 4, 20).unwrap();
    h.session.write_cv_bit_on_main(3, 29, 1, 0).unwrap();
    assert_eq!(
        h.sent(),
        vec![
            "<R 1>",
            "<W 3 10>",
            "<B 29 5 1>",
            "<V 1 3>",
            "<V 29 5 1>",
            "<W 1234>",
            "<w 3 4 20>",
            "<b 3 29 1 0>",
        ]
    );

    h.feed("<r 1 3><v 29 5 1><w -1>");
    assert_eq!(
        h.events(),
        vec![
            Event::WriteCv { cv: 1, value: 3 },
            Event::ValidateCvBit { cv: 29, bit: 5, value: 1 },
            Event::WriteLoco(-1),
        ]
    );
}

#[test]
fn test_accessory_commands() {
    let mut h = Harness::new();
    h.session.activate_accessory(10, 2).unwrap();
    h.session.deactivate_accessory(10, 2).unwrap();
    h.session.activate_linear_accessory(41).unwrap();
    h.session.deactivate_linear_accessory(41).unwrap();
    assert_eq!(h.sent(), vec!["<a 10 2 1>", "<a 10 2 0>", "<a 41 1>", "<a 41 0>"]);
}
