//! Inbound frame handling.
//!
//! Each frame is routed on its opcode, parameter count, and which parameters
//! are quoted text. Anything that does not match a known shape is ignored.

use log::debug;

use super::Session;
use crate::channel::ByteChannel;
use crate::clock::Clock;
use crate::commands::Command;
use crate::entities::{Route, Turnout, Turntable, TurntableIndex};
use crate::events::ProtocolDelegate;
use crate::frame::{keyword, Frame};
use crate::loco::{Loco, LocoBroadcast};
use crate::registry::{Entity, EntityList};
use crate::sync::ListKind;
use crate::types::{LocoSource, RouteType, ServerVersion, TrackMode, TrackPower, TurntableType};

/// Key of the entity after `key` if it still needs its detail.
fn next_pending<T: Entity>(list: &EntityList<T>, key: i32) -> Option<i32> {
    list.next_after(key)
        .filter(|e| !e.has_detail())
        .map(Entity::key)
}

/// Whether parameters `0..count` are all non-text.
fn all_numeric(frame: &Frame<'_>, count: usize) -> bool {
    (0..count).all(|i| !frame.is_text(i))
}

impl<C: ByteChannel, K: Clock> Session<C, K> {
    pub(super) fn dispatch(&mut self, frame: &Frame<'_>) {
        let Some(mut delegate) = self.delegate.take() else {
            return;
        };
        self.last_response_ms = self.clock.now_millis();
        self.route_frame(frame, delegate.as_mut());
        self.delegate = Some(delegate);
    }

    fn route_frame(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let count = frame.len();
        let numeric_lead = count > 0 && !frame.is_text(0);

        match frame.opcode() {
            '@' => {
                if let (3, Some(text)) = (count, frame.text(2)) {
                    delegate.received_screen_update(frame.number(0), frame.number(1), text);
                }
            }
            'i' => {
                if let Some(banner) = frame.text(0) {
                    self.on_server_banner(banner, delegate);
                }
            }
            'm' => {
                if let Some(message) = frame.text(0) {
                    delegate.received_message(message);
                }
            }
            'I' => {
                if count == 3 {
                    self.on_turntable_broadcast(frame, delegate);
                }
            }
            'p' => {
                if (1..=2).contains(&count) && all_numeric(frame, count) {
                    on_track_power(frame, delegate);
                }
            }
            '=' => {
                if count >= 2 {
                    on_track_type(frame, delegate);
                }
            }
            'l' => {
                if count == 4 && all_numeric(frame, 4) {
                    self.on_loco_broadcast(frame, delegate);
                }
            }
            'j' => {
                if numeric_lead {
                    self.on_list_reply(frame, delegate);
                }
            }
            'H' => {
                if numeric_lead && count == 2 {
                    self.on_turnout_broadcast(frame, delegate);
                }
            }
            'r' => match (numeric_lead, count) {
                (true, 1) => delegate.received_read_loco(frame.number(0)),
                (true, 2) => delegate.received_write_cv(frame.number(0), frame.number(1)),
                _ => {}
            },
            'w' => {
                if numeric_lead {
                    delegate.received_write_loco(frame.number(0));
                }
            }
            'v' => match (numeric_lead, count) {
                (true, 2) => delegate.received_validate_cv(frame.number(0), frame.number(1)),
                (true, 3) => delegate.received_validate_cv_bit(
                    frame.number(0),
                    frame.number(1),
                    frame.number(2),
                ),
                _ => {}
            },
            _ => {}
        }
    }

    // ========== Broadcasts ==========

    fn on_server_banner(&mut self, banner: &str, delegate: &mut dyn ProtocolDelegate) {
        if let Some(version) = ServerVersion::parse_banner(banner) {
            debug!("Command station version {}", version);
            self.version = Some(version);
            delegate.received_server_version(version);
        }
    }

    fn on_loco_broadcast(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let address = frame.number(0);
        let broadcast = LocoBroadcast::decode(address, frame.number(2), frame.number(3));

        if let Some(loco) = self.registry.roster.get(address).cloned() {
            broadcast.apply(&mut loco.borrow_mut());
            // Released first so the delegate may read shared locos and consists.
            delegate.received_loco_update(&loco.borrow());
        }
        delegate.received_loco_broadcast(&broadcast);
    }

    fn on_turnout_broadcast(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let id = frame.number(0);
        let thrown = frame.number(1) != 0;
        if let Some(turnout) = self.registry.turnouts.get_mut(id) {
            turnout.set_thrown(thrown);
            delegate.received_turnout_action(id, thrown);
        }
    }

    fn on_turntable_broadcast(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let id = frame.number(0);
        let position = frame.number(1);
        let moving = frame.number(2) != 0;
        if let Some(turntable) = self.registry.turntables.get_mut(id) {
            turntable.set_index(position);
            turntable.set_moving(moving);
        }
        delegate.received_turntable_action(id, position, moving);
    }

    // ========== Lists ==========

    fn on_list_reply(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let count = frame.len();
        match frame.number(0) {
            keyword::R => {
                if count == 4 && frame.is_text(2) && frame.is_text(3) {
                    self.on_roster_entry(frame, delegate);
                } else {
                    self.on_overview(ListKind::Roster, frame, delegate);
                }
            }
            keyword::T => {
                if count == 4 && frame.is_text(3) {
                    self.on_turnout_entry(frame, delegate);
                } else {
                    self.on_overview(ListKind::Turnouts, frame, delegate);
                }
            }
            keyword::A => {
                if count == 4 && frame.is_text(3) {
                    self.on_route_entry(frame, delegate);
                } else {
                    self.on_overview(ListKind::Routes, frame, delegate);
                }
            }
            keyword::O => {
                if count == 6 && frame.is_text(5) {
                    self.on_turntable_entry(frame, delegate);
                } else {
                    self.on_overview(ListKind::Turntables, frame, delegate);
                }
            }
            keyword::P => {
                if count == 5 && frame.is_text(4) {
                    self.on_turntable_index(frame, delegate);
                }
            }
            _ => {}
        }
    }

    fn list_is_empty(&self, kind: ListKind) -> bool {
        match kind {
            ListKind::Roster => self.registry.roster.is_empty(),
            ListKind::Turnouts => self.registry.turnouts.is_empty(),
            ListKind::Routes => self.registry.routes.is_empty(),
            ListKind::Turntables => self.registry.turntables.is_empty(),
        }
    }

    /// Create placeholders from an id list and start the detail walk.
    ///
    /// A bare marker always completes the list. A list already holding
    /// entities ignores further id lists.
    fn on_overview(&mut self, kind: ListKind, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        if frame.len() == 1 {
            debug!("{:?} list is empty", kind);
            self.complete_list(kind, delegate);
            return;
        }
        if !self.list_is_empty(kind) {
            return;
        }

        let ids = (1..frame.len()).map(|i| frame.number(i));
        let first = match kind {
            ListKind::Roster => {
                for address in ids {
                    self.registry.roster.insert(Loco::shared(address, LocoSource::Roster));
                }
                self.registry.roster.first().map(Entity::key)
            }
            ListKind::Turnouts => {
                for id in ids {
                    self.registry.turnouts.insert(Turnout::new(id, false));
                }
                self.registry.turnouts.first().map(Entity::key)
            }
            ListKind::Routes => {
                for id in ids {
                    self.registry.routes.insert(Route::new(id));
                }
                self.registry.routes.first().map(Entity::key)
            }
            ListKind::Turntables => {
                for id in ids {
                    self.registry.turntables.insert(Turntable::new(id));
                }
                self.registry.turntables.first().map(Entity::key)
            }
        };

        debug!("{:?} overview: {} entries", kind, frame.len() - 1);
        if let Some(first) = first {
            self.send_quietly(kind.detail_command(first));
        }
    }

    /// Ask for the next missing detail, or finish the list.
    fn continue_walk(&mut self, kind: ListKind, next: Option<i32>, delegate: &mut dyn ProtocolDelegate) {
        match next {
            Some(key) => self.send_quietly(kind.detail_command(key)),
            None => self.complete_list(kind, delegate),
        }
    }

    fn complete_list(&mut self, kind: ListKind, delegate: &mut dyn ProtocolDelegate) {
        debug!("{:?} list received", kind);
        self.lists.mark_received(kind);
        match kind {
            ListKind::Roster => delegate.received_roster_list(),
            ListKind::Turnouts => delegate.received_turnout_list(),
            ListKind::Routes => delegate.received_route_list(),
            ListKind::Turntables => delegate.received_turntable_list(),
        }
    }

    /// `<jR address "name" "functions">`
    fn on_roster_entry(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let address = frame.number(1);
        let next = self.registry.roster.get(address).and_then(|loco| {
            let mut l = loco.borrow_mut();
            l.set_name(frame.text(2).unwrap_or_default());
            l.setup_functions(frame.text(3).unwrap_or_default());
            drop(l);
            next_pending(&self.registry.roster, address)
        });
        self.continue_walk(ListKind::Roster, next, delegate);
    }

    /// `<jT id T|C "name">`
    fn on_turnout_entry(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let id = frame.number(1);
        let next = match self.registry.turnouts.get_mut(id) {
            Some(turnout) => {
                turnout.set_thrown(frame.number(2) == keyword::T);
                turnout.set_name(frame.text(3).unwrap_or_default());
                next_pending(&self.registry.turnouts, id)
            }
            None => None,
        };
        self.continue_walk(ListKind::Turnouts, next, delegate);
    }

    /// `<jA id R|A "name">`
    fn on_route_entry(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let id = frame.number(1);
        let next = match self.registry.routes.get_mut(id) {
            Some(route) => {
                route.set_route_type(RouteType::from_keyword(frame.number(2)));
                route.set_name(frame.text(3).unwrap_or_default());
                next_pending(&self.registry.routes, id)
            }
            None => None,
        };
        self.continue_walk(ListKind::Routes, next, delegate);
    }

    /// `<jO id type index count "name">`
    ///
    /// Each entry also asks for that turntable's positions; the list is only
    /// complete once positions for every turntable are in. A turntable that
    /// declares no positions is complete as soon as its entry arrives.
    fn on_turntable_entry(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let id = frame.number(1);
        let Some(turntable) = self.registry.turntables.get_mut(id) else {
            return;
        };
        turntable.set_turntable_type(TurntableType::from_wire(frame.number(2)));
        turntable.set_index(frame.number(3));
        turntable.set_number_of_indexes(usize::try_from(frame.number(4)).unwrap_or(0));
        turntable.set_name(frame.text(5).unwrap_or_default());

        self.send_quietly(Command::TurntableIndexList { id });
        if let Some(next) = next_pending(&self.registry.turntables, id) {
            self.send_quietly(ListKind::Turntables.detail_command(next));
        }
        if self.registry.turntables_complete() {
            self.complete_list(ListKind::Turntables, delegate);
        }
    }

    /// `<jP turntable index angle "name">`
    fn on_turntable_index(&mut self, frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
        let turntable_id = frame.number(1);
        let Some(turntable) = self.registry.turntables.get_mut(turntable_id) else {
            return;
        };
        if turntable.index_count() != turntable.number_of_indexes() {
            turntable.add_index(TurntableIndex::new(
                turntable_id,
                frame.number(2),
                frame.number(3),
                frame.text(4).unwrap_or_default(),
            ));
        }

        // Positions for different turntables may interleave, so every
        // turntable is checked, not just this one.
        if self.registry.turntables_complete() {
            self.complete_list(ListKind::Turntables, delegate);
        }
    }
}

// ========== Track Broadcasts ==========

/// `<p state>` or `<p state track>`
fn on_track_power(frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
    let state = TrackPower::from_wire(frame.number(0));
    if frame.len() == 2 {
        let track = frame.number(1);
        delegate.received_individual_track_power(state, track);
        if track != keyword::MAIN {
            return;
        }
    }
    delegate.received_track_power(state);
}

/// `<= track mode>` or `<= track mode address>`
fn on_track_type(frame: &Frame<'_>, delegate: &mut dyn ProtocolDelegate) {
    let Some(track) = u8::try_from(frame.number(0))
        .ok()
        .filter(u8::is_ascii_alphabetic)
        .map(char::from)
    else {
        return;
    };
    let Some(mode) = TrackMode::from_keyword(frame.number(1)) else {
        return;
    };
    let address = if frame.len() > 2 { frame.number(2) } else { 0 };
    delegate.received_track_type(track, mode, address);
}
