//! Bulk list synchronization.
//!
//! The command station has a small command buffer and does not acknowledge
//! commands, so lists are fetched strictly one at a time in the order roster,
//! turnouts, routes, turntables. Each list moves through
//! `NotRequested -> Requested -> Received`; [`ListSync::next_step`] looks at
//! those states and says what to do next, so calling it repeatedly from a
//! polling loop resumes wherever the exchange left off.

use crate::commands::Command;

/// One of the four bulk lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Roster locos (`<JR>`).
    Roster,
    /// Turnouts (`<JT>`).
    Turnouts,
    /// Routes and automations (`<JA>`).
    Routes,
    /// Turntables (`<JO>`).
    Turntables,
}

impl ListKind {
    /// Fetch order.
    pub const ORDER: [ListKind; 4] = [
        ListKind::Roster,
        ListKind::Turnouts,
        ListKind::Routes,
        ListKind::Turntables,
    ];

    /// The overview request for this list.
    pub fn overview_command(self) -> Command {
        match self {
            ListKind::Roster => Command::RosterList,
            ListKind::Turnouts => Command::TurnoutList,
            ListKind::Routes => Command::RouteList,
            ListKind::Turntables => Command::TurntableList,
        }
    }

    /// The detail request for one entity of this list.
    pub fn detail_command(self, id: i32) -> Command {
        match self {
            ListKind::Roster => Command::RosterEntry { address: id },
            ListKind::Turnouts => Command::TurnoutEntry { id },
            ListKind::Routes => Command::RouteEntry { id },
            ListKind::Turntables => Command::TurntableEntry { id },
        }
    }

    fn slot(self) -> usize {
        match self {
            ListKind::Roster => 0,
            ListKind::Turnouts => 1,
            ListKind::Routes => 2,
            ListKind::Turntables => 3,
        }
    }
}

/// Progress of one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListState {
    /// Not asked for yet.
    #[default]
    NotRequested,
    /// Overview sent, waiting for the walk to finish.
    Requested,
    /// Fully received.
    Received,
}

/// Which lists the application needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListSelection {
    /// Fetch the roster.
    pub roster: bool,
    /// Fetch turnouts.
    pub turnouts: bool,
    /// Fetch routes and automations.
    pub routes: bool,
    /// Fetch turntables.
    pub turntables: bool,
}

impl ListSelection {
    /// Every list.
    pub fn all() -> Self {
        ListSelection {
            roster: true,
            turnouts: true,
            routes: true,
            turntables: true,
        }
    }

    /// Whether `kind` is required.
    pub fn requires(&self, kind: ListKind) -> bool {
        match kind {
            ListKind::Roster => self.roster,
            ListKind::Turnouts => self.turnouts,
            ListKind::Routes => self.routes,
            ListKind::Turntables => self.turntables,
        }
    }
}

/// What the session should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    /// Send the overview request for this list.
    Request(ListKind),
    /// A list is in flight; do nothing.
    Waiting(ListKind),
    /// Every required list has arrived.
    Complete,
}

/// State of all four lists.
#[derive(Debug, Clone, Default)]
pub struct ListSync {
    states: [ListState; 4],
    all_received: bool,
}

impl ListSync {
    /// Create with every list not yet requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one list.
    pub fn state(&self, kind: ListKind) -> ListState {
        self.states[kind.slot()]
    }

    /// Whether the overview for `kind` has been sent.
    pub fn is_requested(&self, kind: ListKind) -> bool {
        self.state(kind) != ListState::NotRequested
    }

    /// Whether `kind` has been fully received.
    pub fn is_received(&self, kind: ListKind) -> bool {
        self.state(kind) == ListState::Received
    }

    /// Whether every required list has been received.
    pub fn all_received(&self) -> bool {
        self.all_received
    }

    /// Record that the overview for `kind` went out.
    pub fn mark_requested(&mut self, kind: ListKind) {
        if self.state(kind) == ListState::NotRequested {
            self.states[kind.slot()] = ListState::Requested;
        }
    }

    /// Record that `kind` is complete.
    pub fn mark_received(&mut self, kind: ListKind) {
        self.states[kind.slot()] = ListState::Received;
    }

    /// Forget `kind` so it is fetched again.
    pub fn reset(&mut self, kind: ListKind) {
        self.states[kind.slot()] = ListState::NotRequested;
        self.all_received = false;
    }

    /// Decide the next step for `selection`.
    ///
    /// Returns the first required list not yet requested, unless an earlier
    /// required list is still in flight. Once every required list has been
    /// received the combined flag latches until a list is reset.
    pub fn next_step(&mut self, selection: ListSelection) -> SyncStep {
        if self.all_received {
            return SyncStep::Complete;
        }
        for kind in ListKind::ORDER {
            if !selection.requires(kind) {
                continue;
            }
            match self.state(kind) {
                ListState::NotRequested => return SyncStep::Request(kind),
                ListState::Requested => return SyncStep::Waiting(kind),
                ListState::Received => {}
            }
        }
        self.all_received = true;
        SyncStep::Complete
    }
}
