//! Turnouts, routes and turntables.
//!
//! Each is created as a placeholder holding only its id when the overview list
//! arrives, then filled in by its detail response.

use crate::types::{RouteType, TurntableType};

/// A turnout (point).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turnout {
    id: i32,
    name: Option<String>,
    thrown: bool,
}

impl Turnout {
    /// Create a placeholder turnout.
    pub fn new(id: i32, thrown: bool) -> Self {
        Turnout {
            id,
            name: None,
            thrown,
        }
    }

    /// Turnout id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Description, once received.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the description.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Whether the turnout is thrown.
    pub fn is_thrown(&self) -> bool {
        self.thrown
    }

    /// Record the thrown/closed state.
    pub fn set_thrown(&mut self, thrown: bool) {
        self.thrown = thrown;
    }
}

/// A route or automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    id: i32,
    name: Option<String>,
    route_type: RouteType,
}

impl Route {
    /// Create a placeholder route.
    pub fn new(id: i32) -> Self {
        Route {
            id,
            name: None,
            route_type: RouteType::Unknown,
        }
    }

    /// Route id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Description, once received.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the description.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Route or automation.
    pub fn route_type(&self) -> RouteType {
        self.route_type
    }

    /// Set the route type.
    pub fn set_route_type(&mut self, route_type: RouteType) {
        self.route_type = route_type;
    }
}

/// Name given to index 0, which the command station never labels.
pub const HOME_INDEX_NAME: &str = "Home";

/// One stopping position of a turntable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurntableIndex {
    turntable_id: i32,
    id: i32,
    angle: i32,
    name: String,
}

impl TurntableIndex {
    /// Create a position entry. Index 0 is always named "Home".
    pub fn new(turntable_id: i32, id: i32, angle: i32, name: impl Into<String>) -> Self {
        let name = if id == 0 {
            HOME_INDEX_NAME.to_string()
        } else {
            name.into()
        };
        TurntableIndex {
            turntable_id,
            id,
            angle,
            name,
        }
    }

    /// Id of the owning turntable.
    pub fn turntable_id(&self) -> i32 {
        self.turntable_id
    }

    /// Position id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Angle in tenths of a degree.
    pub fn angle(&self) -> i32 {
        self.angle
    }

    /// Label.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A turntable and its positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turntable {
    id: i32,
    turntable_type: TurntableType,
    index: i32,
    number_of_indexes: usize,
    name: Option<String>,
    moving: bool,
    indexes: Vec<TurntableIndex>,
}

impl Turntable {
    /// Create a placeholder turntable.
    pub fn new(id: i32) -> Self {
        Turntable {
            id,
            turntable_type: TurntableType::Unknown,
            index: 0,
            number_of_indexes: 0,
            name: None,
            moving: false,
            indexes: Vec::new(),
        }
    }

    /// Turntable id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// DCC or EX-Turntable.
    pub fn turntable_type(&self) -> TurntableType {
        self.turntable_type
    }

    /// Set the turntable type.
    pub fn set_turntable_type(&mut self, turntable_type: TurntableType) {
        self.turntable_type = turntable_type;
    }

    /// Current position index.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Record the current position index.
    pub fn set_index(&mut self, index: i32) {
        self.index = index;
    }

    /// Number of positions the command station declared.
    pub fn number_of_indexes(&self) -> usize {
        self.number_of_indexes
    }

    /// Record the declared number of positions.
    pub fn set_number_of_indexes(&mut self, count: usize) {
        self.number_of_indexes = count;
    }

    /// Description, once received.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the description.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Whether the turntable is rotating.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Record whether the turntable is rotating.
    pub fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }

    /// Append a position.
    pub fn add_index(&mut self, index: TurntableIndex) {
        self.indexes.push(index);
    }

    /// Number of positions received so far.
    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Positions in the order they were received.
    pub fn indexes(&self) -> &[TurntableIndex] {
        &self.indexes
    }

    /// Position with the given id.
    pub fn index_by_id(&self, id: i32) -> Option<&TurntableIndex> {
        self.indexes.iter().find(|i| i.id() == id)
    }

    /// Whether the detail and every declared position have arrived.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.indexes.len() == self.number_of_indexes
    }
}
