//! Ordered collections of the entities learnt from the command station.
//!
//! Each collection keeps wire order (the order ids appeared in the overview
//! response) and rejects duplicate keys. The detail walk asks "which entity
//! after this one still lacks its detail?", which [`EntityList::next_after`]
//! and [`Entity::has_detail`] answer from entity state alone.

use crate::entities::{Route, Turnout, Turntable};
use crate::loco::LocoRef;

/// An entity held in an [`EntityList`].
pub trait Entity {
    /// Unique key within its list (address or id).
    fn key(&self) -> i32;

    /// Whether the detail response has populated this entity.
    fn has_detail(&self) -> bool;
}

impl Entity for LocoRef {
    fn key(&self) -> i32 {
        self.borrow().address()
    }

    fn has_detail(&self) -> bool {
        self.borrow().name().is_some()
    }
}

impl Entity for Turnout {
    fn key(&self) -> i32 {
        self.id()
    }

    fn has_detail(&self) -> bool {
        self.name().is_some()
    }
}

impl Entity for Route {
    fn key(&self) -> i32 {
        self.id()
    }

    fn has_detail(&self) -> bool {
        self.name().is_some()
    }
}

impl Entity for Turntable {
    fn key(&self) -> i32 {
        self.id()
    }

    fn has_detail(&self) -> bool {
        self.name().is_some()
    }
}

/// Insertion-ordered list of entities with unique keys.
#[derive(Debug, Clone)]
pub struct EntityList<T> {
    items: Vec<T>,
}

impl<T> Default for EntityList<T> {
    fn default() -> Self {
        EntityList { items: Vec::new() }
    }
}

impl<T: Entity> EntityList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity. Returns `false` and drops it if the key is taken.
    pub fn insert(&mut self, entity: T) -> bool {
        if self.contains(entity.key()) {
            return false;
        }
        self.items.push(entity);
        true
    }

    /// Whether an entity with this key exists.
    pub fn contains(&self, key: i32) -> bool {
        self.position(key).is_some()
    }

    /// Entity with this key.
    pub fn get(&self, key: i32) -> Option<&T> {
        self.items.iter().find(|e| e.key() == key)
    }

    /// Mutable entity with this key.
    pub fn get_mut(&mut self, key: i32) -> Option<&mut T> {
        self.items.iter_mut().find(|e| e.key() == key)
    }

    /// The entity following the one with this key.
    pub fn next_after(&self, key: i32) -> Option<&T> {
        self.items.get(self.position(key)? + 1)
    }

    /// First entity.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Entities in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every entity.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn position(&self, key: i32) -> Option<usize> {
        self.items.iter().position(|e| e.key() == key)
    }
}

impl<'a, T: Entity> IntoIterator for &'a EntityList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Everything the session has learnt about the layout.
#[derive(Debug, Default)]
pub struct Registry {
    /// Roster locos.
    pub roster: EntityList<LocoRef>,
    /// Turnouts.
    pub turnouts: EntityList<Turnout>,
    /// Routes and automations.
    pub routes: EntityList<Route>,
    /// Turntables.
    pub turntables: EntityList<Turntable>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every list.
    pub fn clear(&mut self) {
        self.roster.clear();
        self.turnouts.clear();
        self.routes.clear();
        self.turntables.clear();
    }

    /// Whether every turntable has its detail and all declared positions.
    pub fn turntables_complete(&self) -> bool {
        self.turntables.iter().all(Turntable::is_complete)
    }
}
