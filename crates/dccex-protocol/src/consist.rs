//! Consists: groups of locos driven as one.
//!
//! A consist never owns roster locos; it holds shared handles to them. Locos
//! added by address are created locally as [`LocoSource::Entry`] and live only
//! as long as the consist (or the application) holds them.
//!
//! The consist's speed and direction are always those of its first member.

use std::rc::Rc;

use crate::loco::{Loco, LocoRef};
use crate::types::{Direction, Facing, LocoSource};

/// One member of a consist.
#[derive(Debug, Clone)]
pub struct ConsistMember {
    loco: LocoRef,
    facing: Facing,
}

impl ConsistMember {
    /// The member loco.
    pub fn loco(&self) -> &LocoRef {
        &self.loco
    }

    /// DCC address of the member loco.
    pub fn address(&self) -> i32 {
        self.loco.borrow().address()
    }

    /// Which way the loco faces within the consist.
    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Direction to send this member for a requested consist direction.
    pub fn direction_for(&self, direction: Direction) -> Direction {
        match self.facing {
            Facing::Forward => direction,
            Facing::Reversed => direction.reversed(),
        }
    }
}

/// An ordered chain of locos with per-member facing.
#[derive(Debug, Clone, Default)]
pub struct Consist {
    name: Option<String>,
    members: Vec<ConsistMember>,
}

impl Consist {
    /// Create an empty, unnamed consist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consist name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Override the consist name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Add an existing loco.
    ///
    /// Ignored if the loco is already a member. The first member always faces
    /// forward and, if no name has been set, lends the consist its name.
    pub fn add_loco(&mut self, loco: &LocoRef, facing: Facing) {
        if self.contains(loco) {
            return;
        }
        let facing = if self.members.is_empty() {
            if self.name.is_none() {
                let l = loco.borrow();
                self.name = Some(match l.name() {
                    Some(name) => name.to_string(),
                    None => l.address().to_string(),
                });
            }
            Facing::Forward
        } else {
            facing
        };
        self.members.push(ConsistMember {
            loco: Rc::clone(loco),
            facing,
        });
    }

    /// Add a loco by address, creating a local loco for it.
    ///
    /// Ignored if a member already has this address.
    pub fn add_loco_by_address(&mut self, address: i32, facing: Facing) {
        if self.contains_address(address) {
            return;
        }
        let loco = Loco::shared(address, LocoSource::Entry);
        self.add_loco(&loco, facing);
    }

    /// Remove a loco. Does nothing if it is not a member.
    pub fn remove_loco(&mut self, loco: &LocoRef) {
        self.members.retain(|m| !Rc::ptr_eq(&m.loco, loco));
    }

    /// Remove every member. The name is kept.
    pub fn remove_all_locos(&mut self) {
        self.members.clear();
    }

    /// Change the facing of a member loco.
    pub fn set_loco_facing(&mut self, loco: &LocoRef, facing: Facing) {
        if let Some(member) = self.members.iter_mut().find(|m| Rc::ptr_eq(&m.loco, loco)) {
            member.facing = facing;
        }
    }

    /// Number of member locos.
    pub fn loco_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the consist has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether this exact loco is a member.
    pub fn contains(&self, loco: &LocoRef) -> bool {
        self.members.iter().any(|m| Rc::ptr_eq(&m.loco, loco))
    }

    /// Whether a member has this address.
    pub fn contains_address(&self, address: i32) -> bool {
        self.by_address(address).is_some()
    }

    /// Speed of the first member, or 0 when empty.
    pub fn speed(&self) -> u8 {
        self.first().map_or(0, |m| m.loco.borrow().speed())
    }

    /// Direction of the first member, or forward when empty.
    pub fn direction(&self) -> Direction {
        self.first()
            .map_or(Direction::Forward, |m| m.loco.borrow().direction())
    }

    /// Whether a function is on, judged by the first member.
    pub fn is_function_on(&self, function: usize) -> bool {
        self.first()
            .is_some_and(|m| m.loco.borrow().is_function_on(function))
    }

    /// The lead member.
    pub fn first(&self) -> Option<&ConsistMember> {
        self.members.first()
    }

    /// The member with this address.
    pub fn by_address(&self, address: i32) -> Option<&ConsistMember> {
        self.members.iter().find(|m| m.address() == address)
    }

    /// Members in consist order.
    pub fn members(&self) -> impl Iterator<Item = &ConsistMember> {
        self.members.iter()
    }
}
