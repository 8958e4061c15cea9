//! DCC-EX Native Protocol Client
//!
//! This crate implements the client side of the DCC-EX native command
//! protocol, used to drive and monitor an EX-CommandStation over a serial
//! port or network socket.
//!
//! # Protocol Overview
//!
//! Every message in either direction is one bracketed ASCII frame:
//!
//! - **Opcode**: the first character after `<`
//! - **Numbers**: signed decimal integers, e.g. `<t 3 50 1>`
//! - **Keywords**: bare words such as `MAIN` or `T`, hashed to integers on receipt
//! - **Text**: double-quoted strings, e.g. `<m "Hello">`
//!
//! The command station does not acknowledge commands and has a small input
//! buffer, so bulk lists (roster, turnouts, routes, turntables) are fetched
//! one at a time: an overview request returns the ids, then each entry's
//! detail is requested in turn.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::mpsc;
//! use dccex_protocol::{ListSelection, MemoryChannel, Session, SessionConfig};
//!
//! let (tx, rx) = mpsc::channel();
//! let mut session = Session::new(SessionConfig::default());
//! session.connect(MemoryChannel::new());
//! session.set_delegate(Box::new(tx));
//!
//! loop {
//!     session.check()?;
//!     session.get_lists(ListSelection::all())?;
//!     for event in rx.try_iter() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

mod channel;
mod clock;
mod commands;
mod config;
mod consist;
mod entities;
mod error;
mod events;
mod frame;
mod loco;
mod registry;
mod session;
mod sync;
mod types;

pub use channel::*;
pub use clock::*;
pub use commands::*;
pub use config::*;
pub use consist::*;
pub use entities::*;
pub use error::*;
pub use events::*;
pub use frame::*;
pub use loco::*;
pub use registry::*;
pub use session::*;
pub use sync::*;
pub use types::*;
