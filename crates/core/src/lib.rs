//! Server Query Core Library
//!
//! I/O-free protocol model for the Server Query text interface: the wire
//! codec, commands and results, events, notification decoding, roster
//! diffing and configuration.

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod result;
pub mod roster;
pub mod wire;

pub use command::Command;
pub use config::{Credentials, QueryConfig};
pub use error::{Error, Result};
pub use event::{ClientRef, Event, EventListener, MessageMode};
pub use notify::{decode_notification, is_notification};
pub use result::{QueryResult, ResultRow};
pub use roster::{roster_command, ClientInfo, ClientSnapshot, RosterTracker};
pub use wire::{escape, unescape, WireMap, WireValue};
