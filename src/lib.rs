//! Scheduled, time-bounded inter-AS contacts for a BGP speaker
//!
//! Contacts are persisted in a flat record file and scheduled on a timer wheel.
//! When a contact begins, routes whose AS path can be extended across it are
//! synthesized into the RIB; when it ends, every route crossing it is withdrawn.
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod contacts;
pub mod engine;
pub mod error;
mod handler;
pub mod rib;
mod utils;

pub use config::ServerConfig;
pub use contacts::{ContactSet, ContactStore, ScheduledContactEntry};
pub use error::{CodecError, ContactError};
pub use handler::{serve, Server};
