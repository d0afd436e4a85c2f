//! # palaver-store
//!
//! Client-side state for palaver: the per-conversation message log, the
//! typing presence tracker, and the durable key/value capability used to
//! remember the credential and user preferences across restarts.
//!
//! The in-memory structures take `&mut self` and do no locking; they are
//! owned by the sync coordinator, which serializes every mutation.

pub mod database;
pub mod kv;
pub mod messages;
pub mod migrations;
pub mod presence;

mod error;

pub use database::SqliteKv;
pub use error::{Result, StoreError};
pub use kv::{KeyValueStore, MemoryKv};
pub use messages::{AppendOutcome, MessageStore, StatusUpdate};
pub use presence::PresenceTracker;
