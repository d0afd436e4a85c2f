//! # palaver-shared
//!
//! Types shared by every palaver crate: identifiers, the message and
//! conversation models, the message status state machine, the real-time
//! wire protocol and the error taxonomy.

pub mod codec;
pub mod constants;
pub mod error;
pub mod format;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::{Result, SyncError};
pub use models::{Conversation, FileAttachment, Identity, Message, Payload, VoiceClip};
pub use types::{ConnectionState, ConversationId, MessageId, MessageKind, MessageStatus, UserId};
