use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::models::Message;
use crate::types::{ConversationId, MessageId, MessageStatus, UserId};

/// Events emitted by the client on the real-time channel.
///
/// Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// Announce the local user after every (re)connect
    Join(JoinPayload),

    /// Plain text message, possibly a reply
    SendMessage(Message),

    /// Text re-sent from another message, `originalSender` set
    ForwardMessage(Message),

    /// Voice clip message
    VoiceMessage(Message),

    /// File attachment message
    FileMessage(Message),

    /// Best-effort delete of one message
    DeleteMessage(MessageId),

    /// Read acknowledgment for one inbound message
    MarkRead(MessageId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub user_id: UserId,
    pub username: String,
}

/// Events received from the backend or peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// A message landed in some conversation
    Message(Message),

    /// A participant started typing
    TypingStart(TypingPayload),

    /// A participant stopped typing
    TypingStop(TypingPayload),

    /// Delivery status update for a message we sent
    MessageAck(AckPayload),

    /// A message was deleted remotely
    MessageDeleted(DeletedPayload),

    /// The peer of a conversation went online or offline
    Presence(PresencePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub username: String,
    /// Absent in frames from older peers; the active conversation is assumed.
    #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub message_id: MessageId,
    #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPayload {
    pub message_id: MessageId,
    #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    #[serde(rename = "chatId")]
    pub conversation_id: ConversationId,
    pub online: bool,
}

impl OutboundEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::SendMessage(_) => "send-message",
            Self::ForwardMessage(_) => "forward-message",
            Self::VoiceMessage(_) => "voice-message",
            Self::FileMessage(_) => "file-message",
            Self::DeleteMessage(_) => "delete-message",
            Self::MarkRead(_) => "mark-read",
        }
    }

    /// The message carried by a send-type event.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::SendMessage(m)
            | Self::ForwardMessage(m)
            | Self::VoiceMessage(m)
            | Self::FileMessage(m) => Some(m),
            _ => None,
        }
    }

    pub fn message_mut(&mut self) -> Option<&mut Message> {
        match self {
            Self::SendMessage(m)
            | Self::ForwardMessage(m)
            | Self::VoiceMessage(m)
            | Self::FileMessage(m) => Some(m),
            _ => None,
        }
    }
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::TypingStart(_) => "typing-start",
            Self::TypingStop(_) => "typing-stop",
            Self::MessageAck(_) => "message-ack",
            Self::MessageDeleted(_) => "message-deleted",
            Self::Presence(_) => "presence",
        }
    }
}

/// Serialize an event into a text frame.
pub fn encode_frame<T: Serialize>(event: &T) -> Result<String> {
    serde_json::to_string(event).map_err(|e| SyncError::Protocol(e.to_string()))
}

/// Parse a text frame into an event.
pub fn decode_frame<T: DeserializeOwned>(frame: &str) -> Result<T> {
    serde_json::from_str(frame).map_err(|e| SyncError::Protocol(e.to_string()))
}
