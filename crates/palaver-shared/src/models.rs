//! Domain models exchanged between the core, the backend and the
//! presentation layer.
//!
//! Every struct derives `Serialize` and `Deserialize`; field names follow the
//! backend's camelCase JSON so the same types travel over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{format_file_size, truncate_preview};
use crate::types::{ConversationId, MessageId, MessageKind, MessageStatus, UserId};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A user known to the client: the local user's profile or a contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            name: name.into(),
            email: None,
            mobile: None,
            photo: None,
        }
    }

    /// Name shown to other participants: the display name, else the email.
    pub fn label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            email
        } else {
            "Anonymous"
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Summary of one conversation as listed in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub display_name: String,
    #[serde(default)]
    pub last_message_preview: String,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub peer_online: bool,
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A recorded voice clip, already encoded by the capture layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceClip {
    #[serde(default = "default_audio_type")]
    pub audio_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(with = "crate::codec::base64_bytes")]
    pub audio: Vec<u8>,
}

fn default_audio_type() -> String {
    "audio/wav".to_string()
}

/// A file attachment: metadata plus the already-read bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    pub file_size: u64,
    #[serde(with = "crate::codec::base64_bytes")]
    pub file_data: Vec<u8>,
}

/// Message content, tagged on the wire by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Text { text: String },
    Voice(VoiceClip),
    File(FileAttachment),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Voice(_) => MessageKind::Voice,
            Self::File(_) => MessageKind::File,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message with its delivery status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "chatId")]
    pub conversation_id: ConversationId,
    #[serde(rename = "userId")]
    pub sender_id: UserId,
    /// Sender's display name at the time of sending.
    #[serde(default)]
    pub username: String,
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_inbound_status")]
    pub status: MessageStatus,
    #[serde(rename = "replyTo", default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    /// Copy of the replied-to text, captured when the reply was started.
    #[serde(rename = "replyText", default, skip_serializing_if = "Option::is_none")]
    pub reply_snippet: Option<String>,
    #[serde(rename = "originalSender", default, skip_serializing_if = "Option::is_none")]
    pub forwarded_from: Option<String>,
}

// Frames from peers that omit a status have at least reached the backend.
fn default_inbound_status() -> MessageStatus {
    MessageStatus::Sent
}

impl Message {
    /// Build a locally-authored message in the `pending` state.
    pub fn outgoing(conversation_id: ConversationId, sender: &Identity, payload: Payload) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            sender_id: sender.id.clone(),
            username: sender.label().to_string(),
            payload,
            created_at: Utc::now(),
            status: MessageStatus::Pending,
            reply_to_id: None,
            reply_snippet: None,
            forwarded_from: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Text body, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Label identifying who wrote the message.
    pub fn sender_label(&self) -> &str {
        if self.username.is_empty() {
            self.sender_id.as_str()
        } else {
            &self.username
        }
    }

    /// Short text form shown as the conversation preview.
    pub fn preview(&self) -> String {
        match &self.payload {
            Payload::Text { text } => truncate_preview(text),
            Payload::Voice(_) => "🎤 Voice message".to_string(),
            Payload::File(file) => truncate_preview(&format!(
                "📎 {} ({})",
                file.file_name,
                format_file_size(file.file_size)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("u-1", "alice")
    }

    #[test]
    fn test_outgoing_starts_pending() {
        let msg = Message::outgoing(ConversationId::from("c1"), &alice(), Payload::text("hi"));
        assert_eq!(msg.status, MessageStatus::Pending);
        assert_eq!(msg.sender_id, UserId::from("u-1"));
        assert_eq!(msg.username, "alice");
        assert_eq!(msg.text(), Some("hi"));
        assert_eq!(msg.kind(), MessageKind::Text);
    }

    #[test]
    fn test_wire_field_names() {
        let mut msg = Message::outgoing(ConversationId::from("c1"), &alice(), Payload::text("hi"));
        msg.reply_to_id = Some(MessageId::from("m-0"));
        msg.reply_snippet = Some("earlier".into());

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["chatId"], "c1");
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["replyTo"], "m-0");
        assert_eq!(json["replyText"], "earlier");
        assert!(json.get("originalSender").is_none());
    }

    #[test]
    fn test_parses_peer_file_message() {
        let json = r#"{
            "id": "1700000000000",
            "type": "file",
            "fileName": "notes.txt",
            "fileType": "text/plain",
            "fileSize": 3,
            "fileData": "data:text/plain;base64,aGkh",
            "username": "bob",
            "userId": "u-2",
            "chatId": "c1",
            "timestamp": "2024-01-01T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.kind(), MessageKind::File);
        match &msg.payload {
            Payload::File(file) => assert_eq!(file.file_data, b"hi!"),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(msg.preview(), "📎 notes.txt (3 Bytes)");
    }

    #[test]
    fn test_identity_label_falls_back() {
        let mut who = Identity::new("u-9", "");
        assert_eq!(who.label(), "Anonymous");
        who.email = Some("x@example.com".into());
        assert_eq!(who.label(), "x@example.com");
    }
}
