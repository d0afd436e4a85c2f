use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Message id, generated on the client and preserved through acknowledgments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh, timestamp-based id (UUIDv7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle of the single real-time channel connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Voice,
    File,
}

/// Delivery status of a message.
///
/// Statuses only move forward: `pending → sent → delivered → read`.
/// `failed` shares `pending`'s rank so the two can alternate (disconnect,
/// retry) while any acknowledgment still moves the message forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[serde(alias = "sending")]
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending | Self::Failed => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
        }
    }

    /// Whether moving from `self` to `next` is allowed. Backward moves are
    /// not errors for callers, they are simply dropped.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        next.rank() >= self.rank()
    }

    /// Not yet acknowledged by the backend.
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        use MessageStatus::*;
        assert!(Pending.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Read));
        assert!(Pending.can_transition_to(Read));
        assert!(Read.can_transition_to(Read));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        use MessageStatus::*;
        assert!(!Read.can_transition_to(Sent));
        assert!(!Delivered.can_transition_to(Sent));
        assert!(!Sent.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Failed));
    }

    #[test]
    fn test_failed_is_sibling_of_pending() {
        use MessageStatus::*;
        assert!(Pending.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Sent));
        assert!(!Sent.can_transition_to(Failed));
    }

    #[test]
    fn test_legacy_sending_status_parses_as_pending() {
        let status: MessageStatus = serde_json::from_str("\"sending\"").unwrap();
        assert_eq!(status, MessageStatus::Pending);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }
}
