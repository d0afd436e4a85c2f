//! Typing presence tracking.
//!
//! Keeps, per conversation, the identities currently typing together with
//! an expiry. Entries disappear on an explicit stop event or once they go
//! stale, so a dropped stop event cannot leave an indicator stuck forever.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use palaver_shared::ConversationId;

#[derive(Debug, Clone)]
struct TypingEntry {
    identity: String,
    expires_at: Instant,
}

/// Tracks who is typing in each conversation.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    /// Entries are kept in first-marked order for stable display text.
    typing: HashMap<ConversationId, Vec<TypingEntry>>,
    expiry: Duration,
}

impl PresenceTracker {
    /// Create a tracker whose entries expire after `expiry` without refresh.
    pub fn new(expiry: Duration) -> Self {
        Self {
            typing: HashMap::new(),
            expiry,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Mark `identity` as typing in a conversation, or refresh its expiry if
    /// it already is. Returns `true` when the identity was newly added.
    pub fn mark_typing(
        &mut self,
        conversation_id: &ConversationId,
        identity: &str,
        now: Instant,
    ) -> bool {
        let expires_at = now + self.expiry;
        let entries = self.typing.entry(conversation_id.clone()).or_default();
        entries.retain(|e| e.expires_at > now || e.identity == identity);

        if let Some(entry) = entries.iter_mut().find(|e| e.identity == identity) {
            entry.expires_at = expires_at;
            return false;
        }

        debug!(conversation = %conversation_id, identity, "Typing started");
        entries.push(TypingEntry {
            identity: identity.to_string(),
            expires_at,
        });
        true
    }

    /// Remove `identity` from a conversation's typing set. Returns `true` if
    /// it was present.
    pub fn clear_typing(&mut self, conversation_id: &ConversationId, identity: &str) -> bool {
        let Some(entries) = self.typing.get_mut(conversation_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.identity != identity);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.typing.remove(conversation_id);
        }
        if removed {
            debug!(conversation = %conversation_id, identity, "Typing stopped");
        }
        removed
    }

    /// Identities currently typing in a conversation, in first-marked order.
    pub fn typing(&self, conversation_id: &ConversationId, now: Instant) -> Vec<String> {
        self.typing
            .get(conversation_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.expires_at > now)
                    .map(|e| e.identity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every stale entry. Returns the conversations whose typing set
    /// changed.
    pub fn sweep(&mut self, now: Instant) -> Vec<ConversationId> {
        let mut changed = Vec::new();
        self.typing.retain(|conversation_id, entries| {
            let before = entries.len();
            entries.retain(|e| e.expires_at > now);
            if entries.len() != before {
                changed.push(conversation_id.clone());
            }
            !entries.is_empty()
        });
        changed
    }

    /// Forget every typing indicator (e.g. after the channel dropped).
    pub fn clear_all(&mut self) -> Vec<ConversationId> {
        self.typing.drain().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRY: Duration = Duration::from_secs(5);

    fn chat() -> ConversationId {
        ConversationId::from("c1")
    }

    #[test]
    fn test_mark_twice_reports_once() {
        let mut tracker = PresenceTracker::new(EXPIRY);
        let now = Instant::now();

        assert!(tracker.mark_typing(&chat(), "alice", now));
        assert!(!tracker.mark_typing(&chat(), "alice", now));
        assert_eq!(tracker.typing(&chat(), now), ["alice"]);
    }

    #[test]
    fn test_first_marked_order() {
        let mut tracker = PresenceTracker::new(EXPIRY);
        let now = Instant::now();

        tracker.mark_typing(&chat(), "carol", now);
        tracker.mark_typing(&chat(), "alice", now);
        tracker.mark_typing(&chat(), "carol", now + Duration::from_secs(1));
        assert_eq!(tracker.typing(&chat(), now), ["carol", "alice"]);
    }

    #[test]
    fn test_clear_typing() {
        let mut tracker = PresenceTracker::new(EXPIRY);
        let now = Instant::now();

        tracker.mark_typing(&chat(), "alice", now);
        assert!(tracker.clear_typing(&chat(), "alice"));
        assert!(!tracker.clear_typing(&chat(), "alice"));
        assert!(!tracker.clear_typing(&ConversationId::from("other"), "alice"));
        assert!(tracker.typing(&chat(), now).is_empty());
    }

    #[test]
    fn test_entries_expire_without_stop_event() {
        let mut tracker = PresenceTracker::new(EXPIRY);
        let now = Instant::now();

        tracker.mark_typing(&chat(), "alice", now);
        tracker.mark_typing(&chat(), "bob", now + Duration::from_secs(3));

        let later = now + Duration::from_secs(6);
        assert_eq!(tracker.typing(&chat(), later), ["bob"]);
        assert_eq!(tracker.sweep(later), vec![chat()]);
        assert!(tracker.sweep(later).is_empty());

        let much_later = now + Duration::from_secs(20);
        assert_eq!(tracker.sweep(much_later), vec![chat()]);
        assert!(tracker.typing(&chat(), much_later).is_empty());
    }

    #[test]
    fn test_refresh_extends_expiry() {
        let mut tracker = PresenceTracker::new(EXPIRY);
        let now = Instant::now();

        tracker.mark_typing(&chat(), "alice", now);
        tracker.mark_typing(&chat(), "alice", now + Duration::from_secs(4));
        assert_eq!(
            tracker.typing(&chat(), now + Duration::from_secs(7)),
            ["alice"]
        );
    }

    #[test]
    fn test_conversations_are_independent() {
        let mut tracker = PresenceTracker::new(EXPIRY);
        let now = Instant::now();
        let other = ConversationId::from("c2");

        tracker.mark_typing(&chat(), "alice", now);
        tracker.mark_typing(&other, "bob", now);
        assert_eq!(tracker.typing(&chat(), now), ["alice"]);
        assert_eq!(tracker.typing(&other, now), ["bob"]);

        let mut cleared = tracker.clear_all();
        cleared.sort();
        assert_eq!(cleared, vec![chat(), other]);
    }
}
