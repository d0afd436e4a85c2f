//! Per-conversation ordered message log.
//!
//! Insertion order is the order in which messages were observed; status
//! updates never reorder. Lookups of unknown conversations or messages are
//! not errors: they report a miss and leave the store untouched, which is
//! what out-of-order or duplicated channel events need.

use std::collections::HashMap;

use tracing::debug;

use palaver_shared::{ConversationId, Message, MessageId, MessageStatus};

/// Result of [`MessageStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was added to the tail of its conversation.
    Appended,
    /// A message with the same id already exists there; nothing changed.
    Duplicate,
}

/// Result of [`MessageStore::update_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The status moved (or stayed) forward.
    Applied {
        from: MessageStatus,
        to: MessageStatus,
    },
    /// The transition would have moved backward and was dropped.
    Ignored { current: MessageStatus },
    /// No such message in that conversation.
    NotFound,
}

impl StatusUpdate {
    /// Whether the stored status actually changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Applied { from, to } if from != to)
    }
}

#[derive(Debug, Default)]
pub struct MessageStore {
    conversations: HashMap<ConversationId, Vec<Message>>,
    /// Message id → conversation, for events that only carry the message id.
    index: HashMap<MessageId, ConversationId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the tail of its conversation.
    ///
    /// A duplicate id within the same conversation is ignored, so replayed
    /// or echoed events are harmless.
    pub fn append(&mut self, message: Message) -> AppendOutcome {
        let log = self
            .conversations
            .entry(message.conversation_id.clone())
            .or_default();

        if log.iter().any(|m| m.id == message.id) {
            debug!(
                conversation = %message.conversation_id,
                message = %message.id,
                "Ignoring duplicate message"
            );
            return AppendOutcome::Duplicate;
        }

        self.index
            .insert(message.id.clone(), message.conversation_id.clone());
        log.push(message);
        AppendOutcome::Appended
    }

    /// Bulk-load messages for a conversation, keeping the given order.
    ///
    /// Returns how many were new.
    pub fn load(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for message in messages {
            if self.append(message) == AppendOutcome::Appended {
                added += 1;
            }
        }
        added
    }

    /// Move a message's status forward. Backward moves are dropped.
    pub fn update_status(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        new_status: MessageStatus,
    ) -> StatusUpdate {
        let Some(message) = self.get_mut(conversation_id, message_id) else {
            return StatusUpdate::NotFound;
        };

        let current = message.status;
        if !current.can_transition_to(new_status) {
            debug!(
                conversation = %conversation_id,
                message = %message_id,
                current = ?current,
                rejected = ?new_status,
                "Dropping backward status transition"
            );
            return StatusUpdate::Ignored { current };
        }

        message.status = new_status;
        StatusUpdate::Applied {
            from: current,
            to: new_status,
        }
    }

    /// Delete a message. Deleting an absent message is a no-op.
    pub fn remove(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Option<Message> {
        let log = self.conversations.get_mut(conversation_id)?;
        let position = log.iter().position(|m| &m.id == message_id)?;

        if self.index.get(message_id) == Some(conversation_id) {
            self.index.remove(message_id);
        }
        Some(log.remove(position))
    }

    /// Ordered messages of a conversation; empty for unknown conversations.
    pub fn list(&self, conversation_id: &ConversationId) -> &[Message] {
        self.conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, conversation_id: &ConversationId, message_id: &MessageId) -> Option<&Message> {
        self.conversations
            .get(conversation_id)?
            .iter()
            .find(|m| &m.id == message_id)
    }

    fn get_mut(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Option<&mut Message> {
        self.conversations
            .get_mut(conversation_id)?
            .iter_mut()
            .find(|m| &m.id == message_id)
    }

    /// Find the conversation holding a message.
    pub fn locate(&self, message_id: &MessageId) -> Option<&ConversationId> {
        self.index.get(message_id)
    }

    pub fn contains(&self, conversation_id: &ConversationId, message_id: &MessageId) -> bool {
        self.get(conversation_id, message_id).is_some()
    }

    /// Total number of messages across all conversations.
    pub fn message_count(&self) -> usize {
        self.conversations.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_shared::{Identity, Payload};

    fn msg(conversation: &str, text: &str) -> Message {
        Message::outgoing(
            ConversationId::from(conversation),
            &Identity::new("u1", "alice"),
            Payload::text(text),
        )
    }

    fn texts(store: &MessageStore, conversation: &str) -> Vec<String> {
        store
            .list(&ConversationId::from(conversation))
            .iter()
            .filter_map(|m| m.text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_append_preserves_call_order() {
        let mut store = MessageStore::new();
        for text in ["one", "two", "three", "four"] {
            assert_eq!(store.append(msg("c1", text)), AppendOutcome::Appended);
        }
        store.append(msg("c2", "elsewhere"));

        assert_eq!(texts(&store, "c1"), ["one", "two", "three", "four"]);
        assert_eq!(texts(&store, "c2"), ["elsewhere"]);
    }

    #[test]
    fn test_duplicate_append_ignored() {
        let mut store = MessageStore::new();
        let first = msg("c1", "hi");
        let mut replay = first.clone();
        replay.payload = Payload::text("changed");

        store.append(first);
        assert_eq!(store.append(replay), AppendOutcome::Duplicate);
        assert_eq!(texts(&store, "c1"), ["hi"]);
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut store = MessageStore::new();
        let m = msg("c1", "hi");
        let (c, id) = (m.conversation_id.clone(), m.id.clone());
        store.append(m);

        assert!(store.update_status(&c, &id, MessageStatus::Read).changed());
        for stale in [
            MessageStatus::Pending,
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Failed,
        ] {
            assert_eq!(
                store.update_status(&c, &id, stale),
                StatusUpdate::Ignored {
                    current: MessageStatus::Read
                }
            );
        }
        assert_eq!(store.get(&c, &id).unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn test_status_update_does_not_reorder() {
        let mut store = MessageStore::new();
        let first = msg("c1", "first");
        let c = first.conversation_id.clone();
        let first_id = first.id.clone();
        store.append(first);
        store.append(msg("c1", "second"));

        store.update_status(&c, &first_id, MessageStatus::Delivered);
        assert_eq!(texts(&store, "c1"), ["first", "second"]);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut store = MessageStore::new();
        store.append(msg("c1", "hi"));
        let c = ConversationId::from("c1");
        let missing = MessageId::from("nope");

        assert_eq!(
            store.update_status(&c, &missing, MessageStatus::Read),
            StatusUpdate::NotFound
        );
        assert_eq!(
            store.update_status(&ConversationId::from("zz"), &missing, MessageStatus::Read),
            StatusUpdate::NotFound
        );
        assert!(store.remove(&c, &missing).is_none());
        assert_eq!(texts(&store, "c1"), ["hi"]);
        assert_eq!(store.list(&c)[0].status, MessageStatus::Pending);
    }

    #[test]
    fn test_remove_twice() {
        let mut store = MessageStore::new();
        let m = msg("c1", "bye");
        let (c, id) = (m.conversation_id.clone(), m.id.clone());
        store.append(m);

        assert!(store.remove(&c, &id).is_some());
        assert!(store.remove(&c, &id).is_none());
        assert!(store.list(&c).is_empty());
        assert!(store.locate(&id).is_none());
    }

    #[test]
    fn test_unknown_conversation_lists_empty() {
        let store = MessageStore::new();
        assert!(store.list(&ConversationId::from("ghost")).is_empty());
    }

    #[test]
    fn test_load_keeps_server_order_and_skips_known() {
        let mut store = MessageStore::new();
        let a = msg("c1", "a");
        let b = msg("c1", "b");
        store.append(b.clone());

        let added = store.load(vec![a, b, msg("c1", "c")]);
        assert_eq!(added, 2);
        assert_eq!(texts(&store, "c1"), ["b", "a", "c"]);
        assert_eq!(store.message_count(), 3);
    }
}
