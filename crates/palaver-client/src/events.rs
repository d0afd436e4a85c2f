use tokio::sync::broadcast;

use palaver_shared::{ConnectionState, ConversationId};

/// Capacity of the state-change feed; slow observers skip ahead.
pub const STATE_FEED_CAPACITY: usize = 128;

/// What changed in the client state. Observers re-read the affected part
/// from the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The message list of a conversation changed.
    Messages(ConversationId),
    /// The conversation directory changed (order, previews, unread, presence).
    Directory,
    /// The contact list changed.
    Contacts,
    /// The typing set of a conversation changed.
    Typing {
        conversation: ConversationId,
        identities: Vec<String>,
    },
    Connection(ConnectionState),
    /// A user-facing notice, e.g. a failed action.
    Notice(String),
}

pub fn emit_change(feed: &broadcast::Sender<StateChange>, change: StateChange) {
    // No subscribers is fine: the state is still current when they attach.
    if feed.send(change).is_err() {
        tracing::trace!("State change dropped, no subscribers");
    }
}
