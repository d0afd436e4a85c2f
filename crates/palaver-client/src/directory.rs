//! Ordered conversation summaries, most recently touched first.
//!
//! The list is synchronized against the backend; when that is not possible
//! (no credential, backend down) a fixed sample set is shown instead and the
//! caller is told so through [`RefreshOutcome::using_fallback`].

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use palaver_net::Backend;
use palaver_shared::{Conversation, ConversationId, SyncError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub using_fallback: bool,
    pub count: usize,
}

#[derive(Debug, Default)]
pub struct ConversationDirectory {
    conversations: Vec<Conversation>,
    using_fallback: bool,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the conversation list and replace local state with it.
    ///
    /// Never fails: any error installs the sample conversations.
    pub async fn refresh(&mut self, backend: &dyn Backend) -> RefreshOutcome {
        let result = fetch(backend).await;
        self.apply_refresh(result)
    }

    /// Install the result of a conversation list fetch.
    pub fn apply_refresh(&mut self, result: Result<Vec<Conversation>, SyncError>) -> RefreshOutcome {
        match result {
            Ok(mut conversations) => {
                conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
                dedup_by_id(&mut conversations);
                info!(count = conversations.len(), "Conversation list refreshed");
                self.conversations = conversations;
                self.using_fallback = false;
            }
            Err(e) => {
                warn!(error = %e, "Conversation list unavailable, showing sample conversations");
                self.conversations = sample_conversations(Utc::now());
                self.using_fallback = true;
            }
        }
        RefreshOutcome {
            using_fallback: self.using_fallback,
            count: self.conversations.len(),
        }
    }

    /// Create a private conversation and put it at the front.
    pub async fn create(
        &mut self,
        backend: &dyn Backend,
        participant: &UserId,
    ) -> Result<Conversation, SyncError> {
        if !backend.has_credential() {
            return Err(SyncError::Unauthenticated);
        }
        let conversation = backend.create_conversation(participant).await?;
        self.insert_front(conversation.clone());
        Ok(conversation)
    }

    /// Insert (or replace) a conversation at the front.
    pub fn insert_front(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        debug!(conversation = %conversation.id, "Conversation added");
        self.conversations.insert(0, conversation);
    }

    /// Update a conversation's preview and move it to the front. Unknown ids
    /// are ignored. Returns whether anything changed.
    pub fn touch(
        &mut self,
        id: &ConversationId,
        preview: impl Into<String>,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        let mut conversation = self.conversations.remove(position);
        conversation.last_message_preview = preview.into();
        conversation.last_message_at = Some(at);
        self.conversations.insert(0, conversation);
        true
    }

    pub fn clear_unread(&mut self, id: &ConversationId) -> bool {
        match self.get_mut(id) {
            Some(c) if c.unread_count != 0 => {
                c.unread_count = 0;
                true
            }
            _ => false,
        }
    }

    pub fn increment_unread(&mut self, id: &ConversationId) -> bool {
        match self.get_mut(id) {
            Some(c) => {
                c.unread_count = c.unread_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn set_peer_online(&mut self, id: &ConversationId, online: bool) -> bool {
        match self.get_mut(id) {
            Some(c) if c.peer_online != online => {
                c.peer_online = online;
                true
            }
            _ => false,
        }
    }

    /// Conversations whose name or preview contains `query`,
    /// case-insensitively, in directory order. An empty query matches all.
    pub fn filter(&self, query: &str) -> Vec<&Conversation> {
        let needle = query.trim().to_lowercase();
        self.conversations
            .iter()
            .filter(|c| {
                needle.is_empty()
                    || c.display_name.to_lowercase().contains(&needle)
                    || c.last_message_preview.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn using_fallback(&self) -> bool {
        self.using_fallback
    }

    fn get_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    fn position(&self, id: &ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| &c.id == id)
    }
}

/// Fetch the conversation list, failing fast without a credential.
pub async fn fetch(backend: &dyn Backend) -> Result<Vec<Conversation>, SyncError> {
    if !backend.has_credential() {
        return Err(SyncError::Unauthenticated);
    }
    backend.list_conversations().await
}

fn dedup_by_id(conversations: &mut Vec<Conversation>) {
    let mut seen = std::collections::HashSet::new();
    conversations.retain(|c| seen.insert(c.id.clone()));
}

/// Built-in demo conversations shown when the backend list is unavailable.
pub fn sample_conversations(now: DateTime<Utc>) -> Vec<Conversation> {
    vec![
        Conversation {
            id: ConversationId::from("1"),
            display_name: "John Doe".into(),
            last_message_preview: "Hey, how are you?".into(),
            last_message_at: Some(now - Duration::minutes(5)),
            unread_count: 2,
            peer_online: true,
            avatar_ref: None,
        },
        Conversation {
            id: ConversationId::from("2"),
            display_name: "Jane Smith".into(),
            last_message_preview: "Meeting at 3 PM".into(),
            last_message_at: Some(now - Duration::minutes(10)),
            unread_count: 0,
            peer_online: false,
            avatar_ref: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_shared::Identity;

    struct StubBackend {
        credential: bool,
        list: Result<Vec<Conversation>, SyncError>,
    }

    #[async_trait]
    impl Backend for StubBackend {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn list_conversations(&self) -> Result<Vec<Conversation>, SyncError> {
            self.list.clone()
        }

        async fn create_conversation(&self, participant: &UserId) -> Result<Conversation, SyncError> {
            Ok(conversation(&format!("new-{participant}"), None))
        }

        async fn search_users(&self, _query: &str) -> Result<Vec<Identity>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn conversation(id: &str, minutes_ago: Option<i64>) -> Conversation {
        Conversation {
            id: ConversationId::from(id),
            display_name: format!("Chat {id}"),
            last_message_preview: String::new(),
            last_message_at: minutes_ago.map(|m| Utc::now() - Duration::minutes(m)),
            unread_count: 0,
            peer_online: false,
            avatar_ref: None,
        }
    }

    fn ids(dir: &ConversationDirectory) -> Vec<&str> {
        dir.list().iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_refresh_without_credential_uses_samples() {
        let backend = StubBackend {
            credential: false,
            list: Ok(vec![conversation("x", Some(1))]),
        };
        let mut dir = ConversationDirectory::new();
        let outcome = dir.refresh(&backend).await;

        assert!(outcome.using_fallback);
        assert_eq!(ids(&dir), ["1", "2"]);
        assert_eq!(dir.list()[0].display_name, "John Doe");
        assert_eq!(dir.list()[0].unread_count, 2);
    }

    #[tokio::test]
    async fn test_refresh_error_uses_samples() {
        let backend = StubBackend {
            credential: true,
            list: Err(SyncError::remote(Some(500), "boom")),
        };
        let mut dir = ConversationDirectory::new();
        assert!(dir.refresh(&backend).await.using_fallback);
        assert!(dir.using_fallback());
    }

    #[tokio::test]
    async fn test_refresh_replaces_and_sorts() {
        let mut dir = ConversationDirectory::new();
        dir.insert_front(conversation("stale", Some(0)));

        let backend = StubBackend {
            credential: true,
            list: Ok(vec![
                conversation("old", Some(60)),
                conversation("never", None),
                conversation("new", Some(1)),
            ]),
        };
        let outcome = dir.refresh(&backend).await;

        assert!(!outcome.using_fallback);
        assert_eq!(outcome.count, 3);
        assert_eq!(ids(&dir), ["new", "old", "never"]);
    }

    #[tokio::test]
    async fn test_create_requires_credential() {
        let mut dir = ConversationDirectory::new();
        let anonymous = StubBackend {
            credential: false,
            list: Ok(Vec::new()),
        };
        assert_eq!(
            dir.create(&anonymous, &UserId::from("3")).await,
            Err(SyncError::Unauthenticated)
        );
        assert!(dir.list().is_empty());

        let backend = StubBackend {
            credential: true,
            list: Ok(Vec::new()),
        };
        dir.insert_front(conversation("a", Some(1)));
        let created = dir.create(&backend, &UserId::from("3")).await.unwrap();
        assert_eq!(created.id.as_str(), "new-3");
        assert_eq!(ids(&dir), ["new-3", "a"]);
    }

    #[test]
    fn test_touch_moves_to_front() {
        let mut dir = ConversationDirectory::new();
        dir.apply_refresh(Ok(vec![
            conversation("a", Some(1)),
            conversation("b", Some(2)),
            conversation("c", Some(3)),
        ]));

        let now = Utc::now();
        assert!(dir.touch(&ConversationId::from("c"), "latest", now));
        assert_eq!(ids(&dir), ["c", "a", "b"]);
        assert_eq!(dir.list()[0].last_message_preview, "latest");
        assert_eq!(dir.list()[0].last_message_at, Some(now));

        assert!(!dir.touch(&ConversationId::from("zz"), "ignored", now));
        assert_eq!(ids(&dir), ["c", "a", "b"]);
    }

    #[test]
    fn test_unread_counters() {
        let mut dir = ConversationDirectory::new();
        dir.apply_refresh(Err(SyncError::Unauthenticated));
        let john = ConversationId::from("1");

        assert!(dir.increment_unread(&john));
        assert_eq!(dir.get(&john).unwrap().unread_count, 3);
        assert!(dir.clear_unread(&john));
        assert!(!dir.clear_unread(&john));
        assert!(!dir.clear_unread(&ConversationId::from("zz")));
        assert!(!dir.increment_unread(&ConversationId::from("zz")));
    }

    #[test]
    fn test_filter_matches_name_or_preview() {
        let mut dir = ConversationDirectory::new();
        dir.apply_refresh(Err(SyncError::Unauthenticated));

        let names = |q: &str| -> Vec<String> {
            dir.filter(q).iter().map(|c| c.display_name.clone()).collect()
        };
        assert_eq!(names("jane"), ["Jane Smith"]);
        assert_eq!(names("HOW ARE"), ["John Doe"]);
        assert_eq!(names(""), ["John Doe", "Jane Smith"]);
        assert!(names("nobody").is_empty());
    }

    #[test]
    fn test_presence_flag() {
        let mut dir = ConversationDirectory::new();
        dir.apply_refresh(Err(SyncError::Unauthenticated));
        let jane = ConversationId::from("2");

        assert!(dir.set_peer_online(&jane, true));
        assert!(!dir.set_peer_online(&jane, true));
        assert!(dir.get(&jane).unwrap().peer_online);
    }
}
