//! Known people the user can start a conversation with.

use tracing::warn;

use palaver_net::Backend;
use palaver_shared::{Identity, SyncError};

#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: Vec<Identity>,
    using_fallback: bool,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search the backend for users matching `query` (empty lists everyone).
    /// Falls back to the sample contacts when that is not possible.
    pub async fn refresh(&mut self, backend: &dyn Backend, query: &str) -> bool {
        let result = search(backend, query).await;
        self.apply(result)
    }

    /// Install a search result. Returns `true` when the sample contacts are
    /// in use.
    pub fn apply(&mut self, result: Result<Vec<Identity>, SyncError>) -> bool {
        match result {
            Ok(contacts) => {
                self.contacts = contacts;
                self.using_fallback = false;
            }
            Err(e) => {
                warn!(error = %e, "Contact search unavailable, showing sample contacts");
                self.contacts = sample_contacts();
                self.using_fallback = true;
            }
        }
        self.using_fallback
    }

    pub fn list(&self) -> &[Identity] {
        &self.contacts
    }

    pub fn using_fallback(&self) -> bool {
        self.using_fallback
    }
}

pub async fn search(backend: &dyn Backend, query: &str) -> Result<Vec<Identity>, SyncError> {
    if !backend.has_credential() {
        return Err(SyncError::Unauthenticated);
    }
    backend.search_users(query).await
}

pub fn sample_contacts() -> Vec<Identity> {
    [
        ("1", "John Doe", "+1234567890"),
        ("2", "Jane Smith", "+0987654321"),
        ("3", "Mike Johnson", "+1122334455"),
    ]
    .into_iter()
    .map(|(id, name, mobile)| Identity {
        mobile: Some(mobile.to_string()),
        ..Identity::new(id, name)
    })
    .collect()
}
