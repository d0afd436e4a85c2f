//! Explicit session context held by the coordinator.
//!
//! Everything the client needs to know about "who am I, what is selected"
//! lives here instead of in ambient globals. [`Preferences`] carries the
//! remembered theme and status text.

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use palaver_net::Credential;
use palaver_shared::constants::DEFAULT_STATUS_TEXT;
use palaver_shared::{ConversationId, Identity, MessageId};
use palaver_store::{KeyValueStore, Result};

/// Keys of the remembered values in the key/value store.
pub mod keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const USER_INFO: &str = "userInfo";
    pub const DARK_MODE: &str = "darkMode";
    pub const USER_STATUS: &str = "userStatus";
}

/// Reply target captured when the user starts a reply.
///
/// The snippet is a copy: later edits or deletion of the original do not
/// affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    pub message_id: MessageId,
    pub snippet: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: Identity,
    pub credential: Option<Credential>,
    pub active_conversation: Option<ConversationId>,
    pub reply_context: Option<ReplyContext>,
}

impl Session {
    pub fn new(user: Identity, credential: Option<Credential>) -> Self {
        Self {
            user,
            credential,
            active_conversation: None,
            reply_context: None,
        }
    }

    /// Restore the session from remembered values.
    ///
    /// A missing or unreadable profile yields a generated guest identity.
    pub fn load<K: KeyValueStore>(kv: &K) -> Result<Self> {
        let credential = kv
            .get(keys::AUTH_TOKEN)?
            .filter(|t| !t.is_empty())
            .map(Credential::new);

        let user = match kv.get_json::<Identity>(keys::USER_INFO) {
            Ok(Some(user)) => user,
            Ok(None) => guest_identity(),
            Err(e) => {
                warn!(error = %e, "Remembered profile unreadable, using a guest identity");
                guest_identity()
            }
        };

        info!(
            user = %user.id,
            authenticated = credential.is_some(),
            "Session loaded"
        );
        Ok(Self::new(user, credential))
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Remember a credential (and optionally the profile that came with it).
    pub fn login<K: KeyValueStore>(
        &mut self,
        kv: &K,
        credential: Credential,
        profile: Option<Identity>,
    ) -> Result<()> {
        kv.set(keys::AUTH_TOKEN, credential.expose())?;
        if let Some(profile) = profile {
            kv.set_json(keys::USER_INFO, &profile)?;
            self.user = profile;
        }
        self.credential = Some(credential);
        Ok(())
    }

    /// Forget the credential and profile.
    pub fn logout<K: KeyValueStore>(&mut self, kv: &K) -> Result<()> {
        kv.remove(keys::AUTH_TOKEN)?;
        kv.remove(keys::USER_INFO)?;
        self.credential = None;
        self.active_conversation = None;
        self.reply_context = None;
        Ok(())
    }
}

/// `User<n>` with a timestamp id, used when no profile is remembered.
pub fn guest_identity() -> Identity {
    let n: u32 = rand::thread_rng().gen_range(0..1000);
    let id = Utc::now().timestamp_millis().to_string();
    debug!(%id, "Generated guest identity");
    Identity::new(id, format!("User{n}"))
}

/// Remembered user preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub dark_mode: bool,
    pub status_text: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            status_text: DEFAULT_STATUS_TEXT.to_string(),
        }
    }
}

impl Preferences {
    pub fn load<K: KeyValueStore>(kv: &K) -> Result<Self> {
        let mut prefs = Self::default();
        if let Some(raw) = kv.get(keys::DARK_MODE)? {
            prefs.dark_mode = raw == "true";
        }
        if let Some(status) = kv.get(keys::USER_STATUS)?.filter(|s| !s.is_empty()) {
            prefs.status_text = status;
        }
        Ok(prefs)
    }

    pub fn save<K: KeyValueStore>(&self, kv: &K) -> Result<()> {
        kv.set(keys::DARK_MODE, if self.dark_mode { "true" } else { "false" })?;
        kv.set(keys::USER_STATUS, &self.status_text)
    }

    /// Flip the theme and persist it. Returns the new value.
    pub fn toggle_dark_mode<K: KeyValueStore>(&mut self, kv: &K) -> Result<bool> {
        self.dark_mode = !self.dark_mode;
        self.save(kv)?;
        Ok(self.dark_mode)
    }

    pub fn set_status<K: KeyValueStore>(&mut self, kv: &K, status: impl Into<String>) -> Result<()> {
        self.status_text = status.into();
        self.save(kv)
    }
}
