//! Durable key/value capability.
//!
//! The core only needs a handful of remembered strings (credential, user
//! profile, theme, status text). [`KeyValueStore`] abstracts where they live;
//! [`crate::SqliteKv`] persists them on disk and [`MemoryKv`] keeps them in
//! memory for tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Read a JSON-encoded value.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Store a value as JSON.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.set(key, &serde_json::to_string(value)?)
    }
}

/// In-memory key/value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    #[test]
    fn test_memory_roundtrip() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("token").unwrap(), None);

        kv.set("token", "abc").unwrap();
        assert_eq!(kv.get("token").unwrap().as_deref(), Some("abc"));

        kv.remove("token").unwrap();
        kv.remove("token").unwrap();
        assert_eq!(kv.get("token").unwrap(), None);
    }

    #[test]
    fn test_json_values() {
        let kv = MemoryKv::new();
        kv.set_json("profile", &Profile { name: "alice".into() }).unwrap();
        let loaded: Option<Profile> = kv.get_json("profile").unwrap();
        assert_eq!(loaded, Some(Profile { name: "alice".into() }));

        kv.set("broken", "{not json").unwrap();
        assert!(kv.get_json::<Profile>("broken").is_err());
    }
}
