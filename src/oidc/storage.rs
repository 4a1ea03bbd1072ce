//! Persisted session storage
//!
//! Key/value stores for the signed-in user and pending sign-in states. The
//! file-backed store is what lets a callback processed by a fresh process
//! find the state written before the login redirect.

use crate::config::StorageKind;
use crate::error::{DemoError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

const STORAGE_DIR_NAME: &str = ".keycloak-oidc-demo";
const SESSION_DIR_NAME: &str = "keycloak-oidc-demo";

/// Synchronous string store, modeled on browser web storage
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove a key, returning the previous value
    fn remove(&self, key: &str) -> Result<Option<String>>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// One JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store for the given storage kind
    ///
    /// Returns: ~/.keycloak-oidc-demo/local for [`StorageKind::Local`]
    ///          <temp dir>/keycloak-oidc-demo/session for [`StorageKind::Session`]
    pub fn for_kind(kind: StorageKind) -> Result<Self> {
        match kind {
            StorageKind::Local => {
                let home = std::env::var("HOME")
                    .or_else(|_| std::env::var("USERPROFILE"))
                    .map_err(|_| {
                        DemoError::Storage("Cannot determine home directory".to_string())
                    })?;
                Self::new(PathBuf::from(home).join(STORAGE_DIR_NAME).join("local"))
            }
            StorageKind::Session => {
                Self::new(std::env::temp_dir().join(SESSION_DIR_NAME).join("session"))
            }
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Map a storage key to a filename
    ///
    /// Example: oidc.user:http://localhost:8180/realms/demo:react-client
    ///          -> oidc.user_http___localhost_8180_realms_demo_react-client.json
    fn file_name(key: &str) -> String {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}.json", sanitized)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }
}

/// On-disk record; the original key is kept since filenames are lossy
#[derive(serde::Serialize, serde::Deserialize)]
struct Entry {
    key: String,
    value: String,
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)?;
        let entry: Entry = serde_json::from_str(&contents)?;
        Ok(Some(entry.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let entry = Entry {
            key: key.to_string(),
            value: value.to_string(),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&entry)?)?;

        tracing::debug!("Stored {} at {:?}", key, path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<String>> {
        let previous = self.get(key)?;
        if previous.is_some() {
            let path = self.path_for(key);
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed {} from {:?}", key, path);
        }
        Ok(previous)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Entry>(&contents) {
                Ok(entry) => keys.push(entry.key),
                Err(e) => tracing::warn!("Skipping unreadable entry {:?}: {}", path, e),
            }
        }
        Ok(keys)
    }
}

/// Process-local store, used by tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_sanitizing() {
        assert_eq!(
            FileStore::file_name("oidc.user:http://localhost:8180/realms/demo:react-client"),
            "oidc.user_http___localhost_8180_realms_demo_react-client.json"
        );
        assert_eq!(FileStore::file_name("oidc.abc123"), "oidc.abc123.json");
    }

    #[test]
    fn test_file_store_keeps_original_keys() {
        let dir = std::env::temp_dir().join(format!(
            "keycloak-oidc-demo-test-{}",
            crate::oidc::pkce::random_string(12)
        ));
        let store = FileStore::new(&dir).unwrap();

        let key = "oidc.user:https://idp/realms/demo:client";
        store.set(key, r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(
            store.get(key).unwrap().as_deref(),
            Some(r#"{"access_token":"abc"}"#)
        );
        assert_eq!(store.keys().unwrap(), vec![key.to_string()]);

        assert!(store.remove(key).unwrap().is_some());
        assert!(store.get(key).unwrap().is_none());
        assert!(store.remove(key).unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.get("missing").unwrap().is_none());

        store.set("oidc.state", "value").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["oidc.state".to_string()]);
        assert_eq!(store.remove("oidc.state").unwrap().as_deref(), Some("value"));
        assert!(store.keys().unwrap().is_empty());
    }
}
