//! Session persistence
//!
//! A small async key-value trait with in-memory and JSON-file backends, and
//! `SessionStore` which maps a `Session` onto the four persisted keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::to_delta;
use crate::error::StoreError;
use crate::model::{Session, UserProfile};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRY_KEY, USER_KEY];

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Write several entries; backends that persist may do it in one write.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// JSON object on disk, cached in memory, replaced atomically on write
pub struct FileStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. A file that does not
    /// parse is ignored and replaced on the next write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), count = entries.len(), "Opened session file");

        Ok(Self {
            path,
            cache: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!(path = %self.path.display(), "Saved session file");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), value.to_string());
        self.save(&cache).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        if cache.remove(key).is_some() {
            self.save(&cache).await?;
        }
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        for (key, value) in entries {
            cache.insert((*key).to_string(), value.clone());
        }
        self.save(&cache).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        for key in keys {
            cache.remove(*key);
        }
        if cache.len() != before {
            self.save(&cache).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Session record as read back from a store
#[derive(Debug, Clone)]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

impl PersistedSession {
    /// Rebuild a live session. The issue time is not persisted, so it is
    /// derived from the expiry and the configured lifetime.
    pub fn into_session(self, session_duration: Duration) -> Session {
        Session {
            id: Uuid::new_v4(),
            issued_at: self.expires_at - to_delta(session_duration),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            user: self.user,
        }
    }
}

/// Maps sessions onto the persisted keys
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend_name(&self) -> &str {
        self.kv.name()
    }

    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let entries = [
            (ACCESS_TOKEN_KEY, session.access_token.clone()),
            (REFRESH_TOKEN_KEY, session.refresh_token.clone()),
            (TOKEN_EXPIRY_KEY, session.expires_at.to_rfc3339()),
            (USER_KEY, serde_json::to_string(&session.user)?),
        ];
        self.kv.set_many(&entries).await
    }

    /// None unless every key is present.
    pub async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        let access = self.kv.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.kv.get(REFRESH_TOKEN_KEY).await?;
        let expiry = self.kv.get(TOKEN_EXPIRY_KEY).await?;
        let user = self.kv.get(USER_KEY).await?;

        let (Some(access_token), Some(refresh_token), Some(expiry), Some(user)) =
            (access, refresh, expiry, user)
        else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expiry)
            .map_err(|e| StoreError::Corrupt {
                key: TOKEN_EXPIRY_KEY.to_string(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);
        let user: UserProfile = serde_json::from_str(&user).map_err(|e| StoreError::Corrupt {
            key: USER_KEY.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(PersistedSession {
            access_token,
            refresh_token,
            expires_at,
            user,
        }))
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.kv.remove_many(&SESSION_KEYS).await
    }
}
