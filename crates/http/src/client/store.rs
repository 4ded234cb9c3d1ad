//! Client-side persistent key-value storage for session state
//!
//! Mirrors browser local storage: string keys, string values, synchronous
//! access. Credentials live under [`ACCESS_TOKEN_KEY`] and
//! [`REFRESH_TOKEN_KEY`]; anything else the application caches shares the
//! same store and is discarded with it on logout.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Session storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value storage backing the session
pub trait SessionStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Delete every value
    fn clear(&self) -> Result<(), StoreError>;
}

fn lock(entries: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with credentials
    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let mut entries = HashMap::new();
        if let Some(access) = access {
            entries.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
        }
        if let Some(refresh) = refresh {
            entries.insert(REFRESH_TOKEN_KEY.to_string(), refresh.to_string());
        }
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        lock(&self.entries).clear();
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::{SessionStore, StoreError, lock};
    use directories::ProjectDirs;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tracing::{debug, warn};

    /// Store persisted as a JSON object on disk
    ///
    /// The whole map is rewritten on every change. On Unix the file is
    /// readable by its owner only.
    #[derive(Debug)]
    pub struct FileStore {
        path: PathBuf,
        entries: Mutex<HashMap<String, String>>,
    }

    impl FileStore {
        /// Open the store at `path`, loading existing entries if the file exists
        pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
            let path = path.into();
            let entries = if path.exists() {
                debug!("Loading session from {}", path.display());
                let raw = std::fs::read_to_string(&path)?;
                if raw.trim().is_empty() {
                    HashMap::new()
                } else {
                    serde_json::from_str(&raw)?
                }
            } else {
                HashMap::new()
            };

            Ok(Self {
                path,
                entries: Mutex::new(entries),
            })
        }

        /// Default location: `session.json` in the platform data directory
        pub fn default_path() -> Option<PathBuf> {
            ProjectDirs::from("app", "Fitmarket", "fitmarket")
                .map(|dirs| dirs.data_dir().join("session.json"))
        }

        /// Path of the backing file
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let serialized = serde_json::to_string_pretty(entries)?;
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, serialized)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
            }

            std::fs::rename(&tmp, &self.path)?;
            Ok(())
        }
    }

    impl SessionStore for FileStore {
        fn get(&self, key: &str) -> Option<String> {
            lock(&self.entries).get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let mut entries = lock(&self.entries);
            entries.insert(key.to_string(), value.to_string());
            self.persist(&entries)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            let mut entries = lock(&self.entries);
            if entries.remove(key).is_some() {
                self.persist(&entries)?;
            }
            Ok(())
        }

        fn clear(&self) -> Result<(), StoreError> {
            lock(&self.entries).clear();
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => {
                    warn!("Failed to remove session file {}: {e}", self.path.display());
                    Err(e.into())
                }
            }
        }
    }
}
