use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::PersistedState;

pub const STATE_KEY: &str = "headline_state_v1";
pub const CREDENTIAL_KEY: &str = "headline_newsapi_key_v1";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// String-valued key-value storage that outlives the process.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)?;
        }

        let conn = Connection::open(data_dir.join("headline.db"))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Unavailable)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Ephemeral store used when nothing durable can be opened.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Unavailable)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Unavailable)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Unavailable)?;
        values.remove(key);
        Ok(())
    }
}

/// Typed access to the headline record and the credential.
///
/// Every store failure is logged and swallowed. The credential is cached after
/// the first read so a session keeps working when writes stop reaching disk.
pub struct HeadlinePersistence<S: KeyValueStore> {
    store: S,
    credential: Option<Option<String>>,
}

impl<S: KeyValueStore> HeadlinePersistence<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            credential: None,
        }
    }

    pub fn load_state(&self) -> PersistedState {
        let raw = match self.store.get(STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return PersistedState::default(),
            Err(e) => {
                warn!("Failed to read headline state, using defaults: {}", e);
                return PersistedState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Stored headline state is corrupt, using defaults: {}", e);
                PersistedState::default()
            }
        }
    }

    pub fn save_state(&self, state: &PersistedState) {
        let raw = match serde_json::to_string(state) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode headline state: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(STATE_KEY, &raw) {
            warn!("Failed to persist headline state: {}", e);
        }
    }

    pub fn credential(&mut self) -> Option<String> {
        if let Some(cached) = &self.credential {
            return cached.clone();
        }

        let loaded = match self.store.get(CREDENTIAL_KEY) {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read credential: {}", e);
                None
            }
        };
        self.credential = Some(loaded.clone());
        loaded
    }

    pub fn set_credential(&mut self, value: &str) {
        self.credential = Some(Some(value.to_string()));
        if let Err(e) = self.store.set(CREDENTIAL_KEY, value) {
            warn!("Failed to persist credential, keeping it for this session: {}", e);
        } else {
            debug!("Credential stored");
        }
    }

    pub fn clear_credential(&mut self) {
        self.credential = Some(None);
        if let Err(e) = self.store.remove(CREDENTIAL_KEY) {
            warn!("Failed to remove stored credential: {}", e);
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::HourKey;
    use chrono::{TimeZone, Utc};

    /// Store whose every call fails, like storage disabled by the host.
    pub(crate) struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }
    }

    fn sample_state() -> PersistedState {
        let fetched = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
        PersistedState {
            last_hour_key: Some(HourKey::from_time(&fetched)),
            dismissed_hour_key: None,
            headline: Some("Rain expected".to_string()),
            source: Some("BBC News".to_string()),
            url: Some("https://example.com/rain".to_string()),
            fetched_at: Some(fetched),
        }
    }

    #[test]
    fn sqlite_store_set_get_remove() {
        let store = SqliteStore::open_in_memory().expect("db");
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().join("nested");

        {
            let persistence = HeadlinePersistence::new(SqliteStore::open(&data_dir).expect("db"));
            persistence.save_state(&sample_state());
        }

        let reopened = HeadlinePersistence::new(SqliteStore::open(&data_dir).expect("db"));
        assert_eq!(reopened.load_state(), sample_state());
        assert!(data_dir.join("headline.db").exists());
    }

    #[test]
    fn state_round_trips_through_store() {
        let persistence = HeadlinePersistence::new(MemoryStore::default());
        persistence.save_state(&sample_state());
        assert_eq!(persistence.load_state(), sample_state());
    }

    #[test]
    fn corrupt_state_loads_as_default() {
        let store = MemoryStore::default();
        store.set(STATE_KEY, "{not json").unwrap();
        let persistence = HeadlinePersistence::new(store);
        assert_eq!(persistence.load_state(), PersistedState::default());
    }

    #[test]
    fn broken_store_degrades_to_memory() {
        let mut persistence = HeadlinePersistence::new(BrokenStore);
        assert_eq!(persistence.load_state(), PersistedState::default());
        persistence.save_state(&sample_state());

        assert_eq!(persistence.credential(), None);
        persistence.set_credential("abc123");
        assert_eq!(persistence.credential().as_deref(), Some("abc123"));
        persistence.clear_credential();
        assert_eq!(persistence.credential(), None);
    }

    #[test]
    fn credential_is_stored_apart_from_state() {
        let mut persistence = HeadlinePersistence::new(MemoryStore::default());
        persistence.save_state(&sample_state());
        persistence.set_credential("abc123");

        let raw_state = persistence.store().get(STATE_KEY).unwrap().unwrap();
        assert!(!raw_state.contains("abc123"));
        assert_eq!(
            persistence.store().get(CREDENTIAL_KEY).unwrap().as_deref(),
            Some("abc123")
        );

        persistence.clear_credential();
        assert_eq!(persistence.store().get(CREDENTIAL_KEY).unwrap(), None);
        assert_eq!(persistence.load_state(), sample_state());
    }

    #[test]
    fn blank_stored_credential_reads_as_absent() {
        let store = MemoryStore::default();
        store.set(CREDENTIAL_KEY, "   ").unwrap();
        let mut persistence = HeadlinePersistence::new(store);
        assert_eq!(persistence.credential(), None);
    }
}
