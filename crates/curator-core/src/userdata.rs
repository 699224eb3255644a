//! Auxiliary per-asset data store
//!
//! An opaque key/value bag per asset, stamped with a caller-defined
//! version counter. Importers use it to cache derived values (texture
//! dimensions, parse results, compile fingerprints) across runs without
//! touching the sidecar. Saves are debounced: many assets finishing in a
//! burst produce one write.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::migrate::Migrator;

/// Cache file schema version.
pub const USER_DATA_SCHEMA_VERSION: u32 = 1;

/// Default save debounce.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

struct Inner {
    /// Caller-defined version counter stamped into the file.
    ver: u64,
    assets: HashMap<Uuid, Map<String, Value>>,
    dirty: bool,
    save_scheduled: bool,
}

/// Per-database auxiliary data store.
///
/// All methods take `&self`; the store is shared as `Arc<UserDataStore>`
/// between the database and its import jobs. Write failures are logged
/// and never abort the operation that triggered them.
pub struct UserDataStore {
    file_path: PathBuf,
    debounce: Duration,
    inner: Mutex<Inner>,
    migrator: Migrator,
}

impl UserDataStore {
    pub fn new(file_path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            file_path: file_path.into(),
            debounce,
            inner: Mutex::new(Inner {
                ver: 0,
                assets: HashMap::new(),
                dirty: false,
                save_scheduled: false,
            }),
            migrator: Migrator::new(USER_DATA_SCHEMA_VERSION, vec![]),
        }
    }

    /// The caller-defined version counter.
    pub fn version(&self) -> u64 {
        self.inner.lock().ver
    }

    /// Bump the version counter (e.g. when an importer's cached-value
    /// format changes and old entries must be discarded by the caller).
    pub fn set_version(&self, ver: u64) {
        let mut inner = self.inner.lock();
        inner.ver = ver;
        inner.dirty = true;
    }

    pub fn get(&self, uuid: &Uuid, key: &str) -> Option<Value> {
        self.inner.lock().assets.get(uuid)?.get(key).cloned()
    }

    pub fn set(&self, uuid: Uuid, key: impl Into<String>, value: Value) {
        let mut inner = self.inner.lock();
        inner
            .assets
            .entry(uuid)
            .or_default()
            .insert(key.into(), value);
        inner.dirty = true;
    }

    pub fn remove(&self, uuid: &Uuid, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let removed = inner.assets.get_mut(uuid)?.remove(key);
        if removed.is_some() {
            inner.dirty = true;
        }
        removed
    }

    /// Drop every entry for an asset (destroy path).
    pub fn clear_asset(&self, uuid: &Uuid) {
        let mut inner = self.inner.lock();
        if inner.assets.remove(uuid).is_some() {
            inner.dirty = true;
        }
    }

    /// Schedule a debounced save. Multiple calls inside the debounce
    /// window coalesce into one write.
    pub fn mark_dirty(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        inner.dirty = true;
        if inner.save_scheduled {
            return;
        }
        inner.save_scheduled = true;
        drop(inner);

        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(store.debounce).await;
            store.inner.lock().save_scheduled = false;
            store.flush();
        });
    }

    /// Save immediately if dirty (clean shutdown path).
    pub fn flush(&self) {
        {
            let mut inner = self.inner.lock();
            if !inner.dirty {
                return;
            }
            inner.dirty = false;
        }
        if let Err(e) = self.save() {
            warn!("Failed to save user data cache {:?}: {}", self.file_path, e);
        }
    }

    fn save(&self) -> std::io::Result<()> {
        let record = {
            let inner = self.inner.lock();
            let assets: Map<String, Value> = inner
                .assets
                .iter()
                .filter(|(_, bag)| !bag.is_empty())
                .map(|(uuid, bag)| (uuid.to_string(), Value::Object(bag.clone())))
                .collect();
            serde_json::json!({
                "version": USER_DATA_SCHEMA_VERSION,
                "ver": inner.ver,
                "assets": assets,
            })
        };

        let file = File::create(&self.file_path)?;
        serde_json::to_writer_pretty(file, &record)?;
        debug!("Saved user data cache to {:?}", self.file_path);
        Ok(())
    }

    /// Load the cache. Missing or unreadable files yield an empty store.
    pub fn load(&self) -> std::io::Result<()> {
        let file = match File::open(&self.file_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("User data cache not found: {:?}", self.file_path);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut record: Value = match serde_json::from_reader(BufReader::new(file)) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unreadable user data cache {:?}: {}", self.file_path, e);
                return Ok(());
            }
        };

        if self.migrator.upgrade(&mut record).is_err() {
            warn!("User data cache migration failed, starting cold: {:?}", self.file_path);
            return Ok(());
        }

        let mut inner = self.inner.lock();
        inner.ver = record.get("ver").and_then(Value::as_u64).unwrap_or(0);
        inner.assets.clear();

        if let Some(assets) = record.get("assets").and_then(Value::as_object) {
            for (key, bag) in assets {
                let (Ok(uuid), Some(bag)) = (key.parse::<Uuid>(), bag.as_object()) else {
                    continue;
                };
                inner.assets.insert(uuid, bag.clone());
            }
        }
        inner.dirty = false;
        Ok(())
    }

    /// Path of the backing cache file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_get_set_remove() {
        let dir = TempDir::new().unwrap();
        let store = UserDataStore::new(dir.path().join("data.json"), DEFAULT_DEBOUNCE);
        let uuid = Uuid::new_v4();

        assert!(store.get(&uuid, "w").is_none());
        store.set(uuid, "w", json!(128));
        assert_eq!(store.get(&uuid, "w"), Some(json!(128)));

        assert_eq!(store.remove(&uuid, "w"), Some(json!(128)));
        assert!(store.get(&uuid, "w").is_none());
    }

    #[test]
    fn test_clear_asset() {
        let dir = TempDir::new().unwrap();
        let store = UserDataStore::new(dir.path().join("data.json"), DEFAULT_DEBOUNCE);
        let uuid = Uuid::new_v4();

        store.set(uuid, "a", json!(1));
        store.set(uuid, "b", json!(2));
        store.clear_asset(&uuid);

        assert!(store.get(&uuid, "a").is_none());
        assert!(store.get(&uuid, "b").is_none());
    }

    #[test]
    fn test_flush_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let uuid = Uuid::new_v4();

        let store = UserDataStore::new(&path, DEFAULT_DEBOUNCE);
        store.set_version(7);
        store.set(uuid, "dims", json!([64, 64]));
        store.flush();
        assert!(path.exists());

        let loaded = UserDataStore::new(&path, DEFAULT_DEBOUNCE);
        loaded.load().unwrap();
        assert_eq!(loaded.version(), 7);
        assert_eq!(loaded.get(&uuid, "dims"), Some(json!([64, 64])));
    }

    #[test]
    fn test_flush_clean_store_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        let store = UserDataStore::new(&path, DEFAULT_DEBOUNCE);
        store.flush();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_mark_dirty_debounces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let store = Arc::new(UserDataStore::new(&path, Duration::from_millis(50)));

        store.set(Uuid::new_v4(), "k", json!(1));
        store.mark_dirty();
        store.mark_dirty();
        store.mark_dirty();

        // Nothing written inside the debounce window.
        assert!(!path.exists());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(path.exists());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, b"][").unwrap();

        let store = UserDataStore::new(&path, DEFAULT_DEBOUNCE);
        store.load().unwrap();
        assert_eq!(store.version(), 0);
    }
}
