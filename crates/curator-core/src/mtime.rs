//! Modification-time cache
//!
//! Maps source paths to the modification timestamps last seen by a
//! completed import pass, so an unchanged file can be classified without
//! running its importer. Entries removed for deleted files are retained in
//! a bounded recently-missing index keyed by identifier; a file that
//! reappears elsewhere with the same sidecar uuid is then recognized as a
//! move instead of a fresh add.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::migrate::Migrator;

/// Cache file schema version.
pub const MTIME_SCHEMA_VERSION: u32 = 1;

/// Capacity of the recently-missing index.
const MISSING_CAPACITY: usize = 512;

/// Errors that can occur persisting the mtime cache.
#[derive(Debug, Error)]
pub enum MtimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MtimeError>;

/// Modification time of a file in milliseconds since the epoch.
pub fn mtime_ms(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let duration = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(duration.as_millis() as u64)
}

/// Last-seen timestamps for one tracked source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtimeEntry {
    /// Source file mtime in milliseconds.
    pub mtime_ms: u64,
    /// Sidecar file mtime in milliseconds.
    pub meta_mtime_ms: u64,
    /// Identifier of the asset the path belonged to.
    pub uuid: Uuid,
}

/// Outcome of comparing a file's current timestamps against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtimeState {
    /// Path not in the cache.
    Unknown,
    /// The sidecar was edited externally since the last pass.
    MetaChanged,
    /// The source file content changed.
    SourceChanged,
    /// Neither the source nor the sidecar changed.
    Unchanged,
}

/// Per-database modification-time cache.
pub struct MtimeCache {
    entries: HashMap<PathBuf, MtimeEntry>,
    missing: LruCache<Uuid, PathBuf>,
    migrator: Migrator,
}

impl Default for MtimeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MtimeCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            missing: LruCache::new(NonZeroUsize::new(MISSING_CAPACITY).unwrap()),
            migrator: Migrator::new(MTIME_SCHEMA_VERSION, vec![]),
        }
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&MtimeEntry> {
        self.entries.get(path)
    }

    /// Record the timestamps observed after a completed import.
    pub fn record(&mut self, path: &Path, entry: MtimeEntry) {
        self.missing.pop(&entry.uuid);
        self.entries.insert(path.to_path_buf(), entry);
    }

    /// Drop a path from the cache, retaining it in the recently-missing
    /// index so a same-uuid reappearance can be treated as a move.
    pub fn remove(&mut self, path: &Path) {
        if let Some(entry) = self.entries.remove(path) {
            self.missing.put(entry.uuid, path.to_path_buf());
        }
    }

    /// Pop the recently-missing record for an identifier, if any.
    pub fn take_missing(&mut self, uuid: &Uuid) -> Option<PathBuf> {
        self.missing.pop(uuid)
    }

    /// Compare a path's current timestamps against the cached entry.
    ///
    /// The sidecar timestamp is checked first: an externally edited meta
    /// forces re-resolution regardless of the source file's state.
    pub fn check(&self, path: &Path, src_mtime: u64, meta_mtime: u64) -> MtimeState {
        match self.entries.get(path) {
            None => MtimeState::Unknown,
            Some(entry) if entry.meta_mtime_ms != meta_mtime => MtimeState::MetaChanged,
            Some(entry) if entry.mtime_ms != src_mtime => MtimeState::SourceChanged,
            Some(_) => MtimeState::Unchanged,
        }
    }

    /// Drop entries whose path no longer corresponds to a tracked asset.
    ///
    /// Returns the number of entries removed. Purged entries do not enter
    /// the missing index; their assets are already gone.
    pub fn gc(&mut self, live: &HashSet<PathBuf>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path));
        before - self.entries.len()
    }

    /// Save the cache as a versioned JSON file, with paths stored relative
    /// to `target`.
    pub fn save(&self, file_path: &Path, target: &Path) -> Result<()> {
        let mut entries = serde_json::Map::new();
        for (path, entry) in &self.entries {
            let rel = path.strip_prefix(target).unwrap_or(path);
            entries.insert(
                rel.to_string_lossy().replace('\\', "/"),
                serde_json::to_value(entry)?,
            );
        }

        let record = serde_json::json!({
            "version": MTIME_SCHEMA_VERSION,
            "entries": entries,
        });

        let file = File::create(file_path)?;
        serde_json::to_writer_pretty(file, &record)?;
        debug!("Saved mtime cache ({} entries) to {:?}", self.entries.len(), file_path);
        Ok(())
    }

    /// Load the cache, rewriting stored relative paths against `target`.
    ///
    /// A missing or unreadable file yields an empty cache: the next
    /// refresh simply behaves like a cold scan.
    pub fn load(&mut self, file_path: &Path, target: &Path) -> Result<()> {
        self.entries.clear();

        let file = match File::open(file_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Mtime cache not found: {:?}", file_path);
                return Ok(());
            }
            Err(e) => return Err(MtimeError::Io(e)),
        };

        let mut record: Value = match serde_json::from_reader(BufReader::new(file)) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unreadable mtime cache {:?}: {}", file_path, e);
                return Ok(());
            }
        };

        if self.migrator.upgrade(&mut record).is_err() {
            warn!("Mtime cache migration failed, starting cold: {:?}", file_path);
            return Ok(());
        }

        let Some(entries) = record.get("entries").and_then(Value::as_object) else {
            return Ok(());
        };

        for (rel, value) in entries {
            match serde_json::from_value::<MtimeEntry>(value.clone()) {
                Ok(entry) => {
                    self.entries.insert(target.join(rel), entry);
                }
                Err(e) => debug!("Skipping bad mtime entry '{}': {}", rel, e),
            }
        }

        debug!("Loaded mtime cache ({} entries) from {:?}", self.entries.len(), file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(uuid: Uuid) -> MtimeEntry {
        MtimeEntry {
            mtime_ms: 100,
            meta_mtime_ms: 200,
            uuid,
        }
    }

    #[test]
    fn test_check_states() {
        let mut cache = MtimeCache::new();
        let path = Path::new("/t/a.png");
        let uuid = Uuid::new_v4();
        cache.record(path, entry(uuid));

        assert_eq!(cache.check(path, 100, 200), MtimeState::Unchanged);
        assert_eq!(cache.check(path, 101, 200), MtimeState::SourceChanged);
        assert_eq!(cache.check(path, 100, 201), MtimeState::MetaChanged);
        // Meta edit wins even when the source also changed.
        assert_eq!(cache.check(path, 101, 201), MtimeState::MetaChanged);
        assert_eq!(cache.check(Path::new("/t/b.png"), 0, 0), MtimeState::Unknown);
    }

    #[test]
    fn test_remove_feeds_missing_index() {
        let mut cache = MtimeCache::new();
        let path = Path::new("/t/a.png");
        let uuid = Uuid::new_v4();
        cache.record(path, entry(uuid));

        cache.remove(path);
        assert!(cache.get(path).is_none());

        let old_path = cache.take_missing(&uuid).unwrap();
        assert_eq!(old_path, PathBuf::from("/t/a.png"));

        // Popped; second take finds nothing.
        assert!(cache.take_missing(&uuid).is_none());
    }

    #[test]
    fn test_record_clears_missing() {
        let mut cache = MtimeCache::new();
        let uuid = Uuid::new_v4();
        cache.record(Path::new("/t/a.png"), entry(uuid));
        cache.remove(Path::new("/t/a.png"));

        // Re-recording the uuid elsewhere resolves the missing entry.
        cache.record(Path::new("/t/b.png"), entry(uuid));
        assert!(cache.take_missing(&uuid).is_none());
    }

    #[test]
    fn test_gc_purges_untracked() {
        let mut cache = MtimeCache::new();
        cache.record(Path::new("/t/a.png"), entry(Uuid::new_v4()));
        cache.record(Path::new("/t/b.png"), entry(Uuid::new_v4()));

        let live: HashSet<PathBuf> = [PathBuf::from("/t/a.png")].into_iter().collect();
        let purged = cache.gc(&live);

        assert_eq!(purged, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(Path::new("/t/a.png")).is_some());
    }

    #[test]
    fn test_save_and_load_relative_paths() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("assets");
        std::fs::create_dir_all(&target).unwrap();
        let cache_file = dir.path().join(".db-info.json");

        let uuid = Uuid::new_v4();
        let mut cache = MtimeCache::new();
        cache.record(&target.join("sub/a.png"), entry(uuid));
        cache.save(&cache_file, &target).unwrap();

        // Stored path must be relative.
        let raw = std::fs::read_to_string(&cache_file).unwrap();
        assert!(raw.contains("sub/a.png"));
        assert!(!raw.contains(target.to_str().unwrap()));

        let mut loaded = MtimeCache::new();
        loaded.load(&cache_file, &target).unwrap();
        assert_eq!(loaded.get(&target.join("sub/a.png")), Some(&entry(uuid)));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut cache = MtimeCache::new();
        cache
            .load(&dir.path().join("nope.json"), dir.path())
            .unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.json");
        std::fs::write(&file, b"{broken").unwrap();

        let mut cache = MtimeCache::new();
        cache.load(&file, dir.path()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_mtime_ms_reads_filesystem() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(mtime_ms(&file).unwrap() > 0);
        assert!(mtime_ms(&dir.path().join("ghost")).is_none());
    }
}
