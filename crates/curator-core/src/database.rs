//! Asset database orchestrator
//!
//! Owns the path/uuid asset maps and the per-database stores, scans the
//! target tree, computes the add/change/delete/no-op diff against cached
//! state, schedules import work on the task queue, and exposes the public
//! lifecycle API. Classification passes are serialized by a database-wide
//! async mutex; per-asset work is serialized by each asset handle's own
//! mutex, and the in-flight set guarantees at most one scheduled job per
//! asset at a time.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::address::{AddressError, AssetAddr};
use crate::asset::{Action, Asset, AssetRoots};
use crate::deps::DependencyGraph;
use crate::importer::{Importer, ImporterRegistry};
use crate::meta::{Meta, MetaError, MetaStore};
use crate::migrate::{compare_versions, Migrator};
use crate::mtime::{mtime_ms, MtimeCache, MtimeEntry, MtimeState};
use crate::queue::{QueueStats, TaskQueue, DEFAULT_CONCURRENCY};
use crate::registry::DatabaseRegistry;
use crate::userdata::{UserDataStore, DEFAULT_DEBOUNCE};

/// Path-list cache schema version.
pub const PATH_CACHE_SCHEMA_VERSION: u32 = 1;

/// Default watchdog interval for unresponsive importers.
pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(8 * 60);

/// Errors raised by database construction and the lifecycle API.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Fatal configuration problem; the database does not start.
    #[error("invalid database configuration: {0}")]
    Config(String),

    #[error("path '{path}' is outside the database target '{target}'")]
    OutsideTarget { path: PathBuf, target: PathBuf },

    #[error("no asset found for '{0}'")]
    NotFound(String),

    #[error("cache restore failed: {0}")]
    CacheRestore(String),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("sidecar error: {0}")]
    Meta(#[from] MetaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Options for creating an [`AssetDatabase`].
#[derive(Debug, Clone)]
pub struct AssetDatabaseOptions {
    /// Database name; the authority of its `db://` urls.
    pub name: String,
    /// Source tree to mirror.
    pub target: PathBuf,
    /// Output root for imported artifacts.
    pub library: PathBuf,
    /// Scratch root, cleared per-asset on reset.
    pub temp: PathBuf,
    /// Globs for files to track (empty = everything).
    pub include: Vec<String>,
    /// Globs for files to skip. Sidecars are always skipped.
    pub ignore: Vec<String>,
    /// Task queue concurrency.
    pub concurrency: usize,
    /// Never write sidecars next to the sources (immutable mounts).
    pub read_only: bool,
    /// Unresponsive-importer watchdog interval.
    pub watchdog: Duration,
    /// Auxiliary data store save debounce.
    pub data_debounce: Duration,
}

impl AssetDatabaseOptions {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<PathBuf>,
        library: impl Into<PathBuf>,
        temp: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            library: library.into(),
            temp: temp.into(),
            include: Vec::new(),
            ignore: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            read_only: false,
            watchdog: DEFAULT_WATCHDOG,
            data_debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Lifecycle notifications broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum AssetEvent {
    Added { uuid: String, url: String },
    Changed { uuid: String, url: String },
    Deleted { uuid: String, url: String },
    Invalid { uuid: String, url: String },
}

/// Outcome counts of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl RefreshSummary {
    pub fn total(&self) -> usize {
        self.added + self.changed + self.removed + self.unchanged
    }
}

/// Snapshot of one asset's public state.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub uuid: String,
    pub url: String,
    pub source: PathBuf,
    pub library_base: PathBuf,
    pub display_name: String,
    pub importer: String,
    pub imported: bool,
    pub invalid: bool,
    pub children: Vec<String>,
}

impl AssetInfo {
    fn of(asset: &Asset) -> Self {
        Self {
            uuid: asset.uuid_addr(),
            url: asset.url(),
            source: asset.source.clone(),
            library_base: asset.library_base(),
            display_name: asset.meta.display_name.clone(),
            importer: asset.meta.importer.clone(),
            imported: asset.meta.imported,
            invalid: asset.invalid,
            children: asset.sub_assets.keys().cloned().collect(),
        }
    }
}

/// Aggregate counts over all tracked assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub assets: usize,
    pub virtual_assets: usize,
    pub imported: usize,
    pub invalid: usize,
}

/// Shared handle to one tracked asset. The mutex is the asset-level lock:
/// an import job holds it for the whole job, so queries and a concurrent
/// reimport of the same asset serialize behind it.
pub type AssetHandle = Arc<Mutex<Asset>>;

/// Services an importer reaches during `import()`.
pub struct ImportContext {
    db: Arc<AssetDatabase>,
}

impl ImportContext {
    /// The database running this import.
    pub fn database(&self) -> &Arc<AssetDatabase> {
        &self.db
    }

    pub fn db_name(&self) -> &str {
        &self.db.options.name
    }

    /// Auxiliary per-asset cache shared across runs.
    pub fn user_data(&self) -> &Arc<UserDataStore> {
        &self.db.user_data
    }

    /// Record that `asset` depends on `value` (a path, identifier, or
    /// url). Returns `false` when the edge would close a cycle.
    pub async fn depend(&self, asset: &Asset, value: &str) -> bool {
        self.db.depend(asset, value).await
    }
}

#[derive(Default)]
struct DbMaps {
    by_path: HashMap<PathBuf, AssetHandle>,
    by_uuid: HashMap<Uuid, AssetHandle>,
    /// Derived path→uuid index, so address resolution never has to lock
    /// an asset that may be mid-import.
    uuid_of_path: HashMap<PathBuf, Uuid>,
}

impl DbMaps {
    fn insert(&mut self, path: PathBuf, uuid: Uuid, handle: AssetHandle) {
        self.by_path.insert(path.clone(), Arc::clone(&handle));
        self.by_uuid.insert(uuid, handle);
        self.uuid_of_path.insert(path, uuid);
    }

    fn remove_path(&mut self, path: &Path) -> Option<(Uuid, AssetHandle)> {
        let handle = self.by_path.remove(path)?;
        let uuid = self.uuid_of_path.remove(path)?;
        self.by_uuid.remove(&uuid);
        Some((uuid, handle))
    }
}

/// The asset database.
pub struct AssetDatabase {
    options: AssetDatabaseOptions,
    include: Option<GlobSet>,
    ignore: GlobSet,
    maps: RwLock<DbMaps>,
    meta_store: MetaStore,
    mtime: parking_lot::Mutex<MtimeCache>,
    deps: parking_lot::Mutex<DependencyGraph>,
    user_data: Arc<UserDataStore>,
    importers: ImporterRegistry,
    queue: TaskQueue,
    /// Database-wide advisory lock: serializes refresh and reimport
    /// classification passes (FIFO via tokio's mutex).
    scan_lock: Mutex<()>,
    paused: watch::Sender<bool>,
    cascade: mpsc::UnboundedSender<String>,
    events: broadcast::Sender<AssetEvent>,
    /// Assets with an unresolved scheduled job, keyed by uuid string.
    in_flight: DashMap<String, ()>,
    /// True during the first refresh after `start`, enabling silent
    /// restore of unchanged assets from the mtime cache.
    initial_scan: AtomicBool,
    path_cache_migrator: Migrator,
}

impl AssetDatabase {
    /// Create a database. Configuration problems are fatal here; nothing
    /// later in the pipeline throws out of `start`/`refresh`.
    pub fn new(options: AssetDatabaseOptions) -> Result<Arc<Self>> {
        if options.name.is_empty() {
            return Err(DatabaseError::Config("database name is empty".into()));
        }
        if !options.target.is_dir() {
            return Err(DatabaseError::Config(format!(
                "target '{}' does not exist or is not a directory",
                options.target.display()
            )));
        }
        if !options.target.is_absolute() {
            return Err(DatabaseError::Config(format!(
                "target '{}' must be absolute",
                options.target.display()
            )));
        }
        std::fs::create_dir_all(&options.library).map_err(|e| {
            DatabaseError::Config(format!(
                "cannot create library root '{}': {}",
                options.library.display(),
                e
            ))
        })?;
        std::fs::create_dir_all(&options.temp).map_err(|e| {
            DatabaseError::Config(format!(
                "cannot create temp root '{}': {}",
                options.temp.display(),
                e
            ))
        })?;

        let include = if options.include.is_empty() {
            None
        } else {
            Some(build_globset(&options.include)?)
        };
        let ignore = build_globset(&options.ignore)?;

        let (cascade_tx, cascade_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let (paused, _) = watch::channel(false);

        let db = Arc::new(Self {
            meta_store: MetaStore::new(options.read_only),
            mtime: parking_lot::Mutex::new(MtimeCache::new()),
            deps: parking_lot::Mutex::new(DependencyGraph::new()),
            user_data: Arc::new(UserDataStore::new(
                options.library.join(format!(".{}-data.json", options.name)),
                options.data_debounce,
            )),
            importers: ImporterRegistry::new(),
            queue: TaskQueue::new(options.concurrency),
            scan_lock: Mutex::new(()),
            paused,
            cascade: cascade_tx,
            events,
            in_flight: DashMap::new(),
            initial_scan: AtomicBool::new(false),
            path_cache_migrator: Migrator::new(PATH_CACHE_SCHEMA_VERSION, vec![]),
            maps: RwLock::new(DbMaps::default()),
            include,
            ignore,
            options,
        });

        // Cascade scheduler: consumes dependant addresses pushed by
        // import jobs and runs reimports outside the triggering job.
        tokio::spawn(Self::cascade_loop(Arc::downgrade(&db), cascade_rx));

        Ok(db)
    }

    async fn cascade_loop(weak: Weak<Self>, mut rx: mpsc::UnboundedReceiver<String>) {
        while let Some(addr) = rx.recv().await {
            let Some(db) = weak.upgrade() else { break };
            debug!("Cascade reimport of {}", addr);
            if let Err(e) = db.reimport(&addr).await {
                warn!("Cascade reimport of {} failed: {}", addr, e);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &AssetDatabaseOptions {
        &self.options
    }

    /// Importer registry for this database. Register importers before
    /// calling `start`.
    pub fn importers(&self) -> &ImporterRegistry {
        &self.importers
    }

    pub fn user_data(&self) -> &Arc<UserDataStore> {
        &self.user_data
    }

    /// Subscribe to asset lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AssetEvent> {
        self.events.subscribe()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn roots(&self) -> AssetRoots {
        AssetRoots {
            db_name: self.options.name.clone(),
            target: self.options.target.clone(),
            library: self.options.library.clone(),
            temp: self.options.temp.clone(),
        }
    }

    fn path_cache_file(&self) -> PathBuf {
        self.options.library.join(format!(".{}", self.options.name))
    }

    fn mtime_cache_file(&self) -> PathBuf {
        self.options
            .library
            .join(format!(".{}-info.json", self.options.name))
    }

    fn deps_cache_file(&self) -> PathBuf {
        self.options
            .library
            .join(format!(".{}-dependency.json", self.options.name))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load caches, register in the name table, run a full refresh, and
    /// drain the queue.
    pub async fn start(
        self: &Arc<Self>,
        registry: &DatabaseRegistry,
    ) -> Result<RefreshSummary> {
        info!("Starting asset database '{}'", self.options.name);
        self.load_caches();
        registry.register(Arc::clone(self)).await;
        self.initial_scan.store(true, AtomicOrdering::SeqCst);
        let target = self.options.target.clone();
        self.refresh(&target).await
    }

    /// Restore assets from the persisted path list instead of scanning.
    ///
    /// Only valid when the path-list cache exists; any restore failure is
    /// returned so the caller can fall back to a normal `start`.
    pub async fn start_with_cache(
        self: &Arc<Self>,
        registry: &DatabaseRegistry,
    ) -> Result<usize> {
        let cache_file = self.path_cache_file();
        if !cache_file.exists() {
            return Err(DatabaseError::CacheRestore(format!(
                "path cache '{}' does not exist",
                cache_file.display()
            )));
        }

        info!(
            "Starting asset database '{}' from cache",
            self.options.name
        );
        self.load_caches();

        let paths = self.load_path_cache(&cache_file)?;
        let mut restored = 0usize;
        {
            let mut maps = self.maps.write().await;
            for rel in &paths {
                let source = self.options.target.join(rel);
                if !source.is_file() {
                    return Err(DatabaseError::CacheRestore(format!(
                        "cached path '{}' no longer exists",
                        source.display()
                    )));
                }
                let meta = self.meta_store.load(&source)?.ok_or_else(|| {
                    DatabaseError::CacheRestore(format!(
                        "no sidecar for cached path '{}'",
                        source.display()
                    ))
                })?;
                let uuid = meta.uuid;
                if maps.by_uuid.contains_key(&uuid) {
                    return Err(DatabaseError::CacheRestore(format!(
                        "duplicate identifier {} in cached paths",
                        uuid
                    )));
                }
                let mut asset = Asset::new(self.roots(), &source, meta);
                asset.init = true;
                let handle: AssetHandle = Arc::new(Mutex::new(asset));
                maps.insert(source, uuid, handle);
                restored += 1;
            }
        }

        registry.register(Arc::clone(self)).await;
        info!(
            "Restored {} assets for '{}' from cache",
            restored, self.options.name
        );
        Ok(restored)
    }

    /// Flush caches and unregister from the name table.
    pub async fn stop(self: &Arc<Self>, registry: &DatabaseRegistry) {
        info!("Stopping asset database '{}'", self.options.name);
        self.queue.wait_idle().await;
        self.user_data.flush();
        self.save_caches().await;
        registry.unregister(&self.options.name).await;
    }

    /// Quiesce future scheduling. In-flight jobs finish; new refresh and
    /// reimport calls wait until `resume`.
    pub async fn pause(&self) {
        self.paused.send_replace(true);
        self.queue.wait_idle().await;
        info!("Database '{}' paused", self.options.name);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
        info!("Database '{}' resumed", self.options.name);
    }

    async fn wait_unpaused(&self) {
        let mut rx = self.paused.subscribe();
        loop {
            if !*rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn load_caches(&self) {
        let target = &self.options.target;
        if let Err(e) = self.mtime.lock().load(&self.mtime_cache_file(), target) {
            warn!("Failed to load mtime cache: {}", e);
        }
        if let Err(e) = self.deps.lock().load(&self.deps_cache_file(), target) {
            warn!("Failed to load dependency cache: {}", e);
        }
        if let Err(e) = self.user_data.load() {
            warn!("Failed to load user data cache: {}", e);
        }
    }

    async fn save_caches(&self) {
        let target = &self.options.target;
        if let Err(e) = self.mtime.lock().save(&self.mtime_cache_file(), target) {
            warn!("Failed to save mtime cache: {}", e);
        }
        if let Err(e) = self.deps.lock().save(&self.deps_cache_file(), target) {
            warn!("Failed to save dependency cache: {}", e);
        }
        if let Err(e) = self.save_path_cache().await {
            warn!("Failed to save path cache: {}", e);
        }
    }

    fn load_path_cache(&self, file: &Path) -> Result<Vec<String>> {
        let reader = BufReader::new(File::open(file)?);
        let mut record: Value = serde_json::from_reader(reader)
            .map_err(|e| DatabaseError::CacheRestore(format!("unreadable path cache: {}", e)))?;
        self.path_cache_migrator
            .upgrade(&mut record)
            .map_err(|e| DatabaseError::CacheRestore(format!("path cache migration: {}", e)))?;

        let paths = record
            .get("paths")
            .and_then(Value::as_array)
            .ok_or_else(|| DatabaseError::CacheRestore("path cache has no paths".into()))?;
        Ok(paths
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    async fn save_path_cache(&self) -> Result<()> {
        let maps = self.maps.read().await;
        let mut paths: Vec<String> = maps
            .by_path
            .keys()
            .map(|p| {
                p.strip_prefix(&self.options.target)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        paths.sort();
        drop(maps);

        let record = serde_json::json!({
            "version": PATH_CACHE_SCHEMA_VERSION,
            "paths": paths,
        });
        let file = File::create(self.path_cache_file())?;
        serde_json::to_writer_pretty(file, &record)
            .map_err(|e| DatabaseError::CacheRestore(e.to_string()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Diff a subtree against tracked state and schedule the resulting
    /// import work. Blocks until the queue drains.
    pub async fn refresh(self: &Arc<Self>, path: &Path) -> Result<RefreshSummary> {
        self.wait_unpaused().await;
        let _guard = self.scan_lock.lock().await;
        let result = self.refresh_locked(path).await;
        self.initial_scan.store(false, AtomicOrdering::SeqCst);
        result
    }

    async fn refresh_locked(self: &Arc<Self>, path: &Path) -> Result<RefreshSummary> {
        if !path.starts_with(&self.options.target) {
            return Err(DatabaseError::OutsideTarget {
                path: path.to_path_buf(),
                target: self.options.target.clone(),
            });
        }

        let scope = self.resolve_scope(path).await;
        debug!("Refreshing {:?} (scope {:?})", path, scope);

        let present = self.enumerate(&scope);
        let mut summary = RefreshSummary::default();

        // Partition against tracked state.
        let (adds, candidates, deletes) = {
            let maps = self.maps.read().await;
            let mut adds = Vec::new();
            let mut candidates = Vec::new();
            for p in &present {
                if maps.by_path.contains_key(p) {
                    candidates.push(p.clone());
                } else {
                    adds.push(p.clone());
                }
            }
            let deletes: Vec<PathBuf> = maps
                .by_path
                .keys()
                .filter(|p| p.starts_with(&scope) && !present.contains(*p))
                .cloned()
                .collect();
            (adds, candidates, deletes)
        };

        self.queue.stop();

        // Deletes are classified first so a uuid freed by a delete is
        // visible to move detection in the same pass. Destroy jobs are
        // held back until adds are classified; an add that claims a
        // pending uuid rescues the asset as a move.
        let mut pending: HashMap<Uuid, AssetHandle> = HashMap::new();
        {
            let mut maps = self.maps.write().await;
            let mut mtime = self.mtime.lock();
            for path in &deletes {
                let Some((uuid, handle)) = maps.remove_path(path) else {
                    continue;
                };
                mtime.remove(path);
                pending.insert(uuid, handle);
            }
        }

        for path in &adds {
            match self.classify_add(path, &mut pending).await {
                Ok(AddOutcome::Added) => summary.added += 1,
                Ok(AddOutcome::Moved) => summary.changed += 1,
                Ok(AddOutcome::Restored) => summary.unchanged += 1,
                Err(e) => warn!("Failed to classify {:?}: {}", path, e),
            }
        }

        for path in &candidates {
            match self.classify_candidate(path).await {
                Ok(true) => summary.changed += 1,
                Ok(false) => summary.unchanged += 1,
                Err(e) => warn!("Failed to classify {:?}: {}", path, e),
            }
        }

        // Whatever wasn't rescued as a move is gone for real.
        for (uuid, handle) in pending {
            summary.removed += 1;
            {
                let mut asset = handle.lock().await;
                asset.action = Action::Delete;
            }
            self.enqueue(uuid, handle, false);
        }

        self.queue.start();
        self.queue.wait_idle().await;

        // Garbage-collect mtime entries for paths nothing tracks anymore,
        // then persist the caches.
        {
            let maps = self.maps.read().await;
            let live: HashSet<PathBuf> = maps.by_path.keys().cloned().collect();
            self.mtime.lock().gc(&live);
        }
        self.save_caches().await;
        self.user_data.flush();

        info!(
            "Refresh of '{}' done: {} added, {} changed, {} removed, {} unchanged",
            self.options.name, summary.added, summary.changed, summary.removed, summary.unchanged
        );
        Ok(summary)
    }

    /// A refresh target inside a directory nothing tracks yet resolves to
    /// the nearest ancestor containing tracked paths (or the target
    /// root), so newly created folders are discovered top-down.
    async fn resolve_scope(&self, path: &Path) -> PathBuf {
        let target = &self.options.target;
        if path == target {
            return path.to_path_buf();
        }

        let maps = self.maps.read().await;
        let tracked_dir = |dir: &Path| {
            dir == target || maps.by_path.keys().any(|p| p.starts_with(dir) && p != dir)
        };

        let parent = path.parent().unwrap_or(target);
        if tracked_dir(parent) {
            return path.to_path_buf();
        }

        let mut ancestor = parent;
        while ancestor != target {
            let up = ancestor.parent().unwrap_or(target);
            if tracked_dir(up) {
                return up.to_path_buf();
            }
            ancestor = up;
        }
        target.to_path_buf()
    }

    /// Enumerate matching files under a scope. Sidecars are always
    /// skipped; the include/ignore globs run against target-relative
    /// paths.
    fn enumerate(&self, scope: &Path) -> HashSet<PathBuf> {
        let mut out = HashSet::new();
        if scope.is_file() {
            if self.matches(scope) {
                out.insert(scope.to_path_buf());
            }
            return out;
        }

        for entry in WalkDir::new(scope).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error walking {:?}: {}", scope, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.matches(path) {
                out.insert(path.to_path_buf());
            }
        }
        out
    }

    fn matches(&self, path: &Path) -> bool {
        if path.extension().is_some_and(|e| e == "meta") {
            return false;
        }
        let rel = path.strip_prefix(&self.options.target).unwrap_or(path);
        if self.ignore.is_match(rel) {
            return false;
        }
        match &self.include {
            Some(include) => include.is_match(rel),
            None => true,
        }
    }

    async fn classify_add(
        self: &Arc<Self>,
        path: &Path,
        pending: &mut HashMap<Uuid, AssetHandle>,
    ) -> Result<AddOutcome> {
        let (meta, created) = self.meta_store.read_or_create(path)?;
        let uuid = meta.uuid;

        // Same-pass move: the uuid was freed by a delete classified
        // earlier in this refresh. Relocate the existing asset.
        if let Some(handle) = pending.remove(&uuid) {
            {
                let mut asset = handle.lock().await;
                info!(
                    "Asset {} moved: {:?} -> {:?}",
                    uuid, asset.source, path
                );
                asset.source = path.to_path_buf();
                asset.meta = meta;
                asset.action = Action::Change;
            }
            let mut maps = self.maps.write().await;
            maps.insert(path.to_path_buf(), uuid, Arc::clone(&handle));
            drop(maps);
            self.enqueue(uuid, handle, false);
            return Ok(AddOutcome::Moved);
        }

        let live_elsewhere = {
            let maps = self.maps.read().await;
            maps.by_uuid.get(&uuid).cloned()
        };

        if let Some(other) = live_elsewhere {
            let other_source = other.lock().await.source.clone();
            if other_source != *path && !other_source.exists() {
                // Externally-moved file: the tracked path is gone and the
                // same sidecar surfaced here. Relocate in place.
                {
                    let mut asset = other.lock().await;
                    info!("Asset {} moved: {:?} -> {:?}", uuid, asset.source, path);
                    asset.source = path.to_path_buf();
                    asset.meta = meta;
                    asset.action = Action::Change;
                }
                let mut maps = self.maps.write().await;
                maps.by_path.remove(&other_source);
                maps.uuid_of_path.remove(&other_source);
                maps.by_path.insert(path.to_path_buf(), Arc::clone(&other));
                maps.uuid_of_path.insert(path.to_path_buf(), uuid);
                drop(maps);
                self.mtime.lock().remove(&other_source);
                self.enqueue(uuid, other, false);
                return Ok(AddOutcome::Moved);
            }

            if other_source != *path {
                // Genuine collision: two files declare the same
                // identifier. The newly scanned file is reassigned.
                let mut meta = meta;
                let fresh = Uuid::new_v4();
                warn!(
                    "Identifier collision on {}: {:?} vs {:?}; reassigning {:?} to {}",
                    uuid, other_source, path, path, fresh
                );
                meta.uuid = fresh;
                self.meta_store.write(path, &meta)?;
                return self.insert_new_asset(path, meta, created).await;
            }
        }

        self.insert_new_asset(path, meta, created).await
    }

    async fn insert_new_asset(
        self: &Arc<Self>,
        path: &Path,
        meta: Meta,
        created_sidecar: bool,
    ) -> Result<AddOutcome> {
        let uuid = meta.uuid;
        let mut action = Action::Add;

        // Cross-pass move: the uuid vanished from another path in an
        // earlier session and reappeared here.
        let was_missing = self.mtime.lock().take_missing(&uuid).is_some();
        if was_missing {
            action = Action::Change;
        }

        // During initial startup, an unchanged file with a completed
        // prior import restores silently.
        if self.initial_scan.load(AtomicOrdering::SeqCst) && !created_sidecar && meta.imported {
            let src = mtime_ms(path).unwrap_or(0);
            let side = MetaStore::sidecar_mtime(path).unwrap_or(0);
            let mtime = self.mtime.lock();
            if let Some(entry) = mtime.get(path) {
                if entry.uuid == uuid && mtime.check(path, src, side) == MtimeState::Unchanged {
                    action = Action::None;
                }
            }
        }

        let mut asset = Asset::new(self.roots(), path, meta);
        asset.action = action;
        if action == Action::None {
            asset.init = true;
        }
        let handle: AssetHandle = Arc::new(Mutex::new(asset));

        {
            let mut maps = self.maps.write().await;
            maps.insert(path.to_path_buf(), uuid, Arc::clone(&handle));
        }

        // Every outcome becomes a job; the dirty calculus inside the job
        // is what turns a silent restore into a no-op.
        self.enqueue(uuid, handle, false);
        match action {
            Action::None => Ok(AddOutcome::Restored),
            Action::Change => Ok(AddOutcome::Moved),
            _ => Ok(AddOutcome::Added),
        }
    }

    /// Classify a still-present tracked path. Returns whether work was
    /// scheduled.
    async fn classify_candidate(self: &Arc<Self>, path: &Path) -> Result<bool> {
        let handle = {
            let maps = self.maps.read().await;
            maps.by_path.get(path).cloned()
        };
        let Some(handle) = handle else {
            return Ok(false);
        };

        let src = mtime_ms(path).unwrap_or(0);
        let side = MetaStore::sidecar_mtime(path).unwrap_or(0);
        let state = self.mtime.lock().check(path, src, side);

        let (uuid, scheduled) = {
            let mut asset = handle.lock().await;
            match state {
                MtimeState::MetaChanged => {
                    // The sidecar was edited externally: reload it and
                    // force importer re-resolution. Identifier continuity
                    // is preserved when the uuid is unchanged.
                    let old_uuid = asset.meta.uuid;
                    let (meta, _) = self.meta_store.read_or_create(path)?;
                    let new_uuid = meta.uuid;
                    asset.meta = meta;
                    asset.sync_root_uuid();
                    asset.action = Action::Change;

                    if new_uuid != old_uuid {
                        let reassigned =
                            self.rekey_asset(path, &handle, old_uuid, new_uuid).await?;
                        if reassigned != new_uuid {
                            asset.meta.uuid = reassigned;
                            asset.sync_root_uuid();
                            self.meta_store.write(path, &asset.meta)?;
                        }
                    }
                    (asset.meta.uuid, true)
                }
                MtimeState::SourceChanged | MtimeState::Unknown => {
                    asset.action = Action::Change;
                    (asset.meta.uuid, true)
                }
                MtimeState::Unchanged => {
                    if asset.meta.imported {
                        asset.action = Action::None;
                        (asset.meta.uuid, false)
                    } else {
                        asset.action = Action::Change;
                        (asset.meta.uuid, true)
                    }
                }
            }
        };

        // Unchanged assets are enqueued too; their job is a no-op unless
        // the importer's version state says otherwise.
        self.enqueue(uuid, handle, false);
        Ok(scheduled)
    }

    /// Move an asset's uuid-map entry after its sidecar identifier was
    /// edited externally. A collision with a live asset mints a fresh
    /// identifier for the edited one; the returned uuid is the final key.
    async fn rekey_asset(
        &self,
        path: &Path,
        handle: &AssetHandle,
        old_uuid: Uuid,
        new_uuid: Uuid,
    ) -> Result<Uuid> {
        let mut maps = self.maps.write().await;
        maps.by_uuid.remove(&old_uuid);

        let final_uuid = if maps.by_uuid.contains_key(&new_uuid) {
            let fresh = Uuid::new_v4();
            warn!(
                "Edited sidecar of {:?} collides on {}; reassigning to {}",
                path, new_uuid, fresh
            );
            fresh
        } else {
            new_uuid
        };
        maps.by_uuid.insert(final_uuid, Arc::clone(handle));
        maps.uuid_of_path.insert(path.to_path_buf(), final_uuid);
        Ok(final_uuid)
    }

    // ------------------------------------------------------------------
    // Job execution
    // ------------------------------------------------------------------

    /// Schedule the job for an asset. The in-flight set guarantees at
    /// most one unresolved job per asset.
    fn enqueue(self: &Arc<Self>, uuid: Uuid, handle: AssetHandle, forced: bool) {
        let key = uuid.to_string();
        if self.in_flight.insert(key.clone(), ()).is_some() {
            debug!("Asset {} already has a scheduled job", key);
            return;
        }

        let db = Arc::clone(self);
        self.queue.push(key.clone(), async move {
            {
                let mut asset = handle.lock().await;
                db.run_job(&mut asset, forced).await;
            }
            db.in_flight.remove(&key);
        });
    }

    async fn run_job(self: &Arc<Self>, asset: &mut Asset, forced: bool) {
        match asset.action {
            Action::Delete => self.destroy_asset(asset).await,
            // A `none` asset still goes through the dirty calculus: an
            // importer version-code bump or a missing artifact reimports
            // it even though the scan saw no change.
            Action::Add | Action::Change | Action::None => {
                if asset.action == Action::None && forced {
                    asset.action = Action::Change;
                }
                self.import_recursive(asset, false, forced).await;
                self.user_data.mark_dirty();
            }
        }
        asset.action = Action::None;
    }

    fn import_recursive<'a>(
        self: &'a Arc<Self>,
        asset: &'a mut Asset,
        parent_dirty: bool,
        forced: bool,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.import_asset(asset, parent_dirty, forced))
    }

    async fn import_asset(self: &Arc<Self>, asset: &mut Asset, parent_dirty: bool, forced: bool) {
        let Some(importer) = self.importers.find(asset).await else {
            asset.invalid = true;
            if !asset.no_importer_logged {
                asset.no_importer_logged = true;
                warn!("No importer found for {}", asset.url());
            }
            self.emit(AssetEvent::Invalid {
                uuid: asset.uuid_addr(),
                url: asset.url(),
            });
            return;
        };

        let stored_importer = asset.meta.importer.clone();
        let stored_version = asset.meta.version.clone();
        let imp_version = importer.version().to_string();

        // A downgraded importer is tolerated for assets that completed an
        // import before; an uninitialized asset cannot be trusted to it.
        if !stored_version.is_empty()
            && compare_versions(&stored_version, &imp_version) == Ordering::Greater
        {
            if asset.meta.imported {
                warn!(
                    "Importer '{}' downgraded ({} -> {}) for {}",
                    importer.name(),
                    stored_version,
                    imp_version,
                    asset.url()
                );
            } else {
                warn!(
                    "Importer '{}' downgraded ({} -> {}) and {} was never imported; skipping",
                    importer.name(),
                    stored_version,
                    imp_version,
                    asset.url()
                );
                asset.invalid = true;
                self.emit(AssetEvent::Invalid {
                    uuid: asset.uuid_addr(),
                    url: asset.url(),
                });
                return;
            }
        }

        let produced_missing = asset
            .meta
            .files
            .iter()
            .any(|f| !asset.artifact_path(f).exists());

        let dirty = forced
            || parent_dirty
            || !asset.meta.imported
            || asset.meta.ver_code != importer.version_code()
            || compare_versions(&stored_version, &imp_version) != Ordering::Equal
            || produced_missing
            || importer.force(asset).await;

        if !dirty {
            asset.init = true;
            // Keep the cache current even for clean skips; a moved asset
            // lands here with no entry under its new path.
            if !asset.is_virtual() {
                let entry = MtimeEntry {
                    mtime_ms: mtime_ms(&asset.source).unwrap_or(0),
                    meta_mtime_ms: MetaStore::sidecar_mtime(&asset.source).unwrap_or(0),
                    uuid: asset.meta.uuid,
                };
                self.mtime.lock().record(&asset.source, entry);
            }
            return;
        }

        let parent_action = asset.action;
        let prev_children: BTreeSet<String> = asset.sub_assets.keys().cloned().collect();

        {
            let mut deps = self.deps.lock();
            asset.reset(&mut deps);
        }

        // Pending sidecar migrations run before the importer, and only
        // when the importer that wrote the record is the one running.
        if stored_importer == importer.name()
            && !stored_version.is_empty()
            && compare_versions(&stored_version, &imp_version) == Ordering::Less
        {
            if let Err(e) = self.run_meta_migrations(asset, &*importer, &stored_version) {
                warn!("Migration failed for {}: {}", asset.url(), e);
                asset.invalid = true;
                asset.meta.imported = false;
                self.emit(AssetEvent::Invalid {
                    uuid: asset.uuid_addr(),
                    url: asset.url(),
                });
                return;
            }
        }
        asset.meta.importer = importer.name().to_string();

        let ctx = ImportContext {
            db: Arc::clone(self),
        };

        let result = {
            let url = asset.url();
            let fut = importer.import(&ctx, asset);
            tokio::pin!(fut);
            loop {
                match tokio::time::timeout(self.options.watchdog, &mut fut).await {
                    Ok(res) => break res,
                    Err(_) => {
                        // A signal, not a timeout: the host decides
                        // whether to unstick the importer.
                        warn!(
                            "Importer '{}' unresponsive for {:?} on {}",
                            importer.name(),
                            self.options.watchdog,
                            url
                        );
                        importer.check_awake();
                    }
                }
            }
        };

        match result {
            Ok(imported) => {
                asset.meta.imported = imported;
                asset.meta.version = imp_version;
                asset.meta.ver_code = importer.version_code();
                asset.invalid = false;
            }
            Err(e) => {
                warn!("Import of {} failed: {}", asset.url(), e);
                asset.invalid = true;
                asset.meta.imported = false;
                self.emit(AssetEvent::Invalid {
                    uuid: asset.uuid_addr(),
                    url: asset.url(),
                });
                return;
            }
        }

        // Children import after their parent's own transformation. A
        // child that survived a change pass re-imports as a change; a
        // fresh child imports as an add.
        let child_ids: Vec<String> = asset.sub_assets.keys().cloned().collect();
        for id in &child_ids {
            let existed = prev_children.contains(id);
            if let Some(child) = asset.sub_assets.get_mut(id) {
                child.action = if existed && parent_action == Action::Change {
                    Action::Change
                } else {
                    Action::Add
                };
                self.import_recursive(child, true, false).await;
                child.action = Action::None;
            }
        }
        asset.clear_recycle();

        importer.after_sub_assets_import(&ctx, asset).await;

        // Child-set diff events.
        let current: BTreeSet<String> = asset.sub_assets.keys().cloned().collect();
        for id in prev_children.difference(&current) {
            self.emit(AssetEvent::Deleted {
                uuid: format!("{}@{}", asset.uuid_addr(), id),
                url: format!("{}@{}", asset.url(), id),
            });
        }
        for id in current.difference(&prev_children) {
            if let Some(child) = asset.sub_assets.get(id) {
                self.emit(AssetEvent::Added {
                    uuid: child.uuid_addr(),
                    url: child.url(),
                });
            }
        }

        let sub_metas = asset.collect_sub_metas();
        asset.meta.sub_metas = sub_metas;
        asset.init = true;

        if !asset.is_virtual() {
            if let Err(e) = self.meta_store.write(&asset.source, &asset.meta) {
                warn!("Failed to write sidecar for {}: {}", asset.url(), e);
            }
            let entry = MtimeEntry {
                mtime_ms: mtime_ms(&asset.source).unwrap_or(0),
                meta_mtime_ms: MetaStore::sidecar_mtime(&asset.source).unwrap_or(0),
                uuid: asset.meta.uuid,
            };
            self.mtime.lock().record(&asset.source, entry);

            self.emit(match parent_action {
                Action::Add => AssetEvent::Added {
                    uuid: asset.uuid_addr(),
                    url: asset.url(),
                },
                _ => AssetEvent::Changed {
                    uuid: asset.uuid_addr(),
                    url: asset.url(),
                },
            });
        }

        self.schedule_dependants(asset);
    }

    fn run_meta_migrations(
        &self,
        asset: &mut Asset,
        importer: &dyn Importer,
        stored_version: &str,
    ) -> std::result::Result<(), crate::importer::BoxError> {
        let target = importer.version();
        for step in importer.migrations() {
            if compare_versions(step.version, stored_version) == Ordering::Greater
                && compare_versions(step.version, target) != Ordering::Greater
            {
                debug!(
                    "Migrating {} meta to v{} via '{}'",
                    asset.url(),
                    step.version,
                    importer.name()
                );
                (step.apply)(&mut asset.meta)?;
                asset.meta.version = step.version.to_string();
            }
        }
        Ok(())
    }

    async fn destroy_asset(self: &Arc<Self>, asset: &mut Asset) {
        info!("Destroying asset {} ({:?})", asset.uuid_addr(), asset.source);

        let uuids = collect_uuids(asset);
        let forms = asset.address_forms();

        {
            let mut deps = self.deps.lock();
            asset.reset(&mut deps);
        }
        asset.clear_recycle();
        let _ = std::fs::remove_dir_all(asset.library_base());

        if let Err(e) = self.meta_store.remove(&asset.source) {
            warn!("Failed to remove sidecar for {:?}: {}", asset.source, e);
        }
        for uuid in uuids {
            self.user_data.clear_asset(&uuid);
        }
        self.user_data.mark_dirty();

        self.emit(AssetEvent::Deleted {
            uuid: asset.uuid_addr(),
            url: asset.url(),
        });

        // Dependants of a deleted asset re-import (and typically go
        // invalid or fall back) exactly like dependants of a change.
        for form in &forms {
            let dependants = self.deps.lock().dependants_of(std::slice::from_ref(form));
            for dependant in dependants {
                let _ = self.cascade.send(dependant);
            }
        }
    }

    fn schedule_dependants(&self, asset: &Asset) {
        let forms = asset.address_forms();
        let dependants = self.deps.lock().dependants_of(&forms);
        for dependant in dependants {
            debug!("Scheduling dependant {} of {}", dependant, asset.uuid_addr());
            let _ = self.cascade.send(dependant);
        }
    }

    fn emit(&self, event: AssetEvent) {
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Reimport and dependencies
    // ------------------------------------------------------------------

    /// Re-run the importer for an asset outside the scan diff, bypassing
    /// the dirty check. Blocks until the scheduled work drains.
    pub async fn reimport(self: &Arc<Self>, addr: &str) -> Result<()> {
        self.wait_unpaused().await;
        let _guard = self.scan_lock.lock().await;

        let handle = self
            .resolve_handle(&AssetAddr::parse(addr)?)
            .await
            .ok_or_else(|| DatabaseError::NotFound(addr.to_string()))?;

        let uuid = handle.lock().await.meta.uuid;
        self.enqueue(uuid, handle, true);
        self.queue.wait_idle().await;
        Ok(())
    }

    /// Record that `asset` depends on `value`. The edge is refused (and
    /// logged) when it would close a cycle.
    pub async fn depend(&self, asset: &Asset, value: &str) -> bool {
        let maps = self.maps.read().await;
        let resolve = |key: &str| -> Option<String> {
            let uuid = match AssetAddr::parse(key).ok()? {
                AssetAddr::Path(p) => *maps.uuid_of_path.get(&p)?,
                AssetAddr::Uuid { uuid, .. } => uuid,
                AssetAddr::Url { db, rel_path, .. } => {
                    if db != self.options.name {
                        return None;
                    }
                    *maps.uuid_of_path.get(&self.options.target.join(rel_path))?
                }
            };
            Some(uuid.to_string())
        };

        self.deps
            .lock()
            .depend(&asset.uuid_addr(), value, resolve)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    async fn resolve_handle(&self, addr: &AssetAddr) -> Option<AssetHandle> {
        let maps = self.maps.read().await;
        match addr {
            AssetAddr::Path(p) => maps.by_path.get(p).cloned(),
            AssetAddr::Uuid { uuid, .. } => maps.by_uuid.get(uuid).cloned(),
            AssetAddr::Url { db, rel_path, .. } => {
                if db != &self.options.name {
                    return None;
                }
                maps.by_path
                    .get(&self.options.target.join(rel_path))
                    .cloned()
            }
        }
    }

    /// Whether this database can own the given address.
    pub fn owns(&self, addr: &AssetAddr) -> bool {
        match addr {
            AssetAddr::Path(p) => p.starts_with(&self.options.target),
            AssetAddr::Url { db, .. } => db == &self.options.name,
            AssetAddr::Uuid { .. } => true,
        }
    }

    /// Snapshot an asset's state by any address form. Child chains
    /// resolve into the virtual asset tree.
    pub async fn query_asset(&self, addr: &str) -> Result<AssetInfo> {
        let parsed = AssetAddr::parse(addr)?;
        let handle = self
            .resolve_handle(&parsed)
            .await
            .ok_or_else(|| DatabaseError::NotFound(addr.to_string()))?;
        let asset = handle.lock().await;
        let node = asset
            .find_child(parsed.children())
            .ok_or_else(|| DatabaseError::NotFound(addr.to_string()))?;
        Ok(AssetInfo::of(node))
    }

    /// Source path for an address.
    pub async fn query_path(&self, addr: &str) -> Result<PathBuf> {
        Ok(self.query_asset(addr).await?.source)
    }

    /// Url form for an address.
    pub async fn query_url(&self, addr: &str) -> Result<String> {
        Ok(self.query_asset(addr).await?.url)
    }

    /// Identifier form for an address.
    pub async fn query_uuid(&self, addr: &str) -> Result<String> {
        Ok(self.query_asset(addr).await?.uuid)
    }

    /// Shared handle for an address (root asset of the tree).
    pub async fn find_asset(&self, addr: &str) -> Option<AssetHandle> {
        let parsed = AssetAddr::parse(addr).ok()?;
        self.resolve_handle(&parsed).await
    }

    /// Aggregate counts over all tracked assets.
    pub async fn stats(&self) -> DatabaseStats {
        // Snapshot the handles first; holding the maps guard while
        // awaiting asset locks could wedge against a classification pass.
        let handles: Vec<AssetHandle> = {
            let maps = self.maps.read().await;
            maps.by_path.values().cloned().collect()
        };

        let mut stats = DatabaseStats::default();
        for handle in handles {
            let asset = handle.lock().await;
            stats.assets += 1;
            stats.virtual_assets += count_children(&asset);
            if asset.meta.imported {
                stats.imported += 1;
            }
            if asset.invalid {
                stats.invalid += 1;
            }
        }
        stats
    }
}

enum AddOutcome {
    Added,
    Moved,
    Restored,
}

fn count_children(asset: &Asset) -> usize {
    asset
        .sub_assets
        .values()
        .map(|c| 1 + count_children(c))
        .sum()
}

fn collect_uuids(asset: &Asset) -> Vec<Uuid> {
    let mut out = vec![asset.meta.uuid];
    for child in asset.sub_assets.values() {
        out.extend(collect_uuids(child));
    }
    out
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> AssetDatabaseOptions {
        let target = dir.path().join("assets");
        std::fs::create_dir_all(&target).unwrap();
        AssetDatabaseOptions::new(
            "project",
            target,
            dir.path().join("library"),
            dir.path().join("temp"),
        )
    }

    #[tokio::test]
    async fn test_new_rejects_missing_target() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.target = dir.path().join("nope");

        let err = AssetDatabase::new(opts).err().unwrap();
        assert!(matches!(err, DatabaseError::Config(_)));
    }

    #[tokio::test]
    async fn test_new_rejects_empty_name() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.name = String::new();

        assert!(AssetDatabase::new(opts).is_err());
    }

    #[tokio::test]
    async fn test_matches_skips_sidecars_and_ignored() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.ignore = vec!["*.bak".to_string(), "editor/**".to_string()];
        let target = opts.target.clone();
        let db = AssetDatabase::new(opts).unwrap();

        assert!(db.matches(&target.join("a.png")));
        assert!(!db.matches(&target.join("a.png.meta")));
        assert!(!db.matches(&target.join("old.bak")));
        assert!(!db.matches(&target.join("editor/layout.json")));
        assert!(db.matches(&target.join("sub/b.txt")));
    }

    #[tokio::test]
    async fn test_include_globs_restrict() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.include = vec!["**/*.png".to_string()];
        let target = opts.target.clone();
        let db = AssetDatabase::new(opts).unwrap();

        assert!(db.matches(&target.join("tex/a.png")));
        assert!(!db.matches(&target.join("notes.txt")));
    }

    #[tokio::test]
    async fn test_pause_blocks_refresh_until_resume() {
        let dir = TempDir::new().unwrap();
        let db = AssetDatabase::new(options(&dir)).unwrap();
        db.pause().await;

        let db2 = Arc::clone(&db);
        let target = db.options().target.clone();
        let task = tokio::spawn(async move { db2.refresh(&target).await });

        // The refresh must not complete while paused.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        db.resume();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[tokio::test]
    async fn test_owns_address_forms() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir);
        let target = opts.target.clone();
        let db = AssetDatabase::new(opts).unwrap();

        assert!(db.owns(&AssetAddr::parse("db://project/a.png").unwrap()));
        assert!(!db.owns(&AssetAddr::parse("db://other/a.png").unwrap()));
        assert!(db.owns(&AssetAddr::Path(target.join("a.png"))));
        assert!(!db.owns(&AssetAddr::Path(PathBuf::from("/elsewhere/a.png"))));
    }
}
