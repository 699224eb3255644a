//! Curator Core - incremental asset database engine
//!
//! This crate provides the import engine:
//! - Tree scanning and add/change/delete/no-op diffing against cached state
//! - Sidecar meta records as the source of truth for asset identity
//! - Bounded-concurrency import scheduling with crash-safe on-disk caches
//! - A cross-asset dependency graph driving cascading reimports
//! - Schema migration for every versioned cache record

// Implemented modules
pub mod address;
pub mod asset;
pub mod database;
pub mod deps;
pub mod importer;
pub mod meta;
pub mod migrate;
pub mod mtime;
pub mod queue;
pub mod registry;
pub mod userdata;

// Re-exports for convenience
pub use address::{format_url, format_uuid, AddressError, AssetAddr};
pub use asset::{Action, Asset, AssetError, AssetRoots};
pub use database::{
    AssetDatabase, AssetDatabaseOptions, AssetEvent, AssetHandle, AssetInfo, DatabaseError,
    DatabaseStats, ImportContext, RefreshSummary, DEFAULT_WATCHDOG,
};
pub use deps::{DependencyGraph, DepsError};
pub use importer::{BoxError, Importer, ImporterRegistry, MetaMigration, CATCH_ALL};
pub use meta::{Meta, MetaError, MetaStore, META_SCHEMA_VERSION};
pub use migrate::{compare_versions, MigrateError, MigrationStep, Migrator};
pub use mtime::{mtime_ms, MtimeCache, MtimeEntry, MtimeState};
pub use queue::{QueueStats, TaskQueue, DEFAULT_CONCURRENCY};
pub use registry::DatabaseRegistry;
pub use userdata::{UserDataStore, DEFAULT_DEBOUNCE};
