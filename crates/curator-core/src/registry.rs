//! Database registry
//!
//! A process may host several independently-rooted databases (engine
//! internals, the open project, plugins). The registry is the explicit
//! name table that global address resolution runs against; databases
//! register on `start` and unregister on `stop`. There is no process-wide
//! state: collaborators hold a registry and pass it where resolution is
//! needed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::address::AssetAddr;
use crate::database::{AssetDatabase, AssetInfo, DatabaseError, RefreshSummary, Result};

/// Name table of live databases.
pub struct DatabaseRegistry {
    databases: RwLock<HashMap<String, Arc<AssetDatabase>>>,
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Register a database under its configured name. Re-registering a
    /// name replaces the previous entry.
    pub async fn register(&self, db: Arc<AssetDatabase>) {
        let name = db.name().to_string();
        let mut databases = self.databases.write().await;
        if databases.insert(name.clone(), db).is_some() {
            warn!("Database '{}' re-registered", name);
        } else {
            info!("Registered database '{}'", name);
        }
    }

    /// Remove a database from the table. Does not stop it.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.databases.write().await.remove(name).is_some();
        if removed {
            info!("Unregistered database '{}'", name);
        } else {
            debug!("Database '{}' was not registered", name);
        }
        removed
    }

    pub async fn get(&self, name: &str) -> Option<Arc<AssetDatabase>> {
        self.databases.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        self.databases.read().await.len()
    }

    /// Find the database that owns an address.
    ///
    /// Urls dispatch by name and paths by target prefix; identifier
    /// addresses probe every database for a live asset.
    pub async fn resolve(&self, addr: &str) -> Result<Arc<AssetDatabase>> {
        let parsed = AssetAddr::parse(addr)?;
        let databases: Vec<Arc<AssetDatabase>> = {
            let map = self.databases.read().await;
            map.values().cloned().collect()
        };

        match &parsed {
            AssetAddr::Url { db, .. } => databases
                .into_iter()
                .find(|d| d.name() == db)
                .ok_or_else(|| DatabaseError::NotFound(addr.to_string())),
            AssetAddr::Path(_) => databases
                .into_iter()
                .find(|d| d.owns(&parsed))
                .ok_or_else(|| DatabaseError::NotFound(addr.to_string())),
            AssetAddr::Uuid { .. } => {
                for db in databases {
                    if db.find_asset(addr).await.is_some() {
                        return Ok(db);
                    }
                }
                Err(DatabaseError::NotFound(addr.to_string()))
            }
        }
    }

    /// Snapshot an asset's state by any address form, across databases.
    pub async fn query_asset(&self, addr: &str) -> Result<AssetInfo> {
        self.resolve(addr).await?.query_asset(addr).await
    }

    /// Source path for an address.
    pub async fn query_path(&self, addr: &str) -> Result<PathBuf> {
        self.resolve(addr).await?.query_path(addr).await
    }

    /// Url form for an address.
    pub async fn query_url(&self, addr: &str) -> Result<String> {
        self.resolve(addr).await?.query_url(addr).await
    }

    /// Identifier form for an address.
    pub async fn query_uuid(&self, addr: &str) -> Result<String> {
        self.resolve(addr).await?.query_uuid(addr).await
    }

    /// Dispatch a refresh to whichever database owns the address.
    pub async fn refresh(&self, addr: &str) -> Result<RefreshSummary> {
        let db = self.resolve(addr).await?;
        let path = db.query_path(addr).await.or_else(|_| {
            // A path address may point at a file not tracked yet.
            match AssetAddr::parse(addr)? {
                AssetAddr::Path(p) => Ok(p),
                _ => Err(DatabaseError::NotFound(addr.to_string())),
            }
        })?;
        db.refresh(&path).await
    }

    /// Dispatch a reimport to whichever database owns the address.
    pub async fn reimport(&self, addr: &str) -> Result<()> {
        self.resolve(addr).await?.reimport(addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::AssetDatabaseOptions;
    use tempfile::TempDir;

    fn options(dir: &TempDir, name: &str) -> AssetDatabaseOptions {
        let root = dir.path().join(name);
        std::fs::create_dir_all(root.join("assets")).unwrap();
        AssetDatabaseOptions::new(
            name,
            root.join("assets"),
            root.join("library"),
            root.join("temp"),
        )
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let dir = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        let db = AssetDatabase::new(options(&dir, "project")).unwrap();

        registry.register(Arc::clone(&db)).await;
        assert_eq!(registry.count().await, 1);
        assert!(registry.get("project").await.is_some());
        assert!(registry.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_unregister() {
        let dir = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        let db = AssetDatabase::new(options(&dir, "project")).unwrap();

        registry.register(db).await;
        assert!(registry.unregister("project").await);
        assert!(!registry.unregister("project").await);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_resolve_url_by_name() {
        let dir = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        registry
            .register(AssetDatabase::new(options(&dir, "internal")).unwrap())
            .await;
        registry
            .register(AssetDatabase::new(options(&dir, "project")).unwrap())
            .await;

        let db = registry.resolve("db://project/a.png").await.unwrap();
        assert_eq!(db.name(), "project");

        assert!(registry.resolve("db://missing/a.png").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_path_by_target_prefix() {
        let dir = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        let opts = options(&dir, "project");
        let inside = opts.target.join("a.png");
        registry
            .register(AssetDatabase::new(opts).unwrap())
            .await;

        let db = registry.resolve(inside.to_str().unwrap()).await.unwrap();
        assert_eq!(db.name(), "project");
    }

    #[tokio::test]
    async fn test_names_sorted() {
        let dir = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        registry
            .register(AssetDatabase::new(options(&dir, "zeta")).unwrap())
            .await;
        registry
            .register(AssetDatabase::new(options(&dir, "alpha")).unwrap())
            .await;

        assert_eq!(registry.names().await, vec!["alpha", "zeta"]);
    }
}
