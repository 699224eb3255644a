//! Importer contract and registry
//!
//! An importer is a pluggable strategy that transforms one source asset
//! into library artifacts. Importers are registered under a declared
//! identifier with a list of file extensions; resolution prefers the
//! asset's recorded importer, then extension matches, then catch-all
//! importers, scanning in reverse registration order so the most recently
//! registered importer wins ties. That lets an embedding application
//! override a default importer without unregistering it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::asset::Asset;
use crate::database::ImportContext;
use crate::meta::Meta;

/// Identifier of catch-all importers.
pub const CATCH_ALL: &str = "*";

/// Boxed error type for importer bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One sidecar upgrade step owned by an importer.
///
/// Steps run in order when an asset's stored version is older than the
/// importer's current version (and the importer name is unchanged). Each
/// step mutates the meta in place; the engine advances the recorded
/// version after it returns.
pub struct MetaMigration {
    /// Version the meta has after this step runs.
    pub version: &'static str,
    pub apply: fn(&mut Meta) -> Result<(), BoxError>,
}

/// A pluggable asset transformation.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Declared identifier. `"*"` marks a catch-all default importer.
    fn name(&self) -> &str;

    /// Semantic version. A change (in either direction) dirties every
    /// asset previously imported under another version; a downgrade is a
    /// warning unless the asset never completed initialization.
    fn version(&self) -> &str;

    /// Monotonic version code. Any change forces reimport regardless of
    /// content timestamps.
    fn version_code(&self) -> u32;

    /// Extensions handled, lowercase without the dot. Empty for importers
    /// matched only by name or as catch-all.
    fn extensions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Ordered sidecar upgrade steps.
    fn migrations(&self) -> Vec<MetaMigration> {
        Vec::new()
    }

    /// Whether this importer can handle the given asset.
    async fn validate(&self, _asset: &Asset) -> bool {
        true
    }

    /// Bypass the dirty check for this asset.
    async fn force(&self, _asset: &Asset) -> bool {
        false
    }

    /// Perform the transformation. Returning `Ok(false)` withholds the
    /// `imported` flag without treating the pass as an error.
    async fn import(&self, ctx: &ImportContext, asset: &mut Asset) -> Result<bool, BoxError>;

    /// Runs after this asset's virtual children finished importing.
    async fn after_sub_assets_import(&self, _ctx: &ImportContext, _asset: &mut Asset) {}

    /// Invoked when the watchdog considers an in-flight `import`
    /// unresponsive. A signal, not a cancellation.
    fn check_awake(&self) {}
}

/// Registry of importers for one database.
pub struct ImporterRegistry {
    importers: RwLock<Vec<Arc<dyn Importer>>>,
}

impl Default for ImporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self {
            importers: RwLock::new(Vec::new()),
        }
    }

    /// Register an importer. Registration order is preserved; later
    /// registrations win resolution ties.
    pub fn register(&self, importer: Arc<dyn Importer>) {
        debug!(
            "Registered importer '{}' ({:?})",
            importer.name(),
            importer.extensions()
        );
        self.importers.write().push(importer);
    }

    /// Look up an importer by declared identifier. With duplicates, the
    /// most recently registered wins.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Importer>> {
        self.importers
            .read()
            .iter()
            .rev()
            .find(|i| i.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.importers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.read().is_empty()
    }

    /// Resolve the best-matching importer for an asset.
    ///
    /// Order: (1) the asset's recorded importer by name, when it lists
    /// the asset's extension (virtual children match by name alone) and
    /// validates; (2) extension-registered importers, reverse
    /// registration order; (3) catch-all (`"*"`) importers, reverse
    /// registration order; (4) none.
    pub async fn find(&self, asset: &Asset) -> Option<Arc<dyn Importer>> {
        // Snapshot under the lock; validate() awaits outside it.
        let importers: Vec<Arc<dyn Importer>> = self.importers.read().clone();
        let ext = asset_extension(asset);

        let recorded = asset.meta.importer.as_str();
        if recorded != CATCH_ALL {
            if let Some(importer) = importers.iter().rev().find(|i| i.name() == recorded) {
                let ext_ok = asset.is_virtual()
                    || ext
                        .as_deref()
                        .is_some_and(|e| importer.extensions().iter().any(|x| x == e));
                if ext_ok && importer.validate(asset).await {
                    return Some(Arc::clone(importer));
                }
            }
        }

        if let Some(ref ext) = ext {
            for importer in importers.iter().rev() {
                if importer.extensions().iter().any(|x| x == ext)
                    && importer.validate(asset).await
                {
                    return Some(Arc::clone(importer));
                }
            }
        }

        for importer in importers.iter().rev() {
            if importer.name() == CATCH_ALL && importer.validate(asset).await {
                return Some(Arc::clone(importer));
            }
        }

        None
    }
}

/// Lowercased extension of an asset's source file.
pub fn asset_extension(asset: &Asset) -> Option<String> {
    asset
        .source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetRoots;
    use std::path::PathBuf;

    struct Fake {
        name: &'static str,
        exts: Vec<String>,
        valid: bool,
    }

    impl Fake {
        fn new(name: &'static str, exts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                exts: exts.iter().map(|s| s.to_string()).collect(),
                valid: true,
            })
        }

        fn invalid(name: &'static str, exts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                exts: exts.iter().map(|s| s.to_string()).collect(),
                valid: false,
            })
        }
    }

    #[async_trait]
    impl Importer for Fake {
        fn name(&self) -> &str {
            self.name
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn version_code(&self) -> u32 {
            1
        }
        fn extensions(&self) -> Vec<String> {
            self.exts.clone()
        }
        async fn validate(&self, _asset: &Asset) -> bool {
            self.valid
        }
        async fn import(&self, _ctx: &ImportContext, _asset: &mut Asset) -> Result<bool, BoxError> {
            Ok(true)
        }
    }

    fn asset_for(path: &str, importer: &str) -> Asset {
        let roots = AssetRoots {
            db_name: "p".to_string(),
            target: PathBuf::from("/t"),
            library: PathBuf::from("/l"),
            temp: PathBuf::from("/tmp"),
        };
        let mut meta = Meta::new("a");
        meta.importer = importer.to_string();
        Asset::new(roots, path, meta)
    }

    #[tokio::test]
    async fn test_recorded_name_wins() {
        let registry = ImporterRegistry::new();
        registry.register(Fake::new("image", &["png"]));
        registry.register(Fake::new("image-hd", &["png"]));

        let asset = asset_for("/t/a.png", "image");
        let found = registry.find(&asset).await.unwrap();
        assert_eq!(found.name(), "image");
    }

    #[tokio::test]
    async fn test_extension_match_reverse_order() {
        let registry = ImporterRegistry::new();
        registry.register(Fake::new("image", &["png"]));
        registry.register(Fake::new("image-hd", &["png"]));

        // No recorded importer: the later registration wins.
        let asset = asset_for("/t/a.png", "*");
        let found = registry.find(&asset).await.unwrap();
        assert_eq!(found.name(), "image-hd");
    }

    #[tokio::test]
    async fn test_invalid_recorded_falls_through() {
        let registry = ImporterRegistry::new();
        registry.register(Fake::new("other", &["png"]));
        registry.register(Fake::invalid("image", &["png"]));

        let asset = asset_for("/t/a.png", "image");
        let found = registry.find(&asset).await.unwrap();
        assert_eq!(found.name(), "other");
    }

    #[tokio::test]
    async fn test_catch_all_fallback() {
        let registry = ImporterRegistry::new();
        registry.register(Fake::new("*", &[]));
        registry.register(Fake::new("image", &["png"]));

        let asset = asset_for("/t/readme.txt", "*");
        let found = registry.find(&asset).await.unwrap();
        assert_eq!(found.name(), "*");
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let registry = ImporterRegistry::new();
        registry.register(Fake::new("image", &["png"]));

        let asset = asset_for("/t/readme.txt", "*");
        assert!(registry.find(&asset).await.is_none());
    }

    #[tokio::test]
    async fn test_recorded_name_requires_listed_extension() {
        let registry = ImporterRegistry::new();
        registry.register(Fake::new("image", &["png"]));
        registry.register(Fake::new("*", &[]));

        // Recorded importer doesn't handle .txt; falls to catch-all.
        let asset = asset_for("/t/notes.txt", "image");
        let found = registry.find(&asset).await.unwrap();
        assert_eq!(found.name(), "*");
    }

    #[test]
    fn test_get_latest_registration_wins() {
        let registry = ImporterRegistry::new();
        let first = Fake::new("image", &["png"]);
        let second = Fake::new("image", &["png", "jpg"]);
        registry.register(first);
        registry.register(second);

        let found = registry.get("image").unwrap();
        assert_eq!(found.extensions().len(), 2);
    }

    #[test]
    fn test_asset_extension_lowercase() {
        let asset = asset_for("/t/A.PNG", "*");
        assert_eq!(asset_extension(&asset).as_deref(), Some("png"));
    }
}
