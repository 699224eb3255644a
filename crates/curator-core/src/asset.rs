//! Asset entity model
//!
//! An [`Asset`] is the in-memory representation of one tracked source
//! file, or of a file-less virtual child produced by its parent's import.
//! It owns the sidecar record, the current action state, and the derived
//! library/temp storage paths. Virtual children are owned by their parent
//! and addressed by a child-id chain appended to the root identifier.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::address::{format_url, format_uuid};
use crate::deps::DependencyGraph;
use crate::meta::Meta;

/// How many child-id prefix lengths are probed before giving up.
const CHILD_ID_PROBES: usize = 25;

/// Base child-id length in hex characters.
const CHILD_ID_LEN: usize = 6;

/// Errors raised by the entity model.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not derive a unique child id for '{name}'")]
    ChildIdExhausted { name: String },

    #[error("no sub asset with id '{0}'")]
    NoSuchChild(String),
}

pub type Result<T> = std::result::Result<T, AssetError>;

/// Pending work for an asset, decided by the scan diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Nothing to do.
    #[default]
    None,
    /// Newly discovered; run the importer.
    Add,
    /// Content or sidecar changed; run the importer.
    Change,
    /// Source disappeared; remove artifacts and forget the asset.
    Delete,
}

/// Identity and filesystem context shared by an asset tree.
///
/// Cloned into every virtual child so path derivation never needs a
/// parent back-pointer.
#[derive(Debug, Clone)]
pub struct AssetRoots {
    pub db_name: String,
    pub target: PathBuf,
    pub library: PathBuf,
    pub temp: PathBuf,
}

/// One tracked source file, or a virtual child of one.
#[derive(Debug)]
pub struct Asset {
    /// Absolute source path. Virtual children carry their root's path.
    pub source: PathBuf,
    /// Sidecar record (for virtual children: the sub-meta).
    pub meta: Meta,
    /// Pending work decided by the last classification.
    pub action: Action,
    /// Set when no importer matches or the importer failed; cleared by a
    /// successful import.
    pub invalid: bool,
    /// Whether this asset completed at least one import pass this session.
    pub init: bool,
    /// Virtual children keyed by child id.
    pub sub_assets: BTreeMap<String, Asset>,
    /// Metas of children discarded during the current import pass, keyed
    /// by child id. Recreating a child with the same id and importer
    /// reuses its prior user data. Cleared when the pass completes.
    recycle: HashMap<String, Meta>,
    /// Root identifier of the tree this asset belongs to. For root assets
    /// this mirrors `meta.uuid`.
    root_uuid: Uuid,
    /// Child-id chain from the root (empty for root assets).
    chain: Vec<String>,
    roots: AssetRoots,
    /// Tracks the once-per-asset "no importer" warning.
    pub no_importer_logged: bool,
}

impl Asset {
    /// Create a root asset for a source file.
    pub fn new(roots: AssetRoots, source: impl Into<PathBuf>, meta: Meta) -> Self {
        let root_uuid = meta.uuid;
        Self {
            source: source.into(),
            meta,
            action: Action::None,
            invalid: false,
            init: false,
            sub_assets: BTreeMap::new(),
            recycle: HashMap::new(),
            root_uuid,
            chain: Vec::new(),
            roots,
            no_importer_logged: false,
        }
    }

    pub fn is_virtual(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Identifier of the root of this asset tree.
    pub fn root_uuid(&self) -> Uuid {
        if self.chain.is_empty() {
            self.meta.uuid
        } else {
            self.root_uuid
        }
    }

    /// Must be called after reassigning a root asset's identifier
    /// (collision resolution) so derived paths follow.
    pub fn sync_root_uuid(&mut self) {
        if self.chain.is_empty() {
            self.root_uuid = self.meta.uuid;
        }
    }

    /// Child-id chain from the root asset (empty for roots).
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn db_name(&self) -> &str {
        &self.roots.db_name
    }

    /// Source path relative to the database target root.
    pub fn rel_path(&self) -> PathBuf {
        self.source
            .strip_prefix(&self.roots.target)
            .unwrap_or(&self.source)
            .to_path_buf()
    }

    /// The `db://` url form of this asset.
    pub fn url(&self) -> String {
        format_url(&self.roots.db_name, &self.rel_path(), &self.chain)
    }

    /// The identifier address form (`<rootUuid>[@child]*`).
    pub fn uuid_addr(&self) -> String {
        format_uuid(&self.root_uuid(), &self.chain)
    }

    /// Every address form of this asset, for dependency fan-out lookups.
    /// Virtual children have no standalone path form.
    pub fn address_forms(&self) -> Vec<String> {
        let mut forms = vec![self.uuid_addr(), self.url()];
        if !self.is_virtual() {
            forms.push(self.source.to_string_lossy().to_string());
        }
        forms
    }

    fn storage_name(&self) -> String {
        let mut name = self.root_uuid().to_string();
        for id in &self.chain {
            name.push('@');
            name.push_str(id);
        }
        name
    }

    /// Library storage base: `<library>/<uuid[0:2]>/<uuid>[@child]*`.
    pub fn library_base(&self) -> PathBuf {
        let root = self.root_uuid().to_string();
        self.roots.library.join(&root[0..2]).join(self.storage_name())
    }

    /// Temp storage base, same shape under the temp root.
    pub fn temp_base(&self) -> PathBuf {
        let root = self.root_uuid().to_string();
        self.roots.temp.join(&root[0..2]).join(self.storage_name())
    }

    /// Resolve a produced-file name against the library base.
    ///
    /// Names beginning with `.` are extensions appended to the base
    /// (`.png` → `<base>.png`); other names are files inside the base
    /// directory (`mesh/lod0.bin` → `<base>/mesh/lod0.bin`).
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        let base = self.library_base();
        if let Some(ext) = name.strip_prefix('.') {
            let mut s = base.into_os_string();
            s.push(".");
            s.push(ext);
            PathBuf::from(s)
        } else {
            base.join(name)
        }
    }

    /// Record a produced artifact name in the sidecar's cleanup list.
    pub fn record_file(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.meta.files.contains(&name) {
            self.meta.files.push(name);
        }
    }

    /// Remove every produced artifact, recursively reset virtual children
    /// into the recycle bin, and clear this asset's dependency edges.
    ///
    /// Idempotent: a second call finds nothing to remove.
    pub fn reset(&mut self, deps: &mut DependencyGraph) {
        for name in std::mem::take(&mut self.meta.files) {
            let path = self.artifact_path(&name);
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed artifact {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove artifact {:?}: {}", path, e),
            }
        }
        // Directory-shaped artifacts leave an empty base dir behind.
        let _ = fs::remove_dir_all(self.temp_base());
        let _ = fs::remove_dir(self.library_base());

        let children = std::mem::take(&mut self.sub_assets);
        for (id, mut child) in children {
            child.reset(deps);
            self.recycle.insert(id, child.meta);
        }

        deps.clear_asset(&self.uuid_addr());
        self.meta.imported = false;
    }

    /// Create (or recreate) a virtual child asset.
    ///
    /// The child id is a lossy hash of `name`; on collision with a
    /// different name, longer hash prefixes are probed. A recycled meta
    /// with the same id and importer is reused with a refreshed
    /// identifier and display name, so a child destroyed and recreated
    /// within one pass keeps its user data.
    pub fn create_sub_asset(&mut self, name: &str, importer: &str) -> Result<&mut Asset> {
        let id = self.derive_child_id(name)?;

        if self.sub_assets.contains_key(&id) {
            // Same logical child created twice in one pass.
            return Ok(self.sub_assets.get_mut(&id).unwrap());
        }

        let meta = match self.recycle.remove(&id) {
            Some(mut recycled) if recycled.importer == importer => {
                recycled.uuid = Uuid::new_v4();
                recycled.display_name = name.to_string();
                recycled.imported = false;
                recycled
            }
            other => {
                // A recycled meta for a different importer is discarded.
                drop(other);
                let mut meta = Meta::new(name);
                meta.importer = importer.to_string();
                meta.id = id.clone();
                meta.name = name.to_string();
                meta
            }
        };

        let mut chain = self.chain.clone();
        chain.push(id.clone());
        let child = Asset {
            source: self.source.clone(),
            meta,
            action: Action::None,
            invalid: false,
            init: false,
            sub_assets: BTreeMap::new(),
            recycle: HashMap::new(),
            root_uuid: self.root_uuid(),
            chain,
            roots: self.roots.clone(),
            no_importer_logged: false,
        };

        self.sub_assets.insert(id.clone(), child);
        Ok(self.sub_assets.get_mut(&id).unwrap())
    }

    /// Derive the child id for a name, probing longer prefixes when a
    /// different name already owns the shorter one.
    fn derive_child_id(&self, name: &str) -> Result<String> {
        let digest = Sha256::digest(name.as_bytes());
        let hex = format!("{:x}", digest);

        for probe in 0..CHILD_ID_PROBES {
            let id = &hex[..CHILD_ID_LEN + probe];
            match self.sub_assets.get(id) {
                Some(existing) if existing.meta.name != name => continue,
                _ => return Ok(id.to_string()),
            }
        }
        Err(AssetError::ChildIdExhausted {
            name: name.to_string(),
        })
    }

    /// Look up a nested child by id chain.
    pub fn find_child(&self, chain: &[String]) -> Option<&Asset> {
        let mut current = self;
        for id in chain {
            current = current.sub_assets.get(id)?;
        }
        Some(current)
    }

    /// Drop recycled metas once an import pass completes.
    pub fn clear_recycle(&mut self) {
        self.recycle.clear();
    }

    /// Sub-meta snapshot for the sidecar: mirrors the live children.
    pub fn collect_sub_metas(&self) -> BTreeMap<String, Meta> {
        self.sub_assets
            .iter()
            .map(|(id, child)| {
                let mut meta = child.meta.clone();
                meta.sub_metas = child.collect_sub_metas();
                (id.clone(), meta)
            })
            .collect()
    }
}
