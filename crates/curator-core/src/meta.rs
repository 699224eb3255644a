//! Sidecar meta records
//!
//! Every source file owns a `<file>.meta` JSON sidecar holding its
//! permanent identifier, the importer that processed it, the artifacts it
//! produced, and an opaque user-data bag. The sidecar is the source of
//! truth for identifier assignment: a file keeps the uuid written next to
//! it even when it moves between directories or machines.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::migrate::{MigrateError, MigrationStep, Migrator};

/// Sidecar schema version. v2 keys `subMetas` by child id instead of
/// display name.
pub const META_SCHEMA_VERSION: u32 = 2;

/// Errors that can occur reading or writing sidecar records.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("failed to read sidecar '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write sidecar '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sidecar '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("sidecar migration failed for '{path}': {source}")]
    Migrate {
        path: PathBuf,
        #[source]
        source: MigrateError,
    },
}

pub type Result<T> = std::result::Result<T, MetaError>;

/// Per-source-file sidecar record.
///
/// `version` is the semantic version of the importer that last processed
/// the file; `ver_code` its monotonic version code. `files` lists the
/// artifact names written under the asset's library directory and is the
/// authoritative cleanup list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    /// Sidecar schema version (migrated on load).
    pub meta_ver: u32,
    /// Importer semantic version at last import.
    pub version: String,
    /// Importer version code at last import.
    pub ver_code: u32,
    /// Name of the importer that owns this asset.
    #[serde(rename = "importerName")]
    pub importer: String,
    /// Permanent identifier; globally unique across the database.
    #[serde(rename = "identifier")]
    pub uuid: Uuid,
    /// Artifact names produced under the library tree.
    #[serde(rename = "producedFiles")]
    pub files: Vec<String>,
    /// Metas of virtual child assets, keyed by child id.
    pub sub_metas: BTreeMap<String, Meta>,
    /// Opaque per-asset bag owned by the importer.
    pub user_data: serde_json::Map<String, Value>,
    /// Whether the last import pass completed with artifacts.
    pub imported: bool,
    /// Human-readable name (file stem for root assets).
    pub display_name: String,
    /// Child id (virtual assets only).
    #[serde(rename = "childId")]
    pub id: String,
    /// Child name as given to `create_sub_asset` (virtual assets only).
    #[serde(rename = "childName")]
    pub name: String,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            meta_ver: META_SCHEMA_VERSION,
            version: String::new(),
            ver_code: 0,
            importer: "*".to_string(),
            uuid: Uuid::nil(),
            files: Vec::new(),
            sub_metas: BTreeMap::new(),
            user_data: serde_json::Map::new(),
            imported: false,
            display_name: String::new(),
            id: String::new(),
            name: String::new(),
        }
    }
}

impl Meta {
    /// Create a fresh record with a newly minted identifier.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Whether this record has ever been assigned an identifier.
    pub fn has_uuid(&self) -> bool {
        !self.uuid.is_nil()
    }
}

fn migrate_v2(value: &mut Value) -> std::result::Result<(), MigrateError> {
    // v1 kept subMetas keyed by display name; rekey by the child id
    // recorded inside each entry.
    if let Some(subs) = value.get_mut("subMetas").and_then(Value::as_object_mut) {
        let entries: Vec<(String, Value)> = subs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        subs.clear();
        for (old_key, entry) in entries {
            let key = entry
                .get("childId")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(old_key);
            subs.insert(key, entry);
        }
    }
    Ok(())
}

fn sidecar_migrator() -> Migrator {
    Migrator::with_field(
        "metaVer",
        META_SCHEMA_VERSION,
        vec![MigrationStep {
            to_version: 2,
            apply: migrate_v2,
        }],
    )
}

/// Reads and writes `<source>.meta` sidecars for one database.
pub struct MetaStore {
    migrator: Migrator,
    read_only: bool,
}

impl Default for MetaStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MetaStore {
    pub fn new(read_only: bool) -> Self {
        Self {
            migrator: sidecar_migrator(),
            read_only,
        }
    }

    /// Sidecar path for a source file: the full file name plus `.meta`.
    pub fn meta_path(source: &Path) -> PathBuf {
        let mut name = source
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".meta");
        source.with_file_name(name)
    }

    /// Modification time of the sidecar file, in milliseconds.
    pub fn sidecar_mtime(source: &Path) -> Option<u64> {
        crate::mtime::mtime_ms(&Self::meta_path(source))
    }

    /// Load the sidecar for a source file, migrating old schemas.
    ///
    /// Returns `Ok(None)` when no sidecar exists.
    pub fn load(&self, source: &Path) -> Result<Option<Meta>> {
        let path = Self::meta_path(source);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MetaError::Read { path, source: e }),
        };

        let mut value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| MetaError::Parse {
                path: path.clone(),
                source: e,
            })?;

        self.migrator
            .upgrade(&mut value)
            .map_err(|e| MetaError::Migrate {
                path: path.clone(),
                source: e,
            })?;

        let meta: Meta = serde_json::from_value(value).map_err(|e| MetaError::Parse {
            path,
            source: e,
        })?;
        Ok(Some(meta))
    }

    /// Load the sidecar, or create a fresh record with a minted uuid.
    ///
    /// Returns the record and whether it was newly created. A sidecar that
    /// parses but carries a nil identifier also gets a fresh uuid. Newly
    /// created records are written back immediately so the identifier is
    /// durable before any import runs.
    pub fn read_or_create(&self, source: &Path) -> Result<(Meta, bool)> {
        let display_name = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match self.load(source) {
            Ok(Some(mut meta)) => {
                if !meta.has_uuid() {
                    meta.uuid = Uuid::new_v4();
                    self.write(source, &meta)?;
                    return Ok((meta, true));
                }
                if meta.display_name.is_empty() {
                    meta.display_name = display_name;
                }
                Ok((meta, false))
            }
            Ok(None) => {
                let meta = Meta::new(display_name);
                self.write(source, &meta)?;
                Ok((meta, true))
            }
            Err(e) => {
                // A corrupt sidecar degrades to a fresh record; the old
                // bytes are overwritten on the next write.
                warn!("Unreadable sidecar for {:?}: {}", source, e);
                let meta = Meta::new(display_name);
                self.write(source, &meta)?;
                Ok((meta, true))
            }
        }
    }

    /// Write the sidecar for a source file.
    ///
    /// Serializes with 2-space indentation, preserves the existing file's
    /// line-ending style, and skips byte-identical writes so unchanged
    /// records don't churn the sidecar's mtime. Returns whether a write
    /// happened.
    pub fn write(&self, source: &Path, meta: &Meta) -> Result<bool> {
        if self.read_only {
            return Ok(false);
        }

        let path = Self::meta_path(source);
        let existing = fs::read(&path).ok();

        let mut text = serde_json::to_string_pretty(meta).map_err(|e| MetaError::Parse {
            path: path.clone(),
            source: e,
        })?;
        text.push('\n');

        if let Some(ref bytes) = existing {
            if bytes.windows(2).any(|w| w == b"\r\n") {
                text = text.replace('\n', "\r\n");
            }
            if bytes.as_slice() == text.as_bytes() {
                debug!("Sidecar unchanged, skipping write: {:?}", path);
                return Ok(false);
            }
        }

        fs::write(&path, text.as_bytes()).map_err(|e| MetaError::Write { path, source: e })?;
        Ok(true)
    }

    /// Delete the sidecar for a source file. Missing sidecars are not an
    /// error.
    pub fn remove(&self, source: &Path) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let path = Self::meta_path(source);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MetaError::Write { path, source: e }),
        }
    }
}
