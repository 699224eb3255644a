//! Schema migration for versioned JSON records
//!
//! Every on-disk cache (sidecar metas, the mtime cache, the dependency
//! cache, the auxiliary data cache) is a versioned JSON record. Before a
//! loaded record is trusted, it is passed through a [`Migrator`]: an
//! ordered chain of upgrade steps that bring old records up to the current
//! schema version in place.

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while migrating a record.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// The record is not a JSON object
    #[error("record is not a JSON object")]
    NotAnObject,

    /// A migration step failed
    #[error("migration to version {version} failed: {message}")]
    StepFailed { version: u32, message: String },
}

impl MigrateError {
    /// Create a StepFailed error.
    pub fn step_failed(version: u32, message: impl Into<String>) -> Self {
        Self::StepFailed {
            version,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;

/// A single upgrade step: brings a record to `to_version`.
pub struct MigrationStep {
    /// Version the record has after this step runs.
    pub to_version: u32,
    /// In-place mutation of the record body.
    pub apply: fn(&mut Value) -> Result<()>,
}

/// Ordered chain of schema-upgrade steps.
///
/// Records carry their schema version in a top-level field (`version` by
/// default); a missing field is treated as version 0. Steps are applied
/// strictly in ascending order, and the version field is advanced after
/// each one, so an interrupted caller that persists a partially-migrated
/// record still round-trips correctly.
pub struct Migrator {
    current_version: u32,
    version_field: &'static str,
    steps: Vec<MigrationStep>,
}

impl Migrator {
    /// Create a migrator targeting `current_version` with the given steps.
    ///
    /// Steps must be sorted by `to_version`; this is asserted in debug
    /// builds.
    pub fn new(current_version: u32, steps: Vec<MigrationStep>) -> Self {
        Self::with_field("version", current_version, steps)
    }

    /// Create a migrator that stores the schema version under a custom
    /// field name. Sidecar records use this because their `version` field
    /// holds the importer's semantic version string.
    pub fn with_field(
        version_field: &'static str,
        current_version: u32,
        steps: Vec<MigrationStep>,
    ) -> Self {
        debug_assert!(steps.windows(2).all(|w| w[0].to_version < w[1].to_version));
        Self {
            current_version,
            version_field,
            steps,
        }
    }

    /// The schema version this migrator upgrades records to.
    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    /// Read a record's stored schema version (0 when absent).
    pub fn record_version(&self, value: &Value) -> u32 {
        value
            .get(self.version_field)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(0)
    }

    /// Upgrade a record in place.
    ///
    /// Returns `true` if any step ran. A record already at (or beyond) the
    /// current version is left untouched.
    pub fn upgrade(&self, value: &mut Value) -> Result<bool> {
        if !value.is_object() {
            return Err(MigrateError::NotAnObject);
        }

        let stored = self.record_version(value);
        if stored >= self.current_version {
            return Ok(false);
        }

        let mut ran = false;
        for step in &self.steps {
            if step.to_version <= stored {
                continue;
            }
            debug!(
                "Migrating record from v{} to v{}",
                self.record_version(value),
                step.to_version
            );
            (step.apply)(value)?;
            value[self.version_field] = Value::from(step.to_version);
            ran = true;
        }

        // Records older than the first step (or with no steps at all) are
        // stamped to the current version once, so they don't re-migrate.
        value[self.version_field] = Value::from(self.current_version);
        Ok(ran)
    }
}

/// Compare two dotted version strings segment-wise and numerically.
///
/// Missing segments count as zero, so `"1.2" == "1.2.0"`. Non-numeric
/// segments compare as zero; importer authors are expected to use plain
/// numeric versions.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|seg| seg.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };

    let va = parse(a);
    let vb = parse(b);
    let len = va.len().max(vb.len());

    for i in 0..len {
        let x = va.get(i).copied().unwrap_or(0);
        let y = vb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upgrade_runs_steps_in_order() {
        let migrator = Migrator::new(
            2,
            vec![
                MigrationStep {
                    to_version: 1,
                    apply: |v| {
                        v["a"] = json!(1);
                        Ok(())
                    },
                },
                MigrationStep {
                    to_version: 2,
                    apply: |v| {
                        // Relies on the previous step having run
                        let a = v["a"].as_u64().unwrap();
                        v["b"] = json!(a + 1);
                        Ok(())
                    },
                },
            ],
        );

        let mut record = json!({});
        let ran = migrator.upgrade(&mut record).unwrap();

        assert!(ran);
        assert_eq!(record["version"], json!(2));
        assert_eq!(record["a"], json!(1));
        assert_eq!(record["b"], json!(2));
    }

    #[test]
    fn test_upgrade_skips_completed_steps() {
        let migrator = Migrator::new(
            2,
            vec![
                MigrationStep {
                    to_version: 1,
                    apply: |_| panic!("must not run"),
                },
                MigrationStep {
                    to_version: 2,
                    apply: |v| {
                        v["b"] = json!(true);
                        Ok(())
                    },
                },
            ],
        );

        let mut record = json!({"version": 1});
        migrator.upgrade(&mut record).unwrap();

        assert_eq!(record["version"], json!(2));
        assert_eq!(record["b"], json!(true));
    }

    #[test]
    fn test_upgrade_current_record_untouched() {
        let migrator = Migrator::new(1, vec![]);
        let mut record = json!({"version": 1, "data": "x"});
        let ran = migrator.upgrade(&mut record).unwrap();

        assert!(!ran);
        assert_eq!(record, json!({"version": 1, "data": "x"}));
    }

    #[test]
    fn test_upgrade_stamps_unversioned_record() {
        let migrator = Migrator::new(3, vec![]);
        let mut record = json!({"data": "x"});
        migrator.upgrade(&mut record).unwrap();

        assert_eq!(record["version"], json!(3));
    }

    #[test]
    fn test_upgrade_rejects_non_object() {
        let migrator = Migrator::new(1, vec![]);
        let mut record = json!([1, 2, 3]);
        assert!(migrator.upgrade(&mut record).is_err());
    }

    #[test]
    fn test_failed_step_aborts() {
        let migrator = Migrator::new(
            2,
            vec![
                MigrationStep {
                    to_version: 1,
                    apply: |_| Err(MigrateError::step_failed(1, "bad record")),
                },
                MigrationStep {
                    to_version: 2,
                    apply: |v| {
                        v["b"] = json!(true);
                        Ok(())
                    },
                },
            ],
        );

        let mut record = json!({});
        let err = migrator.upgrade(&mut record);

        assert!(err.is_err());
        assert!(record.get("b").is_none());
    }

    #[test]
    fn test_custom_version_field() {
        let migrator = Migrator::with_field(
            "metaVer",
            2,
            vec![MigrationStep {
                to_version: 2,
                apply: |v| {
                    v["renamed"] = v["legacy"].take();
                    Ok(())
                },
            }],
        );

        // The string `version` field must survive untouched.
        let mut record = json!({"metaVer": 1, "version": "1.0.3", "legacy": "x"});
        migrator.upgrade(&mut record).unwrap();

        assert_eq!(record["metaVer"], json!(2));
        assert_eq!(record["version"], json!("1.0.3"));
        assert_eq!(record["renamed"], json!("x"));
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.2"), Ordering::Greater);
        assert_eq!(compare_versions("0.9", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("2", "1.9.9"), Ordering::Greater);
    }
}
