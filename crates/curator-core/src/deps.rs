//! Cross-asset dependency graph
//!
//! Bidirectional index between assets and the values they depend on. An
//! asset records dependencies on arbitrary address values (a path, an
//! identifier, or a database url); when the asset behind a value is
//! successfully imported or deleted, every asset with an edge into that
//! value is scheduled for reimport. The graph refuses edges that would
//! close a dependency cycle, so cascades always terminate.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::migrate::Migrator;

/// Cache file schema version.
pub const DEPS_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur persisting the dependency cache.
#[derive(Debug, Error)]
pub enum DepsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DepsError>;

/// Dependency index backed by a stable directed graph.
///
/// Nodes are string keys: an asset's uuid string on the depending side, a
/// raw dependency value (path, uuid, or url) on the depended-upon side.
/// Edges run from the asset to the value it depends on.
pub struct DependencyGraph {
    graph: StableDiGraph<String, ()>,
    /// Map from node key to petgraph NodeIndex for O(1) lookup
    index: HashMap<String, NodeIndex>,
    migrator: Migrator,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            index: HashMap::new(),
            migrator: Migrator::new(DEPS_SCHEMA_VERSION, vec![]),
        }
    }

    fn intern(&mut self, key: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(key) {
            return *idx;
        }
        let idx = self.graph.add_node(key.to_string());
        self.index.insert(key.to_string(), idx);
        idx
    }

    /// Record that `from_uuid` depends on `value`.
    ///
    /// `resolve` maps a value key to the uuid key of the asset it
    /// currently addresses (if any); it is used to walk the existing
    /// dependency closure of `value` before the edge is added. If
    /// `from_uuid` is reachable, the edge would close a cycle: it is
    /// refused, a warning is logged, and `false` is returned.
    pub fn depend<F>(&mut self, from_uuid: &str, value: &str, resolve: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.would_cycle(from_uuid, value, &resolve) {
            warn!(
                "Refusing dependency {} -> {}: would close a cycle",
                from_uuid, value
            );
            return false;
        }

        let from = self.intern(from_uuid);
        let to = self.intern(value);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
        true
    }

    /// Walk the dependency closure of `value`, expanding each value node
    /// into the asset that currently owns it, looking for `from_uuid`.
    fn would_cycle<F>(&self, from_uuid: &str, value: &str, resolve: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        queue.push_back(value.to_string());

        while let Some(key) = queue.pop_front() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if key == from_uuid {
                return true;
            }

            // A value key addresses an asset; that asset's own outgoing
            // dependencies continue the walk under its uuid key.
            let owner = resolve(&key);
            if let Some(ref uuid) = owner {
                if uuid == from_uuid {
                    return true;
                }
            }

            for start in owner.into_iter().chain(Some(key)) {
                if let Some(idx) = self.index.get(&start) {
                    for next in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
                        queue.push_back(self.graph[next].clone());
                    }
                }
            }
        }
        false
    }

    /// Uuids of assets holding an edge into any of the given value keys.
    ///
    /// The caller passes every address form of a changed asset (path,
    /// uuid, url); the union is the cascade fan-out set.
    pub fn dependants_of(&self, values: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut seen: HashSet<NodeIndex> = HashSet::new();

        for value in values {
            let Some(idx) = self.index.get(value.as_str()) else {
                continue;
            };
            for from in self.graph.neighbors_directed(*idx, Direction::Incoming) {
                if seen.insert(from) {
                    out.push(self.graph[from].clone());
                }
            }
        }
        out
    }

    /// Values the given asset depends on.
    pub fn dependencies_of(&self, uuid: &str) -> Vec<String> {
        let Some(idx) = self.index.get(uuid) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// Drop every outgoing edge of an asset (reset path). Value nodes left
    /// with no edges at all are removed from the graph.
    pub fn clear_asset(&mut self, uuid: &str) {
        let Some(&idx) = self.index.get(uuid) else {
            return;
        };

        let targets: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();

        let edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }

        for target in targets {
            let orphan = self
                .graph
                .neighbors_undirected(target)
                .next()
                .is_none();
            if orphan {
                let key = self.graph[target].clone();
                self.graph.remove_node(target);
                self.index.remove(&key);
            }
        }

        // The asset node itself may now be an orphan too.
        if self.graph.neighbors_undirected(idx).next().is_none() {
            let key = self.graph[idx].clone();
            self.graph.remove_node(idx);
            self.index.remove(&key);
        }
    }

    /// Number of recorded dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Save as a versioned JSON file; path-shaped values are stored
    /// relative to `target`.
    pub fn save(&self, file_path: &Path, target: &Path) -> Result<()> {
        let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for idx in self.graph.node_indices() {
            let values: Vec<String> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| relativize(&self.graph[n], target))
                .collect();
            if !values.is_empty() {
                deps.insert(self.graph[idx].clone(), values);
            }
        }

        let record = serde_json::json!({
            "version": DEPS_SCHEMA_VERSION,
            "deps": deps,
        });

        let file = File::create(file_path)?;
        serde_json::to_writer_pretty(file, &record)?;
        debug!("Saved dependency cache ({} edges) to {:?}", self.edge_count(), file_path);
        Ok(())
    }

    /// Load from a versioned JSON file, rewriting relative path values
    /// against `target`. Missing or unreadable files yield an empty graph.
    pub fn load(&mut self, file_path: &Path, target: &Path) -> Result<()> {
        self.graph.clear();
        self.index.clear();

        let file = match File::open(file_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Dependency cache not found: {:?}", file_path);
                return Ok(());
            }
            Err(e) => return Err(DepsError::Io(e)),
        };

        let mut record: Value = match serde_json::from_reader(BufReader::new(file)) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unreadable dependency cache {:?}: {}", file_path, e);
                return Ok(());
            }
        };

        if self.migrator.upgrade(&mut record).is_err() {
            warn!("Dependency cache migration failed, starting cold: {:?}", file_path);
            return Ok(());
        }

        let Some(deps) = record.get("deps").and_then(Value::as_object) else {
            return Ok(());
        };

        for (uuid, values) in deps {
            let Some(values) = values.as_array() else {
                continue;
            };
            let from = self.intern(uuid);
            for value in values.iter().filter_map(Value::as_str) {
                let to = self.intern(&absolutize(value, target));
                if !self.graph.contains_edge(from, to) {
                    self.graph.add_edge(from, to, ());
                }
            }
        }

        debug!("Loaded dependency cache ({} edges) from {:?}", self.edge_count(), file_path);
        Ok(())
    }
}

/// Store absolute paths under `target` as `./`-prefixed relative strings.
fn relativize(value: &str, target: &Path) -> String {
    let path = Path::new(value);
    if path.is_absolute() {
        if let Ok(rel) = path.strip_prefix(target) {
            return format!("./{}", rel.to_string_lossy().replace('\\', "/"));
        }
    }
    value.to_string()
}

fn absolutize(value: &str, target: &Path) -> String {
    if let Some(rel) = value.strip_prefix("./") {
        return target.join(rel).to_string_lossy().to_string();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn no_resolve(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_depend_and_dependants() {
        let mut graph = DependencyGraph::new();
        assert!(graph.depend("asset-x", "uuid-y", no_resolve));
        assert!(graph.depend("asset-z", "uuid-y", no_resolve));

        let mut dependants = graph.dependants_of(&["uuid-y".to_string()]);
        dependants.sort();
        assert_eq!(dependants, vec!["asset-x", "asset-z"]);
    }

    #[test]
    fn test_duplicate_edge_recorded_once() {
        let mut graph = DependencyGraph::new();
        graph.depend("a", "v", no_resolve);
        graph.depend("a", "v", no_resolve);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_dependants_union_over_forms() {
        let mut graph = DependencyGraph::new();
        graph.depend("a", "/abs/path.png", no_resolve);
        graph.depend("b", "uuid-y", no_resolve);

        let dependants = graph.dependants_of(&[
            "/abs/path.png".to_string(),
            "uuid-y".to_string(),
            "db://proj/path.png".to_string(),
        ]);
        assert_eq!(dependants.len(), 2);
    }

    #[test]
    fn test_direct_cycle_refused() {
        let mut graph = DependencyGraph::new();
        // y depends on x; then x depending on y would close the loop.
        assert!(graph.depend("y", "x", no_resolve));
        let ok = graph.depend("x", "y", |value| {
            // Each uuid value resolves to the asset of the same name.
            Some(value.to_string())
        });
        assert!(!ok);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_transitive_cycle_refused() {
        let mut graph = DependencyGraph::new();
        assert!(graph.depend("b", "a", no_resolve));
        assert!(graph.depend("c", "b", no_resolve));
        // a -> c would make a <- b <- c <- a.
        let ok = graph.depend("a", "c", |value| Some(value.to_string()));
        assert!(!ok);
    }

    #[test]
    fn test_self_dependency_refused() {
        let mut graph = DependencyGraph::new();
        assert!(!graph.depend("a", "a", |value| Some(value.to_string())));
    }

    #[test]
    fn test_cycle_check_through_value_forms() {
        let mut graph = DependencyGraph::new();
        // Asset b depends on a path value owned by asset a.
        assert!(graph.depend("b", "/t/a.png", no_resolve));
        // a depending on b must be refused: b's edge points at a's path.
        let ok = graph.depend("a", "b", |value| match value {
            "/t/a.png" => Some("a".to_string()),
            "b" => Some("b".to_string()),
            _ => None,
        });
        // Walk: b -> /t/a.png -> owner a == from.
        assert!(!ok);
    }

    #[test]
    fn test_clear_asset_removes_edges_and_orphans() {
        let mut graph = DependencyGraph::new();
        graph.depend("a", "v1", no_resolve);
        graph.depend("a", "v2", no_resolve);
        graph.depend("b", "v2", no_resolve);

        graph.clear_asset("a");

        assert!(graph.dependencies_of("a").is_empty());
        // v2 still has b's edge; v1 is gone entirely.
        assert_eq!(graph.dependants_of(&["v2".to_string()]), vec!["b"]);
        assert!(graph.dependants_of(&["v1".to_string()]).is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("assets");
        std::fs::create_dir_all(&target).unwrap();
        let cache_file = dir.path().join(".db-dependency.json");

        let abs = target.join("tex/a.png").to_string_lossy().to_string();
        let mut graph = DependencyGraph::new();
        graph.depend("mat-uuid", &abs, no_resolve);
        graph.depend("mat-uuid", "shader-uuid", no_resolve);
        graph.save(&cache_file, &target).unwrap();

        // Path values are stored relative.
        let raw = std::fs::read_to_string(&cache_file).unwrap();
        assert!(raw.contains("./tex/a.png"));

        let mut loaded = DependencyGraph::new();
        loaded.load(&cache_file, &target).unwrap();

        let mut deps = loaded.dependencies_of("mat-uuid");
        deps.sort();
        assert_eq!(deps, vec![abs, "shader-uuid".to_string()]);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut graph = DependencyGraph::new();
        graph
            .load(&dir.path().join("nope.json"), dir.path())
            .unwrap();
        assert_eq!(graph.edge_count(), 0);
    }
}
