//! Typed companion metadata: domain state to node id
//!
//! The engine never knows what a node means. Callers that need to find the
//! node for a board position or a context keep a [`StateIndex`] next to the
//! tree and persist it as a JSON side-file. The tree's own
//! [`save`](crate::FluidTree::save)/[`load`](crate::FluidTree::load) never
//! read or write it.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{codec, node::NodeId, tree::FluidTree, FluxError, Result};

/// Extension appended to the engine file name for the side-file
pub const SIDECAR_EXTENSION: &str = "meta";

/// Map from caller-defined state keys to node ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateIndex<K: Eq + Hash> {
    entries: HashMap<K, NodeId>,
    root: Option<NodeId>,
}

/// On-disk shape; a list of pairs so any serializable key works in JSON
#[derive(Serialize, Deserialize)]
struct IndexFile<K> {
    root: Option<NodeId>,
    entries: Vec<(K, NodeId)>,
}

impl<K: Eq + Hash> StateIndex<K> {
    /// Creates an empty index
    pub fn new() -> Self {
        StateIndex {
            entries: HashMap::new(),
            root: None,
        }
    }

    /// Records `key -> id`, returning the previous id for `key`
    pub fn insert(&mut self, key: K, id: NodeId) -> Option<NodeId> {
        self.entries.insert(key, id)
    }

    /// The id recorded for `key`
    pub fn get(&self, key: &K) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    /// Whether `key` has an entry
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Forgets `key`, returning the id it pointed at
    pub fn remove(&mut self, key: &K) -> Option<NodeId> {
        self.entries.remove(key)
    }

    /// Reverse lookup: the key recorded for `id`, if any
    pub fn key_of(&self, id: NodeId) -> Option<&K> {
        self.entries
            .iter()
            .find_map(|(k, &v)| if v == id { Some(k) } else { None })
    }

    /// Returns the id for `key`, creating and linking a child of `parent`
    /// in `tree` if the key is new
    pub fn get_or_create(&mut self, tree: &mut FluidTree, parent: NodeId, key: K) -> Result<NodeId> {
        if let Some(id) = self.get(&key) {
            return Ok(id);
        }
        let id = tree.create_child(parent)?;
        self.entries.insert(key, id);
        Ok(id)
    }

    /// The caller's designated root, if set
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Designates `root` as the entry point saved with the index
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key is recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&K, NodeId)> {
        self.entries.iter().map(|(k, &v)| (k, v))
    }

    /// Drops entries (and the root) that do not name a node of `tree`
    ///
    /// Useful after loading an engine file that is older than its side-file.
    /// Returns the number of entries removed.
    pub fn prune(&mut self, tree: &FluidTree) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, id| tree.contains(*id));
        if self.root.is_some_and(|r| !tree.contains(r)) {
            self.root = None;
        }
        before - self.entries.len()
    }
}

impl<K: Eq + Hash + Serialize + DeserializeOwned> StateIndex<K> {
    /// Writes the index as JSON to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = IndexFile {
            root: self.root,
            entries: self.entries.iter().map(|(k, &v)| (k, v)).collect(),
        };
        let json =
            serde_json::to_vec_pretty(&file).map_err(|e| FluxError::Metadata(e.to_string()))?;
        codec::write_atomic(path.as_ref(), &json)?;
        debug!(
            "saved {} index entries to {}",
            self.entries.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Reads an index from `path`; a missing file yields an empty index
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = match fs::read(path.as_ref()) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(err.into()),
        };
        let file: IndexFile<K> =
            serde_json::from_slice(&bytes).map_err(|e| FluxError::Metadata(e.to_string()))?;

        Ok(StateIndex {
            entries: file.entries.into_iter().collect(),
            root: file.root,
        })
    }
}

impl<K: Eq + Hash> Default for StateIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Side-file path for an engine file: `tree.flux` -> `tree.flux.meta`
pub fn sidecar_path<P: AsRef<Path>>(engine_path: P) -> PathBuf {
    let mut name = OsString::from(engine_path.as_ref().as_os_str());
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path_appends_extension() {
        assert_eq!(
            sidecar_path("out/tree.flux"),
            PathBuf::from("out/tree.flux.meta")
        );
    }

    #[test]
    fn test_get_or_create_links_once() {
        let mut tree = FluidTree::new();
        let mut index: StateIndex<String> = StateIndex::new();

        let a = index
            .get_or_create(&mut tree, NodeId::ROOT, "a".to_string())
            .unwrap();
        let again = index
            .get_or_create(&mut tree, NodeId::ROOT, "a".to_string())
            .unwrap();

        assert_eq!(a, again);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get_children(NodeId::ROOT), &[a]);
        assert_eq!(index.key_of(a), Some(&"a".to_string()));
    }

    #[test]
    fn test_round_trip_with_non_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut index: StateIndex<(u8, u8)> = StateIndex::new();
        index.insert((3, 4), NodeId(7));
        index.insert((0, 0), NodeId(1));
        index.set_root(NodeId(1));
        index.save(&path).unwrap();

        let loaded: StateIndex<(u8, u8)> = StateIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_missing_sidecar_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: StateIndex<u64> = StateIndex::load(dir.path().join("none.meta")).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.root(), None);
    }

    #[test]
    fn test_corrupt_sidecar_is_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.meta");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            StateIndex::<u64>::load(&path),
            Err(FluxError::Metadata(_))
        ));
    }

    #[test]
    fn test_prune_drops_unknown_ids() {
        let tree = FluidTree::new();
        let mut index: StateIndex<u32> = StateIndex::new();
        index.insert(1, NodeId::ROOT);
        index.insert(2, NodeId(42));
        index.set_root(NodeId(42));

        assert_eq!(index.prune(&tree), 1);
        assert_eq!(index.get(&1), Some(NodeId::ROOT));
        assert_eq!(index.root(), None);
    }

    #[test]
    fn test_prune_keeps_live_root() {
        let mut tree = FluidTree::new();
        let child = tree.create_child(NodeId::ROOT).unwrap();
        let mut index: StateIndex<u32> = StateIndex::new();
        index.insert(1, child);
        index.set_root(child);

        assert_eq!(index.prune(&tree), 0);
        assert_eq!(index.root(), Some(child));
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.flux.meta");

        let mut index: StateIndex<u32> = StateIndex::new();
        index.insert(1, NodeId(1));
        index.save(&path).unwrap();
        index.insert(2, NodeId(2));
        index.save(&path).unwrap();

        assert!(!codec::temp_path(&path).exists());
        assert_eq!(StateIndex::<u32>::load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_save_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("tree.flux.meta");

        let index: StateIndex<u32> = StateIndex::new();
        assert!(matches!(index.save(&path), Err(FluxError::Io(_))));
        assert!(!path.exists());
        assert!(!codec::temp_path(&path).exists());
    }
}
