// src/store/versioned.rs

//! Height-indexed snapshots with a per-block write overlay.
//!
//! Committed snapshots are immutable and shared through `Arc`, so readers
//! of historical versions never touch the write path. The block executor
//! is the only writer: it mutates the overlay, takes checkpoints around
//! transactions and folds everything into a new snapshot on commit.

use crate::codec;
use crate::errors::{NmxError, Result};
use crate::store::merkle::{self, MerkleProof, StoreProof};
use crate::store::{full_key, prefix_end, split_key};
use nmx_crypto::hash::{merkle_leaf, Hash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;
type Transient = BTreeMap<Vec<u8>, Vec<u8>>;

/// Result of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    /// Height of the new version
    pub height: u64,
    /// App hash of the new version
    pub app_hash: Hash,
}

/// Immutable committed state at one height
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Version height
    pub height: u64,
    /// Root over all store roots
    pub app_hash: Hash,
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    store_roots: BTreeMap<String, Hash>,
}

impl Snapshot {
    fn empty(height: u64, names: &[String]) -> Self {
        let data = BTreeMap::new();
        let (store_roots, app_hash) = compute_roots(&data, names);
        Self {
            height,
            app_hash,
            data,
            store_roots,
        }
    }

    /// Value at a full key
    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.data.get(key)
    }

    /// Entries whose full key starts with `prefix`, in key order
    pub fn iter_prefix<'a>(&'a self, prefix: &[u8]) -> impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a {
        self.data.range::<Vec<u8>, _>(range_bounds(prefix))
    }

    /// Root of one store; the empty root for unknown stores
    pub fn store_root(&self, name: &str) -> Hash {
        self.store_roots.get(name).copied().unwrap_or(merkle::EMPTY_ROOT)
    }

    /// Number of entries across all stores
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no store holds anything
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inclusion proof for `key` in store `name`; `None` if absent
    pub fn prove(&self, name: &str, key: &[u8]) -> Option<StoreProof> {
        let prefix = full_key(name, &[]);
        let mut leaves = Vec::new();
        let mut index = None;
        let mut value = None;
        for (full, v) in self.iter_prefix(&prefix) {
            let module_key = &full[prefix.len()..];
            if module_key == key {
                index = Some(leaves.len());
                value = Some(v.clone());
            }
            leaves.push(merkle_leaf(module_key, v));
        }
        let store_path = MerkleProof::build(&leaves, index?)?;

        let app_leaves: Vec<Hash> = self
            .store_roots
            .iter()
            .map(|(n, root)| merkle_leaf(n.as_bytes(), root))
            .collect();
        let app_index = self.store_roots.keys().position(|n| n == name)?;
        let app_path = MerkleProof::build(&app_leaves, app_index)?;

        Some(StoreProof {
            store: name.to_string(),
            key: key.to_vec(),
            value: value?,
            store_path,
            app_path,
        })
    }
}

fn range_bounds(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let upper = match prefix_end(prefix) {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    (Bound::Included(prefix.to_vec()), upper)
}

/// Per-store roots and the app hash over them
fn compute_roots(data: &BTreeMap<Vec<u8>, Vec<u8>>, names: &[String]) -> (BTreeMap<String, Hash>, Hash) {
    let mut leaves: BTreeMap<String, Vec<Hash>> =
        names.iter().map(|n| (n.clone(), Vec::new())).collect();
    for (full, value) in data {
        if let Some((name, key)) = split_key(full) {
            leaves
                .entry(name.to_string())
                .or_default()
                .push(merkle_leaf(key, value));
        }
    }
    let roots: BTreeMap<String, Hash> = leaves
        .into_iter()
        .map(|(name, l)| (name, merkle::root(&l)))
        .collect();
    let app_leaves: Vec<Hash> = roots
        .iter()
        .map(|(name, root)| merkle_leaf(name.as_bytes(), root))
        .collect();
    let app_hash = merkle::root(&app_leaves);
    (roots, app_hash)
}

/// Versioned store with a single writer
///
/// # Example
/// ```
/// use nmx_core::store::{full_key, VersionedStore};
///
/// let mut store = VersionedStore::new(&["bank"], 0);
/// store.set(full_key("bank", b"a"), b"1".to_vec());
/// let info = store.commit();
/// assert_eq!(info.height, 1);
/// assert_eq!(store.latest().get(&full_key("bank", b"a")), Some(&b"1".to_vec()));
/// ```
#[derive(Debug, Clone)]
pub struct VersionedStore {
    names: Vec<String>,
    latest: Arc<Snapshot>,
    versions: BTreeMap<u64, Arc<Snapshot>>,
    overlay: Overlay,
    transient: Transient,
    checkpoints: Vec<(Overlay, Transient)>,
    keep_recent: u64,
}

impl VersionedStore {
    /// Creates an empty store at height 0
    ///
    /// # Arguments
    /// * `names` - Store names contributing to the app hash
    /// * `keep_recent` - Committed versions to retain, 0 keeps all
    pub fn new(names: &[&str], keep_recent: u64) -> Self {
        let mut names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        names.sort();
        names.dedup();
        let latest = Arc::new(Snapshot::empty(0, &names));
        Self {
            names,
            latest,
            versions: BTreeMap::new(),
            overlay: BTreeMap::new(),
            transient: BTreeMap::new(),
            checkpoints: Vec::new(),
            keep_recent,
        }
    }

    /// Read view over a committed snapshot, for historical queries
    pub fn from_snapshot(snapshot: Arc<Snapshot>) -> Self {
        let names = snapshot.store_roots.keys().cloned().collect();
        Self {
            names,
            latest: snapshot,
            versions: BTreeMap::new(),
            overlay: BTreeMap::new(),
            transient: BTreeMap::new(),
            checkpoints: Vec::new(),
            keep_recent: 0,
        }
    }

    /// Makes the first commit land on `initial_height`
    ///
    /// Only allowed before anything was committed.
    pub fn set_initial_height(&mut self, initial_height: u64) -> Result<()> {
        if !self.versions.is_empty() || self.latest.height != 0 && self.latest.height + 1 != initial_height {
            return Err(NmxError::StoreError(format!(
                "initial height {} set after commits (latest {})",
                initial_height, self.latest.height
            )));
        }
        let base = initial_height.saturating_sub(1);
        let mut snapshot = (*self.latest).clone();
        snapshot.height = base;
        self.latest = Arc::new(snapshot);
        Ok(())
    }

    /// Value at a full key, as seen by the current block
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.overlay.get(key) {
            Some(entry) => entry.clone(),
            None => self.latest.get(key).cloned(),
        }
    }

    /// Writes a full key
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    /// Deletes a full key
    pub fn delete(&mut self, key: Vec<u8>) {
        self.overlay.insert(key, None);
    }

    /// Entries under `prefix` merged from snapshot and overlay
    ///
    /// Ascending key order, or descending when `reverse` is set.
    pub fn iter(&self, prefix: &[u8], reverse: bool) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .latest
            .iter_prefix(prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in self.overlay.range::<Vec<u8>, _>(range_bounds(prefix)) {
            match v {
                Some(value) => {
                    merged.insert(k.clone(), value.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        let mut out: Vec<(Vec<u8>, Vec<u8>)> = merged.into_iter().collect();
        if reverse {
            out.reverse();
        }
        out
    }

    /// Reads the transient scope
    pub fn transient_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.transient.get(key).cloned()
    }

    /// Writes the transient scope; cleared on commit
    pub fn transient_set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.transient.insert(key, value);
    }

    /// Deletes from the transient scope
    pub fn transient_delete(&mut self, key: &[u8]) {
        self.transient.remove(key);
    }

    /// Transient entries under `prefix`
    pub fn transient_iter(&self, prefix: &[u8], reverse: bool) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out: Vec<(Vec<u8>, Vec<u8>)> = self
            .transient
            .range::<Vec<u8>, _>(range_bounds(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if reverse {
            out.reverse();
        }
        out
    }

    /// Saves the current working state so it can be restored
    pub fn checkpoint(&mut self) {
        self.checkpoints
            .push((self.overlay.clone(), self.transient.clone()));
    }

    /// Restores the working state of the last checkpoint
    pub fn rollback(&mut self) -> Result<()> {
        let (overlay, transient) = self
            .checkpoints
            .pop()
            .ok_or_else(|| NmxError::StoreError("rollback without checkpoint".to_string()))?;
        self.overlay = overlay;
        self.transient = transient;
        Ok(())
    }

    /// Keeps the writes made since the last checkpoint
    pub fn release_checkpoint(&mut self) -> Result<()> {
        self.checkpoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| NmxError::StoreError("release without checkpoint".to_string()))
    }

    /// Drops every uncommitted write
    pub fn discard(&mut self) {
        self.overlay.clear();
        self.transient.clear();
        self.checkpoints.clear();
    }

    fn merged_data(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut data = self.latest.data.clone();
        for (k, v) in &self.overlay {
            match v {
                Some(value) => {
                    data.insert(k.clone(), value.clone());
                }
                None => {
                    data.remove(k);
                }
            }
        }
        data
    }

    /// App hash the working state would commit to
    pub fn working_hash(&self) -> Hash {
        compute_roots(&self.merged_data(), &self.names).1
    }

    /// Folds the overlay into a new version
    pub fn commit(&mut self) -> CommitInfo {
        let data = self.merged_data();
        let (store_roots, app_hash) = compute_roots(&data, &self.names);
        let height = self.latest.height + 1;
        let snapshot = Arc::new(Snapshot {
            height,
            app_hash,
            data,
            store_roots,
        });
        self.latest = Arc::clone(&snapshot);
        self.versions.insert(height, snapshot);
        self.discard();
        self.prune();
        tracing::debug!("committed version {} ({})", height, hex::encode(app_hash));
        CommitInfo { height, app_hash }
    }

    fn prune(&mut self) {
        if self.keep_recent == 0 {
            return;
        }
        let latest = self.latest.height;
        let keep_from = latest.saturating_sub(self.keep_recent - 1);
        self.versions = self.versions.split_off(&keep_from);
    }

    /// Latest committed snapshot
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.latest)
    }

    /// Committed snapshot at `height`, if retained
    pub fn version(&self, height: u64) -> Option<Arc<Snapshot>> {
        if height == 0 || height == self.latest.height {
            return Some(self.latest());
        }
        self.versions.get(&height).cloned()
    }

    /// Height of the latest commit
    pub fn last_height(&self) -> u64 {
        self.latest.height
    }

    /// App hash of the latest commit
    pub fn last_hash(&self) -> Hash {
        self.latest.app_hash
    }

    /// Resets to version `height`, dropping newer versions and pending writes
    pub fn load_version(&mut self, height: u64) -> Result<()> {
        let snapshot = self
            .version(height)
            .ok_or_else(|| NmxError::StoreError(format!("version {} not retained", height)))?;
        self.versions.retain(|h, _| *h <= height);
        self.latest = snapshot;
        self.discard();
        Ok(())
    }

    /// Writes the latest snapshot to a file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = codec::encode(&*self.latest)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Restores a store from [`VersionedStore::save_to_file`] output
    ///
    /// The app hash is recomputed and must match the saved one.
    pub fn load_from_file(path: impl AsRef<Path>, names: &[&str], keep_recent: u64) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot = codec::decode(&bytes)?;
        let mut store = Self::new(names, keep_recent);
        let (store_roots, app_hash) = compute_roots(&snapshot.data, &store.names);
        if app_hash != snapshot.app_hash {
            return Err(NmxError::StoreError(format!(
                "snapshot at height {} is corrupt: app hash mismatch",
                snapshot.height
            )));
        }
        let snapshot = Arc::new(Snapshot {
            store_roots,
            ..snapshot
        });
        store.versions.insert(snapshot.height, Arc::clone(&snapshot));
        store.latest = snapshot;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> VersionedStore {
        VersionedStore::new(&["bank", "staking"], 0)
    }

    fn k(name: &str, key: &str) -> Vec<u8> {
        full_key(name, key.as_bytes())
    }

    #[test]
    fn test_overlay_visible_before_commit() {
        let mut store = create_test_store();
        store.set(k("bank", "a"), vec![1]);
        assert_eq!(store.get(&k("bank", "a")), Some(vec![1]));
        assert!(store.latest().get(&k("bank", "a")).is_none());
    }

    #[test]
    fn test_commit_advances_height_and_hash() {
        let mut store = create_test_store();
        let empty = store.last_hash();
        store.set(k("bank", "a"), vec![1]);
        let info = store.commit();
        assert_eq!(info.height, 1);
        assert_ne!(info.app_hash, empty);
        assert_eq!(store.last_height(), 1);
    }

    #[test]
    fn test_hash_independent_of_write_order() {
        let mut a = create_test_store();
        a.set(k("bank", "x"), vec![1]);
        a.set(k("staking", "y"), vec![2]);
        let mut b = create_test_store();
        b.set(k("staking", "y"), vec![2]);
        b.set(k("bank", "x"), vec![1]);
        assert_eq!(a.commit().app_hash, b.commit().app_hash);
    }

    #[test]
    fn test_working_hash_matches_commit() {
        let mut store = create_test_store();
        store.set(k("bank", "x"), vec![7]);
        let predicted = store.working_hash();
        assert_eq!(store.commit().app_hash, predicted);
    }

    #[test]
    fn test_prefix_iteration_merges_overlay() {
        let mut store = create_test_store();
        store.set(k("bank", "a1"), vec![1]);
        store.set(k("bank", "a2"), vec![2]);
        store.set(k("bank", "b1"), vec![3]);
        store.commit();
        store.delete(k("bank", "a1"));
        store.set(k("bank", "a3"), vec![4]);

        let forward = store.iter(&k("bank", "a"), false);
        let keys: Vec<Vec<u8>> = forward.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![k("bank", "a2"), k("bank", "a3")]);

        let reverse = store.iter(&k("bank", "a"), true);
        assert_eq!(reverse[0].0, k("bank", "a3"));
    }

    #[test]
    fn test_checkpoint_and_rollback() {
        let mut store = create_test_store();
        store.set(k("bank", "kept"), vec![1]);
        store.checkpoint();
        store.set(k("bank", "dropped"), vec![2]);
        store.transient_set(b"t".to_vec(), vec![3]);
        store.rollback().unwrap();
        assert!(store.get(&k("bank", "dropped")).is_none());
        assert!(store.transient_get(b"t").is_none());
        assert_eq!(store.get(&k("bank", "kept")), Some(vec![1]));
        assert!(store.rollback().is_err());
    }

    #[test]
    fn test_transient_cleared_on_commit() {
        let mut store = create_test_store();
        store.transient_set(b"votes".to_vec(), vec![1]);
        let before = store.working_hash();
        store.commit();
        assert!(store.transient_get(b"votes").is_none());
        assert_eq!(store.last_hash(), before);
    }

    #[test]
    fn test_load_version_discards_newer() {
        let mut store = create_test_store();
        store.set(k("bank", "a"), vec![1]);
        let first = store.commit();
        store.set(k("bank", "a"), vec![2]);
        store.commit();
        store.load_version(1).unwrap();
        assert_eq!(store.last_hash(), first.app_hash);
        assert_eq!(store.get(&k("bank", "a")), Some(vec![1]));
        assert!(store.version(2).is_none());
        assert!(store.load_version(5).is_err());
    }

    #[test]
    fn test_pruning_keeps_recent() {
        let mut store = VersionedStore::new(&["bank"], 2);
        for i in 0..5u8 {
            store.set(k("bank", "a"), vec![i]);
            store.commit();
        }
        assert!(store.version(3).is_none());
        assert!(store.version(4).is_some());
        assert!(store.version(5).is_some());
    }

    #[test]
    fn test_proof_verifies_against_app_hash() {
        let mut store = create_test_store();
        for i in 0..5u8 {
            store.set(k("bank", &format!("key{}", i)), vec![i]);
        }
        store.set(k("staking", "v"), vec![9]);
        let info = store.commit();

        let proof = store.latest().prove("bank", b"key3").unwrap();
        assert_eq!(proof.value, vec![3]);
        assert!(proof.verify(&info.app_hash));

        let mut forged = proof.clone();
        forged.value = vec![4];
        assert!(!forged.verify(&info.app_hash));
        assert!(store.latest().prove("bank", b"missing").is_none());
    }

    #[test]
    fn test_initial_height() {
        let mut store = create_test_store();
        store.set_initial_height(11).unwrap();
        assert_eq!(store.commit().height, 11);
        assert!(store.set_initial_height(20).is_err());
    }
}
