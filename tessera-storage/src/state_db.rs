use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use tessera_crypto::hash::sha256_hex;
use tessera_types::primitives::Hash;
use tessera_types::state::{Account, Asset, AssetTemplate, MarketListing, Session};

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter, KvStore};

/// Registered state-key prefixes, in the canonical enumeration order used by
/// `compute_root`. Every persisted state entry lives under one of these.
pub const PREFIX_ACCOUNT: &str = "acct:";
pub const PREFIX_ASSET: &str = "asset:";
pub const PREFIX_TEMPLATE: &str = "tmpl:";
pub const PREFIX_SESSION: &str = "sess:";
pub const PREFIX_LISTING: &str = "list:";

pub const STATE_PREFIXES: [&str; 5] = [
    PREFIX_ACCOUNT,
    PREFIX_ASSET,
    PREFIX_TEMPLATE,
    PREFIX_SESSION,
    PREFIX_LISTING,
];

struct StateSnapshot {
    dirty: BTreeMap<String, Vec<u8>>,
    deleted: BTreeSet<String>,
}

/// Buffered state database on top of a key-value store.
///
/// All reads consult the in-memory write buffer and tombstone set first and
/// fall through to the backing store on a miss. Writes and deletes only touch
/// the buffer until `commit()` flushes them in a single atomic batch.
/// Snapshots deep-copy the buffer so the executor can roll back a failed
/// transaction without disturbing retained checkpoints.
pub struct StateDb {
    db: Arc<dyn BatchWriter>,
    dirty: BTreeMap<String, Vec<u8>>,
    deleted: BTreeSet<String>,
    snapshots: Vec<StateSnapshot>,
}

impl StateDb {
    pub fn new(db: Arc<dyn BatchWriter>) -> Self {
        Self {
            db,
            dirty: BTreeMap::new(),
            deleted: BTreeSet::new(),
            snapshots: Vec::new(),
        }
    }

    // ---- internal helpers ----

    fn get_raw(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        if self.deleted.contains(key) {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        if let Some(v) = self.dirty.get(key) {
            return Ok(v.clone());
        }
        self.db
            .get(key.as_bytes())?
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    fn set_raw(&mut self, key: String, value: Vec<u8>) {
        self.deleted.remove(&key);
        self.dirty.insert(key, value);
    }

    fn delete_raw(&mut self, key: String) {
        self.dirty.remove(&key);
        self.deleted.insert(key);
    }

    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let data = self.get_raw(key)?;
        serde_json::from_slice(&data).map_err(|e| StorageError::DeserializationError {
            reason: format!("{}: {}", key, e),
        })
    }

    fn set_typed<T: Serialize>(&mut self, key: String, value: &T) -> Result<(), StorageError> {
        let data = serde_json::to_vec(value).map_err(|e| StorageError::SerializationError {
            reason: format!("{}: {}", key, e),
        })?;
        self.set_raw(key, data);
        Ok(())
    }

    // ---- accounts ----

    /// Load an account. An address that has never been written reads as the
    /// zero-value account; this is the only accessor with that behavior.
    pub fn get_account(&self, address: &str) -> Result<Account, StorageError> {
        match self.get_typed::<Account>(&format!("{}{}", PREFIX_ACCOUNT, address)) {
            Ok(acc) => Ok(acc),
            Err(e) if e.is_not_found() => Ok(Account::zero(address)),
            Err(e) => Err(e),
        }
    }

    pub fn set_account(&mut self, account: &Account) -> Result<(), StorageError> {
        self.set_typed(format!("{}{}", PREFIX_ACCOUNT, account.address), account)
    }

    // ---- assets ----

    pub fn get_asset(&self, id: &str) -> Result<Asset, StorageError> {
        self.get_typed(&format!("{}{}", PREFIX_ASSET, id))
    }

    pub fn set_asset(&mut self, asset: &Asset) -> Result<(), StorageError> {
        self.set_typed(format!("{}{}", PREFIX_ASSET, asset.id), asset)
    }

    pub fn delete_asset(&mut self, id: &str) {
        self.delete_raw(format!("{}{}", PREFIX_ASSET, id));
    }

    // ---- templates ----

    pub fn get_template(&self, id: &str) -> Result<AssetTemplate, StorageError> {
        self.get_typed(&format!("{}{}", PREFIX_TEMPLATE, id))
    }

    pub fn set_template(&mut self, template: &AssetTemplate) -> Result<(), StorageError> {
        self.set_typed(format!("{}{}", PREFIX_TEMPLATE, template.id), template)
    }

    // ---- sessions ----

    pub fn get_session(&self, id: &str) -> Result<Session, StorageError> {
        self.get_typed(&format!("{}{}", PREFIX_SESSION, id))
    }

    pub fn set_session(&mut self, session: &Session) -> Result<(), StorageError> {
        self.set_typed(format!("{}{}", PREFIX_SESSION, session.id), session)
    }

    // ---- market listings ----

    pub fn get_listing(&self, id: &str) -> Result<MarketListing, StorageError> {
        self.get_typed(&format!("{}{}", PREFIX_LISTING, id))
    }

    pub fn set_listing(&mut self, listing: &MarketListing) -> Result<(), StorageError> {
        self.set_typed(format!("{}{}", PREFIX_LISTING, listing.id), listing)
    }

    // ---- snapshot / revert / commit ----

    /// Save the current write buffer and return a snapshot id equal to the
    /// stack depth at the time of the call.
    pub fn snapshot(&mut self) -> usize {
        self.snapshots.push(StateSnapshot {
            dirty: self.dirty.clone(),
            deleted: self.deleted.clone(),
        });
        self.snapshots.len() - 1
    }

    /// Restore the write buffer to a previously saved snapshot and truncate
    /// the stack so only snapshots with index `< id` remain. The saved maps
    /// are copied back, not moved, so a retained snapshot can never be
    /// mutated by later writes.
    pub fn revert_to(&mut self, id: usize) -> Result<(), StorageError> {
        if id >= self.snapshots.len() {
            return Err(StorageError::InvalidSnapshot {
                id,
                depth: self.snapshots.len(),
            });
        }
        let snap = &self.snapshots[id];
        self.dirty = snap.dirty.clone();
        self.deleted = snap.deleted.clone();
        self.snapshots.truncate(id);
        Ok(())
    }

    /// Current snapshot stack depth.
    pub fn snapshot_depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Deterministic hash of the complete world state: all persisted entries
    /// under the registered prefixes merged with the write buffer, minus
    /// tombstones, sorted, then length-prefix encoded and hashed. Does not
    /// flush or modify state, so it is safe to call before signing a block.
    pub fn compute_root(&self) -> Result<Hash, StorageError> {
        let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for prefix in STATE_PREFIXES {
            for (k, v) in self.db.prefix_scan(prefix.as_bytes())? {
                let key = String::from_utf8(k).map_err(|e| StorageError::ReadError {
                    reason: format!("non-utf8 state key: {}", e),
                })?;
                merged.insert(key, v);
            }
        }
        for (k, v) in &self.dirty {
            merged.insert(k.clone(), v.clone());
        }
        for k in &self.deleted {
            merged.remove(k);
        }

        let mut buf = Vec::new();
        for (k, v) in &merged {
            buf.extend_from_slice(&(k.len() as u32).to_be_bytes());
            buf.extend_from_slice(k.as_bytes());
            buf.extend_from_slice(&(v.len() as u32).to_be_bytes());
            buf.extend_from_slice(v);
        }
        Ok(sha256_hex(&buf))
    }

    /// Atomically flush the write buffer to the backing store and clear it
    /// along with the snapshot stack. A failed batch leaves the buffer
    /// untouched so the caller may retry or treat it as fatal.
    pub fn commit(&mut self) -> Result<(), StorageError> {
        if self.dirty.is_empty() && self.deleted.is_empty() {
            self.snapshots.clear();
            return Ok(());
        }
        let mut ops = Vec::with_capacity(self.dirty.len() + self.deleted.len());
        for (k, v) in &self.dirty {
            ops.push(BatchOp::Put {
                key: k.as_bytes().to_vec(),
                value: v.clone(),
            });
        }
        for k in &self.deleted {
            ops.push(BatchOp::Delete {
                key: k.as_bytes().to_vec(),
            });
        }
        self.db.write_batch(ops)?;
        self.dirty.clear();
        self.deleted.clear();
        self.snapshots.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn new_state() -> StateDb {
        StateDb::new(Arc::new(MemoryStore::new()))
    }

    fn account(addr: &str, balance: u64, nonce: u64) -> Account {
        Account {
            address: addr.to_string(),
            balance,
            nonce,
        }
    }

    #[test]
    fn test_missing_account_reads_as_zero() {
        let state = new_state();
        let acc = state.get_account("deadbeef").unwrap();
        assert_eq!(acc.address, "deadbeef");
        assert_eq!(acc.balance, 0);
        assert_eq!(acc.nonce, 0);
    }

    #[test]
    fn test_missing_asset_is_not_found() {
        let state = new_state();
        let err = state.get_asset("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_write_read_through_buffer() {
        let mut state = new_state();
        state.set_account(&account("aa", 100, 1)).unwrap();
        let acc = state.get_account("aa").unwrap();
        assert_eq!(acc.balance, 100);
        assert_eq!(acc.nonce, 1);
    }

    #[test]
    fn test_tombstone_hides_persisted_entry() {
        let mut state = new_state();
        let asset = Asset {
            id: "a1".to_string(),
            template_id: "t".to_string(),
            owner: "aa".to_string(),
            tradeable: true,
            minted_at: 1,
            ..Default::default()
        };
        state.set_asset(&asset).unwrap();
        state.commit().unwrap();

        state.delete_asset("a1");
        assert!(state.get_asset("a1").unwrap_err().is_not_found());

        // Re-writing clears the tombstone.
        state.set_asset(&asset).unwrap();
        assert_eq!(state.get_asset("a1").unwrap().id, "a1");
    }

    #[test]
    fn test_snapshot_ids_are_stack_depths() {
        let mut state = new_state();
        assert_eq!(state.snapshot(), 0);
        assert_eq!(state.snapshot(), 1);
        assert_eq!(state.snapshot(), 2);
        assert_eq!(state.snapshot_depth(), 3);
    }

    #[test]
    fn test_revert_restores_and_truncates() {
        let mut state = new_state();
        state.set_account(&account("aa", 10, 0)).unwrap();
        let snap = state.snapshot();
        state.set_account(&account("aa", 999, 5)).unwrap();
        state.set_account(&account("bb", 7, 0)).unwrap();

        state.revert_to(snap).unwrap();
        assert_eq!(state.get_account("aa").unwrap().balance, 10);
        assert_eq!(state.get_account("bb").unwrap().balance, 0);
        assert_eq!(state.snapshot_depth(), 0);
    }

    #[test]
    fn test_revert_out_of_range_fails() {
        let mut state = new_state();
        assert!(matches!(
            state.revert_to(0),
            Err(StorageError::InvalidSnapshot { id: 0, depth: 0 })
        ));
        state.snapshot();
        assert!(state.revert_to(1).is_err());
        assert!(state.revert_to(0).is_ok());
    }

    #[test]
    fn test_revert_does_not_disturb_earlier_snapshots() {
        let mut state = new_state();
        state.set_account(&account("aa", 1, 0)).unwrap();
        let s0 = state.snapshot();
        state.set_account(&account("aa", 2, 0)).unwrap();
        let s1 = state.snapshot();
        state.set_account(&account("aa", 3, 0)).unwrap();

        state.revert_to(s1).unwrap();
        assert_eq!(state.get_account("aa").unwrap().balance, 2);
        state.revert_to(s0).unwrap();
        assert_eq!(state.get_account("aa").unwrap().balance, 1);
    }

    #[test]
    fn test_snapshot_revert_root_law() {
        // revert(s) after arbitrary writes restores the root taken at s.
        let mut state = new_state();
        state.set_account(&account("aa", 100, 0)).unwrap();
        let root_at_snap = state.compute_root().unwrap();
        let snap = state.snapshot();

        state.set_account(&account("bb", 55, 3)).unwrap();
        state.delete_asset("ghost");
        state.set_account(&account("aa", 0, 9)).unwrap();
        assert_ne!(state.compute_root().unwrap(), root_at_snap);

        state.revert_to(snap).unwrap();
        assert_eq!(state.compute_root().unwrap(), root_at_snap);
    }

    #[test]
    fn test_root_reorder_independence() {
        // Writing the same pairs in any permutation yields the same root.
        let accounts = [
            account("cc", 3, 0),
            account("aa", 1, 1),
            account("bb", 2, 2),
        ];
        let mut forward = new_state();
        for acc in &accounts {
            forward.set_account(acc).unwrap();
        }
        let mut backward = new_state();
        for acc in accounts.iter().rev() {
            backward.set_account(acc).unwrap();
        }
        assert_eq!(
            forward.compute_root().unwrap(),
            backward.compute_root().unwrap()
        );
    }

    #[test]
    fn test_root_covers_persisted_and_buffered_state() {
        let mut state = new_state();
        state.set_account(&account("aa", 1, 0)).unwrap();
        state.commit().unwrap();
        let committed_root = state.compute_root().unwrap();

        // A buffered write changes the root before commit.
        state.set_account(&account("bb", 2, 0)).unwrap();
        let buffered_root = state.compute_root().unwrap();
        assert_ne!(committed_root, buffered_root);

        // Committing does not change the observable root.
        state.commit().unwrap();
        assert_eq!(state.compute_root().unwrap(), buffered_root);
    }

    #[test]
    fn test_root_ignores_unregistered_prefixes() {
        let store = Arc::new(MemoryStore::new());
        let state = StateDb::new(store.clone());
        let before = state.compute_root().unwrap();
        // Chain bookkeeping lives outside the registered state prefixes.
        store.put(b"chain:tip", b"abc").unwrap();
        store.put(b"idx:owner:asset:aa", b"[]").unwrap();
        assert_eq!(state.compute_root().unwrap(), before);
    }

    #[test]
    fn test_compute_root_does_not_mutate() {
        let mut state = new_state();
        state.set_account(&account("aa", 9, 0)).unwrap();
        let r1 = state.compute_root().unwrap();
        let r2 = state.compute_root().unwrap();
        assert_eq!(r1, r2);
        // Buffer still pending; commit works afterwards.
        state.commit().unwrap();
        assert_eq!(state.compute_root().unwrap(), r1);
    }

    #[test]
    fn test_commit_flushes_and_clears() {
        let store = Arc::new(MemoryStore::new());
        let mut state = StateDb::new(store.clone());
        state.set_account(&account("aa", 42, 0)).unwrap();
        state.snapshot();
        state.commit().unwrap();

        assert_eq!(state.snapshot_depth(), 0);
        // Value is now visible through the raw store.
        assert!(store.get(b"acct:aa").unwrap().is_some());
        // And still readable through the state db.
        assert_eq!(state.get_account("aa").unwrap().balance, 42);
    }

    #[test]
    fn test_commit_applies_tombstones() {
        let store = Arc::new(MemoryStore::new());
        let mut state = StateDb::new(store.clone());
        let asset = Asset {
            id: "a1".to_string(),
            template_id: "t".to_string(),
            owner: "aa".to_string(),
            tradeable: false,
            minted_at: 0,
            ..Default::default()
        };
        state.set_asset(&asset).unwrap();
        state.commit().unwrap();
        assert!(store.get(b"asset:a1").unwrap().is_some());

        state.delete_asset("a1");
        state.commit().unwrap();
        assert!(store.get(b"asset:a1").unwrap().is_none());
    }

    #[test]
    fn test_commit_on_empty_buffer_is_noop() {
        let mut state = new_state();
        let root = state.compute_root().unwrap();
        state.commit().unwrap();
        state.commit().unwrap();
        assert_eq!(state.compute_root().unwrap(), root);
    }

    #[test]
    fn test_two_replicas_agree_on_root() {
        let mut a = new_state();
        let mut b = new_state();
        for (i, addr) in ["aa", "bb", "cc"].iter().enumerate() {
            a.set_account(&account(addr, i as u64 * 10, i as u64)).unwrap();
            b.set_account(&account(addr, i as u64 * 10, i as u64)).unwrap();
        }
        a.commit().unwrap();
        // b keeps everything buffered; the root must not care.
        assert_eq!(a.compute_root().unwrap(), b.compute_root().unwrap());
    }
}
