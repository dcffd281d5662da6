//! Shared in-memory store set used by both reference providers.

use crate::error::{kv, NativeError, NativeResult};
use crate::provider::{KeyStore, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single key-value store held in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BTreeStore {
    name: String,
    records: BTreeMap<Vec<u8>, Record>,
    next_sequence: u64,
    #[serde(skip)]
    read_only: bool,
}

impl BTreeStore {
    fn new(name: &str, read_only: bool) -> Self {
        Self {
            name: name.to_owned(),
            records: BTreeMap::new(),
            next_sequence: 1,
            read_only,
        }
    }
}

impl KeyStore for BTreeStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> NativeResult<Option<Record>> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], meta: &[u8], body: &[u8]) -> NativeResult<u64> {
        if self.read_only {
            return Err(NativeError::kv(kv::READ_ONLY_VIOLATION));
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.insert(
            key.to_vec(),
            Record {
                key: key.to_vec(),
                meta: meta.to_vec(),
                body: body.to_vec(),
                sequence,
            },
        );
        Ok(sequence)
    }

    fn delete(&mut self, key: &[u8]) -> NativeResult<bool> {
        if self.read_only {
            return Err(NativeError::kv(kv::READ_ONLY_VIOLATION));
        }
        Ok(self.records.remove(key).is_some())
    }

    fn record_count(&self) -> NativeResult<u64> {
        Ok(self.records.len() as u64)
    }

    fn last_sequence(&self) -> NativeResult<u64> {
        Ok(self.next_sequence - 1)
    }
}

/// A set of named stores with snapshot/restore transaction semantics.
///
/// `begin` clones the committed image; `abort` restores it; `commit`
/// discards it. This gives the single native transaction the providers
/// expose. Nesting is rejected with the engine's transaction status.
#[derive(Debug, Default)]
pub(crate) struct StoreSet {
    stores: BTreeMap<String, BTreeStore>,
    shadow: Option<BTreeMap<String, BTreeStore>>,
    read_only: bool,
}

impl StoreSet {
    pub(crate) fn new(read_only: bool) -> Self {
        Self {
            stores: BTreeMap::new(),
            shadow: None,
            read_only,
        }
    }

    pub(crate) fn from_stores(stores: BTreeMap<String, BTreeStore>, read_only: bool) -> Self {
        let mut set = Self {
            stores,
            shadow: None,
            read_only,
        };
        // read_only is not serialized; reapply it after deserialization.
        for store in set.stores.values_mut() {
            store.read_only = read_only;
        }
        set
    }

    pub(crate) fn stores(&self) -> &BTreeMap<String, BTreeStore> {
        &self.stores
    }

    /// Gets or creates the named store.
    pub(crate) fn obtain(&mut self, name: &str) -> &mut BTreeStore {
        let read_only = self.read_only;
        self.stores
            .entry(name.to_owned())
            .or_insert_with(|| BTreeStore::new(name, read_only))
    }

    pub(crate) fn in_transaction(&self) -> bool {
        self.shadow.is_some()
    }

    pub(crate) fn begin(&mut self) -> NativeResult<()> {
        if self.shadow.is_some() {
            return Err(NativeError::kv(kv::TRANSACTION_FAIL));
        }
        self.shadow = Some(self.stores.clone());
        Ok(())
    }

    pub(crate) fn commit(&mut self) -> NativeResult<()> {
        if self.shadow.take().is_none() {
            return Err(NativeError::kv(kv::TRANSACTION_FAIL));
        }
        Ok(())
    }

    pub(crate) fn abort(&mut self) -> NativeResult<()> {
        match self.shadow.take() {
            Some(image) => {
                self.stores = image;
                Ok(())
            }
            None => Err(NativeError::kv(kv::TRANSACTION_FAIL)),
        }
    }

    /// Restores the pre-transaction image without closing the
    /// transaction. Used when a commit's durability step fails.
    pub(crate) fn restore_shadow(&mut self) {
        if let Some(image) = self.shadow.take() {
            self.stores = image;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obtain_creates_store_once() {
        let mut set = StoreSet::new(false);
        set.obtain("a").set(b"k", b"", b"v").unwrap();
        assert_eq!(set.obtain("a").record_count().unwrap(), 1);
        assert_eq!(set.obtain("b").record_count().unwrap(), 0);
    }

    #[test]
    fn sequences_are_monotonic_per_store() {
        let mut set = StoreSet::new(false);
        let store = set.obtain("a");
        assert_eq!(store.set(b"x", b"", b"1").unwrap(), 1);
        assert_eq!(store.set(b"y", b"", b"2").unwrap(), 2);
        assert_eq!(store.last_sequence().unwrap(), 2);
    }

    #[test]
    fn abort_restores_previous_image() {
        let mut set = StoreSet::new(false);
        set.obtain("a").set(b"k", b"", b"old").unwrap();

        set.begin().unwrap();
        set.obtain("a").set(b"k", b"", b"new").unwrap();
        set.abort().unwrap();

        let record = set.obtain("a").get(b"k").unwrap().unwrap();
        assert_eq!(record.body, b"old");
    }

    #[test]
    fn nested_begin_is_a_transaction_fault() {
        let mut set = StoreSet::new(false);
        set.begin().unwrap();
        let err = set.begin().unwrap_err();
        assert_eq!(err, NativeError::kv(kv::TRANSACTION_FAIL));
    }

    #[test]
    fn commit_without_begin_is_a_transaction_fault() {
        let mut set = StoreSet::new(false);
        assert!(set.commit().is_err());
        assert!(set.abort().is_err());
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let mut set = StoreSet::new(true);
        let err = set.obtain("a").set(b"k", b"", b"v").unwrap_err();
        assert_eq!(err, NativeError::kv(kv::READ_ONLY_VIOLATION));
        let err = set.obtain("a").delete(b"k").unwrap_err();
        assert_eq!(err, NativeError::kv(kv::READ_ONLY_VIOLATION));
    }
}
