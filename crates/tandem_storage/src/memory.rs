//! In-memory storage provider for testing and ephemeral databases.

use crate::error::NativeResult;
use crate::provider::{
    EncryptionKey, KeyStore, ProviderConfig, StorageProvider, DEFAULT_KEY_STORE,
};
use crate::stores::StoreSet;
use std::path::Path;

/// A storage provider that keeps everything in memory.
///
/// Suitable for unit tests and ephemeral databases. It honors the full
/// provider contract, including transaction snapshot/rollback and the
/// read-only toggle; `rekey` is a no-op because nothing is at rest.
#[derive(Debug)]
pub struct MemoryProvider {
    set: StoreSet,
    schema_stamp: u8,
}

impl MemoryProvider {
    /// Creates a fresh in-memory provider.
    #[must_use]
    pub fn open(config: &ProviderConfig) -> Self {
        Self {
            set: StoreSet::new(config.read_only),
            schema_stamp: config.schema_stamp,
        }
    }
}

impl StorageProvider for MemoryProvider {
    fn path(&self) -> Option<&Path> {
        None
    }

    fn schema_stamp(&self) -> u8 {
        self.schema_stamp
    }

    fn is_new(&self) -> bool {
        true
    }

    fn default_key_store(&mut self) -> NativeResult<&mut dyn KeyStore> {
        self.key_store(DEFAULT_KEY_STORE)
    }

    fn key_store(&mut self, name: &str) -> NativeResult<&mut dyn KeyStore> {
        Ok(self.set.obtain(name))
    }

    fn begin_transaction(&mut self) -> NativeResult<()> {
        self.set.begin()
    }

    fn commit(&mut self) -> NativeResult<()> {
        self.set.commit()
    }

    fn abort(&mut self) -> NativeResult<()> {
        self.set.abort()
    }

    fn rekey(&mut self, _new_key: Option<EncryptionKey>) -> NativeResult<()> {
        Ok(())
    }

    fn close(&mut self) -> NativeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MemoryProvider {
        MemoryProvider::open(&ProviderConfig::default())
    }

    #[test]
    fn default_store_round_trip() {
        let mut p = provider();
        let ks = p.default_key_store().unwrap();
        let seq = ks.set(b"doc1", b"meta", b"body").unwrap();
        assert_eq!(seq, 1);

        let record = ks.get(b"doc1").unwrap().unwrap();
        assert_eq!(record.meta, b"meta");
        assert_eq!(record.body, b"body");
    }

    #[test]
    fn named_stores_are_independent() {
        let mut p = provider();
        p.key_store("a").unwrap().set(b"k", b"", b"1").unwrap();
        assert!(p.key_store("b").unwrap().get(b"k").unwrap().is_none());
    }

    #[test]
    fn abort_rolls_back_writes() {
        let mut p = provider();
        p.begin_transaction().unwrap();
        p.default_key_store()
            .unwrap()
            .set(b"k", b"", b"v")
            .unwrap();
        p.abort().unwrap();
        assert!(p.default_key_store().unwrap().get(b"k").unwrap().is_none());
    }

    #[test]
    fn commit_keeps_writes() {
        let mut p = provider();
        p.begin_transaction().unwrap();
        p.default_key_store()
            .unwrap()
            .set(b"k", b"", b"v")
            .unwrap();
        p.commit().unwrap();
        assert!(p.default_key_store().unwrap().get(b"k").unwrap().is_some());
    }

    #[test]
    fn reports_configured_schema_stamp() {
        let config = ProviderConfig {
            schema_stamp: 2,
            ..ProviderConfig::default()
        };
        let p = MemoryProvider::open(&config);
        assert_eq!(p.schema_stamp(), 2);
        assert!(p.is_new());
    }
}
