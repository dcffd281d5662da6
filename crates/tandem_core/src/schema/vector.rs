//! Version-vector schema.

use parking_lot::Mutex;

use super::{decode_meta, encode_meta, SchemaOps};
use crate::config::SchemaVersion;
use crate::document::DocMeta;
use crate::error::Result;
use tandem_storage::Record;

const META_TAG: u8 = SchemaVersion::V2 as u8;

/// Name of the key store that holds server-state bookkeeping for
/// version-vector replication.
pub(crate) const CAS_STORE_NAME: &str = "cas_revs";

/// Bookkeeping for revisions synced against an external compare-and-swap
/// server. Created on demand; most version-vector databases never
/// replicate and never pay for it.
#[derive(Debug)]
pub(crate) struct CasRevisionStore {
    store_name: &'static str,
}

impl CasRevisionStore {
    fn new() -> Self {
        Self {
            store_name: CAS_STORE_NAME,
        }
    }

    /// The key store this bookkeeping lives in.
    pub(crate) fn store_name(&self) -> &'static str {
        self.store_name
    }
}

/// Document behavior for version-vector databases. Revision IDs are
/// whole version vectors, which outgrow a single length byte, so
/// metadata stores them with a two-byte length.
pub(crate) struct VectorSchema {
    cas_store: Mutex<Option<CasRevisionStore>>,
}

impl VectorSchema {
    pub(crate) fn new() -> Self {
        Self {
            cas_store: Mutex::new(None),
        }
    }

    /// Returns the CAS revision bookkeeping's store name, creating the
    /// bookkeeping on first use.
    fn ensure_cas_store(&self) -> &'static str {
        self.cas_store
            .lock()
            .get_or_insert_with(CasRevisionStore::new)
            .store_name()
    }
}

impl SchemaOps for VectorSchema {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V2
    }

    fn read_doc_meta(&self, record: &Record) -> Option<DocMeta> {
        decode_meta(META_TAG, true, &record.meta)
    }

    fn encode_doc_meta(&self, meta: &DocMeta) -> Result<Vec<u8>> {
        encode_meta(META_TAG, true, meta)
    }

    fn cas_store_name(&self) -> Option<&'static str> {
        Some(self.ensure_cas_store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_store_is_created_once() {
        let schema = VectorSchema::new();
        assert!(schema.cas_store.lock().is_none());
        assert_eq!(schema.ensure_cas_store(), CAS_STORE_NAME);
        assert!(schema.cas_store.lock().is_some());
        assert_eq!(schema.ensure_cas_store(), CAS_STORE_NAME);
    }
}
