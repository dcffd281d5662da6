//! Revision-tree schema.

use super::{decode_meta, encode_meta, SchemaOps};
use crate::config::SchemaVersion;
use crate::document::DocMeta;
use crate::error::Result;
use tandem_storage::Record;

const META_TAG: u8 = SchemaVersion::V1 as u8;

/// Document behavior for revision-tree databases. Revision IDs are
/// compact `generation-digest` strings, so metadata stores them with a
/// one-byte length.
pub(crate) struct TreeSchema;

impl SchemaOps for TreeSchema {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V1
    }

    fn read_doc_meta(&self, record: &Record) -> Option<DocMeta> {
        decode_meta(META_TAG, false, &record.meta)
    }

    fn encode_doc_meta(&self, meta: &DocMeta) -> Result<Vec<u8>> {
        encode_meta(META_TAG, false, meta)
    }
}
