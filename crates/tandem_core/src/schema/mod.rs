//! Schema-specific document behavior.
//!
//! A database is opened under one [`SchemaVersion`](crate::config::SchemaVersion)
//! and keeps that behavior for its whole lifetime. Everything that
//! differs between the revision-tree and version-vector schemas is
//! funneled through the [`SchemaOps`] trait, chosen once at open time;
//! the database itself stays schema-agnostic.

mod tree;
mod vector;

pub(crate) use tree::TreeSchema;
pub(crate) use vector::VectorSchema;

use crate::config::SchemaVersion;
use crate::document::{DocMeta, Document, DocumentFlags};
use crate::error::Result;
use tandem_storage::Record;

/// Behavior that differs between document schemas.
///
/// Implementations are stateless apart from lazily created per-schema
/// helpers, so a shared reference is enough for every operation.
pub(crate) trait SchemaOps: Send + Sync {
    /// The schema this implementation provides.
    fn version(&self) -> SchemaVersion;

    /// Decodes a stored record's metadata. Returns `None` when the
    /// metadata bytes are malformed or were written by a different
    /// schema.
    fn read_doc_meta(&self, record: &Record) -> Option<DocMeta>;

    /// Encodes metadata into the byte form stored in a record.
    ///
    /// Fails with `BadRevisionId` when the revision identifier exceeds
    /// the schema's length prefix, and `InvalidParameter` when the
    /// document type does; nothing is ever truncated to fit.
    fn encode_doc_meta(&self, meta: &DocMeta) -> Result<Vec<u8>>;

    /// Materializes a document from a stored record. Returns `None`
    /// when the record's metadata cannot be decoded.
    fn document_from_record(&self, record: &Record) -> Option<Document> {
        let meta = self.read_doc_meta(record)?;
        let doc_id = String::from_utf8_lossy(&record.key).into_owned();
        Some(Document::stored(
            doc_id,
            self.version(),
            meta,
            record.body.clone(),
            record.sequence,
        ))
    }

    /// Creates a fresh in-memory document that does not yet exist in
    /// storage.
    fn new_document(&self, doc_id: &str) -> Document {
        Document::new(doc_id.to_owned(), self.version())
    }

    /// Name of the key store holding CAS replication bookkeeping, for
    /// schemas that have one. Creates the bookkeeping on first call.
    fn cas_store_name(&self) -> Option<&'static str> {
        None
    }
}

/// Selects the schema implementation for a database being opened.
pub(crate) fn schema_ops(version: SchemaVersion) -> Box<dyn SchemaOps> {
    match version {
        SchemaVersion::V1 => Box::new(TreeSchema),
        SchemaVersion::V2 => Box::new(VectorSchema::new()),
    }
}

/// Shared meta wire helpers. Layout:
///
/// ```text
/// [tag u8][flags u8][rev_len ...][rev_id bytes][type_len u8][doc_type bytes]
/// ```
///
/// The tag byte is the schema stamp; `rev_len` is one byte under the
/// tree schema and a little-endian u16 under the vector schema, where
/// version vectors routinely outgrow a byte.
mod wire {
    use super::{DocMeta, DocumentFlags};
    use crate::error::{Error, ErrorCode, Result};

    pub(super) fn encode(tag: u8, wide_rev: bool, meta: &DocMeta) -> Result<Vec<u8>> {
        let rev = meta.rev_id.as_deref().unwrap_or(&[]);
        let doc_type = meta.doc_type.as_deref().unwrap_or("");
        let max_rev = if wide_rev {
            usize::from(u16::MAX)
        } else {
            usize::from(u8::MAX)
        };
        // Oversized fields are an error, never truncated: a shortened
        // revision ID would round-trip lossily, and a doc type cut
        // mid-character would produce meta that decode rejects.
        if rev.len() > max_rev {
            return Err(Error::report_code(ErrorCode::BadRevisionId));
        }
        if doc_type.len() > usize::from(u8::MAX) {
            return Err(Error::report_code(ErrorCode::InvalidParameter));
        }

        let mut out = Vec::with_capacity(5 + rev.len() + doc_type.len());
        out.push(tag);
        out.push(meta.flags.persisted().bits() as u8);
        if wide_rev {
            out.extend_from_slice(&(rev.len() as u16).to_le_bytes());
        } else {
            out.push(rev.len() as u8);
        }
        out.extend_from_slice(rev);
        out.push(doc_type.len() as u8);
        out.extend_from_slice(doc_type.as_bytes());
        Ok(out)
    }

    pub(super) fn decode(tag: u8, wide_rev: bool, bytes: &[u8]) -> Option<DocMeta> {
        let mut rest = bytes;
        if take(&mut rest, 1)?[0] != tag {
            return None;
        }
        let flags = DocumentFlags::from_bits(u32::from(take(&mut rest, 1)?[0]));
        let rev_len = if wide_rev {
            let len = take(&mut rest, 2)?;
            usize::from(u16::from_le_bytes([len[0], len[1]]))
        } else {
            usize::from(take(&mut rest, 1)?[0])
        };
        let rev = take(&mut rest, rev_len)?;
        let rev_id = (!rev.is_empty()).then(|| rev.to_vec());
        let type_len = usize::from(take(&mut rest, 1)?[0]);
        let doc_type_bytes = take(&mut rest, type_len)?;
        let doc_type = if doc_type_bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8(doc_type_bytes.to_vec()).ok()?)
        };
        if !rest.is_empty() {
            return None;
        }
        Some(DocMeta {
            flags,
            rev_id,
            doc_type,
        })
    }

    fn take<'a>(rest: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
        if rest.len() < n {
            return None;
        }
        let (head, tail) = rest.split_at(n);
        *rest = tail;
        Some(head)
    }
}

use wire::{decode as decode_meta, encode as encode_meta};

#[cfg(test)]
mod tests {
    use super::*;

    fn record(meta: Vec<u8>) -> Record {
        Record {
            key: b"doc1".to_vec(),
            meta,
            body: b"{}".to_vec(),
            sequence: 3,
        }
    }

    #[test]
    fn tree_meta_round_trip() {
        let ops = schema_ops(SchemaVersion::V1);
        let meta = DocMeta {
            flags: DocumentFlags::DELETED | DocumentFlags::HAS_ATTACHMENTS,
            rev_id: Some(b"3-deadbeef".to_vec()),
            doc_type: Some("profile".to_owned()),
        };
        let decoded = ops.read_doc_meta(&record(ops.encode_doc_meta(&meta).unwrap()));
        assert_eq!(decoded, Some(meta));
    }

    #[test]
    fn vector_meta_round_trip_with_long_revision() {
        let ops = schema_ops(SchemaVersion::V2);
        let meta = DocMeta {
            flags: DocumentFlags::CONFLICTED,
            rev_id: Some(vec![b'v'; 400]),
            doc_type: None,
        };
        let decoded = ops.read_doc_meta(&record(ops.encode_doc_meta(&meta).unwrap()));
        assert_eq!(decoded, Some(meta));
    }

    #[test]
    fn schemas_reject_each_others_meta() {
        let tree = schema_ops(SchemaVersion::V1);
        let vector = schema_ops(SchemaVersion::V2);
        let meta = DocMeta {
            flags: DocumentFlags::NONE,
            rev_id: Some(b"1-ab".to_vec()),
            doc_type: None,
        };
        let tree_bytes = tree.encode_doc_meta(&meta).unwrap();
        let vector_bytes = vector.encode_doc_meta(&meta).unwrap();
        assert!(vector.read_doc_meta(&record(tree_bytes)).is_none());
        assert!(tree.read_doc_meta(&record(vector_bytes)).is_none());
    }

    #[test]
    fn oversized_rev_id_is_rejected_not_truncated() {
        use crate::error::{Error, ErrorCode};

        let meta = DocMeta {
            flags: DocumentFlags::NONE,
            rev_id: Some(vec![b'r'; 300]),
            doc_type: None,
        };
        // 300 bytes fits the vector schema's length prefix but not the
        // tree schema's.
        let tree = schema_ops(SchemaVersion::V1);
        let err = tree.encode_doc_meta(&meta).unwrap_err();
        assert_eq!(err, Error::tandem(ErrorCode::BadRevisionId));

        let vector = schema_ops(SchemaVersion::V2);
        let decoded = vector
            .read_doc_meta(&record(vector.encode_doc_meta(&meta).unwrap()))
            .unwrap();
        assert_eq!(decoded.rev_id.as_deref().map(<[u8]>::len), Some(300));

        let huge = DocMeta {
            rev_id: Some(vec![b'r'; 70_000]),
            ..meta
        };
        let err = vector.encode_doc_meta(&huge).unwrap_err();
        assert_eq!(err, Error::tandem(ErrorCode::BadRevisionId));
    }

    #[test]
    fn oversized_doc_type_is_rejected_not_truncated() {
        use crate::error::{Error, ErrorCode};

        // 254 ASCII bytes plus one two-byte character: 256 bytes total.
        // A byte-truncating encoder would cut mid-character and emit
        // meta its own decoder rejects.
        let mut doc_type = "a".repeat(254);
        doc_type.push('é');
        let meta = DocMeta {
            flags: DocumentFlags::NONE,
            rev_id: None,
            doc_type: Some(doc_type),
        };
        for version in [SchemaVersion::V1, SchemaVersion::V2] {
            let err = schema_ops(version).encode_doc_meta(&meta).unwrap_err();
            assert_eq!(err, Error::tandem(ErrorCode::InvalidParameter));
        }

        // Exactly 255 bytes still fits.
        let meta = DocMeta {
            doc_type: Some("b".repeat(255)),
            ..meta
        };
        let ops = schema_ops(SchemaVersion::V1);
        let decoded = ops
            .read_doc_meta(&record(ops.encode_doc_meta(&meta).unwrap()))
            .unwrap();
        assert_eq!(decoded.doc_type.as_deref().map(str::len), Some(255));
    }

    #[test]
    fn malformed_meta_is_rejected() {
        let ops = schema_ops(SchemaVersion::V1);
        for bytes in [
            Vec::new(),
            vec![0xFF],
            vec![1, 0, 200],       // claims a rev longer than the buffer
            vec![1, 0, 0, 0, 99],  // trailing garbage after the fields
        ] {
            assert!(ops.read_doc_meta(&record(bytes)).is_none());
        }
    }

    #[test]
    fn empty_fields_decode_as_absent() {
        let ops = schema_ops(SchemaVersion::V1);
        let decoded = ops
            .read_doc_meta(&record(ops.encode_doc_meta(&DocMeta::default()).unwrap()))
            .unwrap();
        assert!(decoded.rev_id.is_none());
        assert!(decoded.doc_type.is_none());
    }

    #[test]
    fn document_from_record_carries_identity() {
        let ops = schema_ops(SchemaVersion::V1);
        let meta = DocMeta {
            flags: DocumentFlags::NONE,
            rev_id: Some(b"1-aa".to_vec()),
            doc_type: None,
        };
        let doc = ops
            .document_from_record(&record(ops.encode_doc_meta(&meta).unwrap()))
            .unwrap();
        assert_eq!(doc.id(), "doc1");
        assert_eq!(doc.sequence(), 3);
        assert!(doc.exists());
        assert_eq!(doc.body(), b"{}");
    }
}
