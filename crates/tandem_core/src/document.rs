//! Documents and their stored metadata.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::config::SchemaVersion;

/// Bit flags describing a document's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DocumentFlags(u32);

impl DocumentFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The document's current revision is a deletion (tombstone).
    pub const DELETED: Self = Self(0x01);
    /// The document has unresolved conflicting revisions.
    pub const CONFLICTED: Self = Self(0x02);
    /// The document's body references binary attachments.
    pub const HAS_ATTACHMENTS: Self = Self(0x04);
    /// The document exists in storage. Never persisted; set only on
    /// documents read back from a key store.
    pub const EXISTS: Self = Self(0x1000);

    /// Flag bits that are stored on disk.
    const PERSISTED_MASK: u32 = 0xFF;

    /// Constructs flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// This flag set restricted to the bits that are persisted.
    #[must_use]
    pub const fn persisted(self) -> Self {
        Self(self.0 & Self::PERSISTED_MASK)
    }
}

impl BitOr for DocumentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DocumentFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Metadata stored alongside a document's body.
///
/// The revision identifier is schema-dependent: a revision-tree ID
/// under [`SchemaVersion::V1`], a version vector under
/// [`SchemaVersion::V2`]. It is kept as raw bytes here; interpreting it
/// is the schema's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocMeta {
    /// Flag bits (persisted subset only).
    pub flags: DocumentFlags,
    /// Identifier of the document's current revision.
    pub rev_id: Option<Vec<u8>>,
    /// Optional application-assigned document type.
    pub doc_type: Option<String>,
}

/// An in-memory view of one document.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    doc_id: String,
    schema: SchemaVersion,
    meta: DocMeta,
    body: Vec<u8>,
    sequence: u64,
    exists: bool,
}

impl Document {
    pub(crate) fn new(doc_id: String, schema: SchemaVersion) -> Self {
        Self {
            doc_id,
            schema,
            meta: DocMeta::default(),
            body: Vec::new(),
            sequence: 0,
            exists: false,
        }
    }

    pub(crate) fn stored(
        doc_id: String,
        schema: SchemaVersion,
        meta: DocMeta,
        body: Vec<u8>,
        sequence: u64,
    ) -> Self {
        Self {
            doc_id,
            schema,
            meta,
            body,
            sequence,
            exists: true,
        }
    }

    /// The document's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.doc_id
    }

    /// The schema this document was read or created under.
    #[must_use]
    pub const fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// The document's flags. Includes [`DocumentFlags::EXISTS`] when
    /// the document was read from storage.
    #[must_use]
    pub fn flags(&self) -> DocumentFlags {
        if self.exists {
            self.meta.flags | DocumentFlags::EXISTS
        } else {
            self.meta.flags
        }
    }

    /// The stored metadata.
    #[must_use]
    pub const fn meta(&self) -> &DocMeta {
        &self.meta
    }

    /// The identifier of the current revision, if any.
    #[must_use]
    pub fn rev_id(&self) -> Option<&[u8]> {
        self.meta.rev_id.as_deref()
    }

    /// The application-assigned document type, if any.
    #[must_use]
    pub fn doc_type(&self) -> Option<&str> {
        self.meta.doc_type.as_deref()
    }

    /// The document body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The storage sequence assigned at the last save, or 0 for a
    /// document that has never been saved.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the document exists in storage.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// Whether the current revision is a deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.meta.flags.contains(DocumentFlags::DELETED)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.doc_id)
            .field("schema", &self.schema)
            .field("flags", &self.flags())
            .field("sequence", &self.sequence)
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_test() {
        let flags = DocumentFlags::DELETED | DocumentFlags::HAS_ATTACHMENTS;
        assert!(flags.contains(DocumentFlags::DELETED));
        assert!(flags.contains(DocumentFlags::HAS_ATTACHMENTS));
        assert!(!flags.contains(DocumentFlags::CONFLICTED));
    }

    #[test]
    fn exists_flag_is_not_persisted() {
        let flags = DocumentFlags::DELETED | DocumentFlags::EXISTS;
        assert_eq!(flags.persisted(), DocumentFlags::DELETED);
    }

    #[test]
    fn fresh_document_has_no_state() {
        let doc = Document::new("doc1".to_owned(), SchemaVersion::V1);
        assert_eq!(doc.id(), "doc1");
        assert!(!doc.exists());
        assert_eq!(doc.sequence(), 0);
        assert!(doc.rev_id().is_none());
        assert!(!doc.flags().contains(DocumentFlags::EXISTS));
    }

    #[test]
    fn stored_document_reports_exists() {
        let meta = DocMeta {
            flags: DocumentFlags::DELETED,
            rev_id: Some(b"2-c0ffee".to_vec()),
            doc_type: Some("note".to_owned()),
        };
        let doc = Document::stored("doc1".to_owned(), SchemaVersion::V1, meta, vec![1, 2], 7);
        assert!(doc.exists());
        assert!(doc.is_deleted());
        assert!(doc.flags().contains(DocumentFlags::EXISTS));
        assert_eq!(doc.rev_id(), Some(&b"2-c0ffee"[..]));
        assert_eq!(doc.doc_type(), Some("note"));
        assert_eq!(doc.sequence(), 7);
    }
}
