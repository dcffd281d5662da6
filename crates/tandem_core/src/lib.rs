//! TandemDB core: an embeddable document database engine.
//!
//! This crate provides the [`Database`] handle over the storage layer
//! in `tandem_storage`. A database stores schemaless documents (opaque
//! bodies plus revision metadata) in one of two on-disk schemas chosen
//! at open time: revision trees ([`SchemaVersion::V1`]) or version
//! vectors ([`SchemaVersion::V2`]).
//!
//! # Features
//!
//! - Persistent and in-memory databases, optionally encrypted
//! - Nested logical transactions coalesced onto one storage transaction
//! - A canonical error taxonomy spanning the engine's native code
//!   spaces ([`Error`], [`Error::standardized`])
//! - A process-wide, pluggable logging sink ([`log`])
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_core::{Database, DatabaseConfig, DocMeta};
//!
//! let db = Database::open_in_memory(DatabaseConfig::default())?;
//! db.with_transaction(|db| {
//!     db.put_document("greeting", &DocMeta::default(), b"hello")?;
//!     Ok(())
//! })?;
//! let doc = db.get_document("greeting", true)?;
//! assert_eq!(doc.body(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod log;
mod schema;

pub use config::{DatabaseConfig, SchemaVersion};
pub use database::Database;
pub use document::{DocMeta, Document, DocumentFlags};
pub use error::{set_warn_on_error, warn_on_error, Domain, Error, ErrorCode, Result};
pub use log::LogLevel;

// Storage types that appear in this crate's public API.
pub use tandem_storage::{
    EncryptionKey, KeyStore, NativeDomain, NativeError, Record, StorageProvider,
    DEFAULT_KEY_STORE, KEY_SIZE,
};
