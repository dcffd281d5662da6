//! # tandem_storage
//!
//! Storage provider boundary for tandemdb.
//!
//! A [`StorageProvider`] is an opened backing store exposing named
//! [`KeyStore`]s and a single, non-nested native transaction. Providers
//! report failures as [`NativeError`]s in their own status-code space
//! (key-value engine, SQL engine, or OS errno); the layer above
//! normalizes those into its canonical taxonomy.
//!
//! Two reference providers ship with the crate:
//!
//! - [`MemoryProvider`] — ephemeral, for tests and throwaway databases
//! - [`FileProvider`] — single-file persistence with optional
//!   AES-256-GCM encryption at rest and atomic commit/rekey
//!
//! Providers are deliberately not internally synchronized; the database
//! handle above serializes all access.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod provider;
mod stores;

pub use error::{kv, os, sql, NativeDomain, NativeError, NativeResult};
pub use file::FileProvider;
pub use memory::MemoryProvider;
pub use provider::{
    EncryptionKey, KeyStore, ProviderConfig, Record, StorageProvider, DEFAULT_KEY_STORE,
    KEY_SIZE,
};
