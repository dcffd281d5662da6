//! Storage provider trait definitions.

use crate::error::NativeResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Name of the key-value store every provider exposes by default.
pub const DEFAULT_KEY_STORE: &str = "default";

/// Size of an encryption key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// An encryption key for a provider's at-rest encryption.
///
/// Zeroized on drop. The key is never persisted; applications must
/// supply it on every open.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from exactly [`KEY_SIZE`] raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for opening a storage provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
    /// Whether to open the store read-only.
    pub read_only: bool,
    /// Schema stamp written into new stores and reported back for
    /// existing ones. Providers do not interpret it.
    pub schema_stamp: u8,
    /// Optional at-rest encryption key.
    pub encryption_key: Option<EncryptionKey>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            schema_stamp: 1,
            encryption_key: None,
        }
    }
}

/// A record stored in a key-value store.
///
/// `meta` is opaque to providers; the layer above encodes document
/// metadata into it per schema. `sequence` increases monotonically per
/// store with every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The record's key.
    pub key: Vec<u8>,
    /// Opaque metadata bytes.
    pub meta: Vec<u8>,
    /// The record body.
    pub body: Vec<u8>,
    /// Per-store write sequence.
    pub sequence: u64,
}

/// A named key→record namespace inside a storage provider.
///
/// References are served as `&mut dyn KeyStore` borrows from the owning
/// provider; ownership always stays with the provider.
pub trait KeyStore: Send {
    /// The store's name.
    fn name(&self) -> &str;

    /// Fetches the record for `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a native error if the store cannot be read.
    fn get(&self, key: &[u8]) -> NativeResult<Option<Record>>;

    /// Writes a record, returning the sequence assigned to it.
    ///
    /// # Errors
    ///
    /// Returns a native read-only violation if the provider was opened
    /// read-only, or an I/O-class native error.
    fn set(&mut self, key: &[u8], meta: &[u8], body: &[u8]) -> NativeResult<u64>;

    /// Removes the record for `key`. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns a native read-only violation if the provider was opened
    /// read-only.
    fn delete(&mut self, key: &[u8]) -> NativeResult<bool>;

    /// Number of records currently in the store.
    fn record_count(&self) -> NativeResult<u64>;

    /// The last sequence assigned by this store (0 if never written).
    fn last_sequence(&self) -> NativeResult<u64>;
}

/// An opened storage provider: a set of named key-value stores plus a
/// single, non-nested native transaction.
///
/// Providers are **not** internally synchronized and not reentrant; the
/// layer above serializes all access. Transaction discipline is the
/// caller's job: `begin_transaction` while one is open, or
/// `commit`/`abort` without one, fail with the engine's transaction
/// status code.
pub trait StorageProvider: Send {
    /// The on-disk path, if this provider is file-backed.
    fn path(&self) -> Option<&Path>;

    /// The schema stamp recorded in the store.
    fn schema_stamp(&self) -> u8;

    /// Whether this open created the store (as opposed to opening an
    /// existing one).
    fn is_new(&self) -> bool;

    /// The default key-value store.
    ///
    /// # Errors
    ///
    /// Returns a native error if the store cannot be materialized.
    fn default_key_store(&mut self) -> NativeResult<&mut dyn KeyStore>;

    /// A named key-value store, created on first access.
    ///
    /// # Errors
    ///
    /// Returns a native error if the store cannot be materialized.
    fn key_store(&mut self, name: &str) -> NativeResult<&mut dyn KeyStore>;

    /// Opens the native transaction.
    ///
    /// # Errors
    ///
    /// Fails if a native transaction is already open.
    fn begin_transaction(&mut self) -> NativeResult<()>;

    /// Commits and closes the native transaction, making all writes
    /// since `begin_transaction` durable atomically.
    ///
    /// # Errors
    ///
    /// Fails if no native transaction is open, or with a commit-failure
    /// status if durability could not be achieved. On commit failure the
    /// provider's durable state is whatever its own atomicity contract
    /// guarantees; no partial image is ever observable.
    fn commit(&mut self) -> NativeResult<()>;

    /// Rolls back and closes the native transaction.
    ///
    /// # Errors
    ///
    /// Fails if no native transaction is open.
    fn abort(&mut self) -> NativeResult<()>;

    /// Re-encrypts the store in place with `new_key` (or decrypts it
    /// when `None`). Atomic: on failure the store is unchanged.
    ///
    /// # Errors
    ///
    /// Returns a native read-only violation for read-only stores, or an
    /// I/O-class native error.
    fn rekey(&mut self, new_key: Option<EncryptionKey>) -> NativeResult<()>;

    /// Flushes and closes the provider. Further use is invalid.
    ///
    /// # Errors
    ///
    /// Returns a native error if final flushing fails.
    fn close(&mut self) -> NativeResult<()>;
}
