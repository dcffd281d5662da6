//! Database facade: open/close, transactions, and document access.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use tandem_storage::{
    EncryptionKey, FileProvider, KeyStore, MemoryProvider, ProviderConfig, Record, StorageProvider,
};

use crate::config::{DatabaseConfig, SchemaVersion};
use crate::document::{DocMeta, Document};
use crate::error::{db_assert, Error, ErrorCode, Result};
use crate::log::{self, LogLevel};
use crate::schema::{schema_ops, SchemaOps};

/// State of the logical transaction stack.
#[derive(Debug, Default)]
struct TxnState {
    /// Nesting depth. Zero means no transaction is open.
    level: u32,
    /// Per-top-level-transaction state; present iff `level > 0`.
    active: Option<LogicalTransaction>,
}

#[derive(Debug)]
struct LogicalTransaction {
    /// Set when any nesting level ends without committing. Once set,
    /// the whole native transaction aborts, no matter how the outer
    /// levels end.
    abort_requested: bool,
}

/// Proof that the transaction lock is held.
///
/// The storage provider's mutex may only be taken through
/// [`Database::provider_lock`], which demands one of these, so the
/// transaction lock is always acquired first and the two locks cannot
/// deadlock against each other.
struct TransactionGuard<'a> {
    state: ReentrantMutexGuard<'a, RefCell<TxnState>>,
}

/// A document database handle.
///
/// A `Database` owns one storage provider and interprets its default
/// key store as a set of documents under the schema fixed at open
/// time. Handles are safe to share across threads; transactions nest
/// per handle, with all nesting levels coalesced onto a single native
/// storage transaction.
///
/// # Example
///
/// ```rust,ignore
/// use tandem_core::{Database, DatabaseConfig, DocMeta};
///
/// let db = Database::open_in_memory(DatabaseConfig::default())?;
/// db.begin_transaction()?;
/// db.put_document("greeting", &DocMeta::default(), b"hello")?;
/// db.end_transaction(true)?;
/// ```
pub struct Database {
    config: DatabaseConfig,
    path: Option<PathBuf>,
    schema: Box<dyn SchemaOps>,
    provider: Mutex<Box<dyn StorageProvider>>,
    /// Reentrant so that nested API calls on the same thread can take
    /// it again while a transaction is open.
    txn_state: ReentrantMutex<RefCell<TxnState>>,
}

impl Database {
    /// Opens a database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `CantOpenFile` when the file is missing and
    /// `create_if_missing` is off, `NotADatabaseFile` when the file is
    /// unrecognized or the encryption key is wrong, and `WrongFormat`
    /// when an existing file was created under a different schema.
    pub fn open(path: &Path, config: DatabaseConfig) -> Result<Self> {
        let provider = FileProvider::open(path, &Self::provider_config(&config))?;
        Self::open_with_provider(Box::new(provider), config)
    }

    /// Opens a transient in-memory database. Useful for tests and
    /// caches; nothing survives the handle.
    pub fn open_in_memory(config: DatabaseConfig) -> Result<Self> {
        let provider = MemoryProvider::open(&Self::provider_config(&config));
        Self::open_with_provider(Box::new(provider), config)
    }

    /// Opens a database over an already-constructed storage provider.
    ///
    /// # Errors
    ///
    /// Returns `WrongFormat` when the provider holds existing data
    /// stamped with a different schema than `config.schema`.
    pub fn open_with_provider(
        provider: Box<dyn StorageProvider>,
        config: DatabaseConfig,
    ) -> Result<Self> {
        if !provider.is_new() && provider.schema_stamp() != config.schema.stamp() {
            return Err(Error::report_code(ErrorCode::WrongFormat));
        }
        let path = provider.path().map(Path::to_path_buf);
        Ok(Self {
            schema: schema_ops(config.schema),
            config,
            path,
            provider: Mutex::new(provider),
            txn_state: ReentrantMutex::new(RefCell::new(TxnState::default())),
        })
    }

    fn provider_config(config: &DatabaseConfig) -> ProviderConfig {
        ProviderConfig {
            create_if_missing: config.create_if_missing,
            read_only: config.read_only,
            schema_stamp: config.schema.stamp(),
            encryption_key: config.encryption.clone(),
        }
    }

    /// The configuration this database was opened with.
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The database file's path, or `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The schema this database was opened under.
    #[must_use]
    pub const fn schema_version(&self) -> SchemaVersion {
        self.config.schema
    }

    /// Fails with `UnsupportedOperation` unless this database uses
    /// `required`.
    pub fn must_be_schema(&self, required: SchemaVersion) -> Result<()> {
        if self.config.schema == required {
            Ok(())
        } else {
            Err(Error::report_code(ErrorCode::UnsupportedOperation))
        }
    }

    // ---- Locking -------------------------------------------------------

    fn txn_lock(&self) -> TransactionGuard<'_> {
        TransactionGuard {
            state: self.txn_state.lock(),
        }
    }

    /// Locks the storage provider. Requires the transaction lock, which
    /// fixes the acquisition order of the two locks.
    fn provider_lock<'a>(
        &'a self,
        _proof: &TransactionGuard<'a>,
    ) -> MutexGuard<'a, Box<dyn StorageProvider>> {
        self.provider.lock()
    }

    // ---- Transactions --------------------------------------------------

    /// Begins a transaction, or deepens the one already open on this
    /// handle. The first level opens a native storage transaction;
    /// further levels only bump the nesting count.
    pub fn begin_transaction(&self) -> Result<()> {
        let txn = self.txn_lock();
        let level = txn.state.borrow().level;
        if level == 0 {
            self.provider_lock(&txn).begin_transaction()?;
            txn.state.borrow_mut().active = Some(LogicalTransaction {
                abort_requested: false,
            });
        }
        txn.state.borrow_mut().level = level + 1;
        Ok(())
    }

    /// Ends the innermost transaction level.
    ///
    /// Returns `Ok(false)` without side effects when no transaction is
    /// open. When the outermost level ends, the native transaction is
    /// resolved exactly once: it commits only if every level ended with
    /// `commit == true`, and aborts otherwise.
    pub fn end_transaction(&self, commit: bool) -> Result<bool> {
        let txn = self.txn_lock();
        let mut state = txn.state.borrow_mut();
        if state.level == 0 {
            return Ok(false);
        }
        if !commit {
            if let Some(active) = state.active.as_mut() {
                active.abort_requested = true;
            }
        }
        state.level -= 1;
        if state.level > 0 {
            return Ok(true);
        }
        let active = state.active.take();
        drop(state);
        db_assert!(active.is_some());

        let abort_requested = active.map_or(true, |a| a.abort_requested);
        let mut provider = self.provider_lock(&txn);
        if commit && !abort_requested {
            provider.commit()?;
        } else {
            provider.abort()?;
        }
        Ok(true)
    }

    /// Whether a transaction is open on this handle.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.txn_lock().state.borrow().level > 0
    }

    /// Fails with `NotInTransaction` unless a transaction is open.
    pub fn must_be_in_transaction(&self) -> Result<()> {
        if self.in_transaction() {
            Ok(())
        } else {
            Err(Error::report_code(ErrorCode::NotInTransaction))
        }
    }

    /// Fails with `TransactionNotClosed` if a transaction is open.
    pub fn must_not_be_in_transaction(&self) -> Result<()> {
        if self.in_transaction() {
            Err(Error::report_code(ErrorCode::TransactionNotClosed))
        } else {
            Ok(())
        }
    }

    /// Runs `f` inside a transaction, committing on `Ok` and aborting
    /// on `Err`.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.end_transaction(true)?;
                Ok(value)
            }
            Err(err) => {
                // Propagate the original failure even if the abort
                // itself fails.
                let _ = self.end_transaction(false);
                Err(err)
            }
        }
    }

    // ---- Key store access ----------------------------------------------

    /// Runs `f` with exclusive access to the named key store.
    pub fn with_key_store<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut dyn KeyStore) -> Result<T>,
    ) -> Result<T> {
        let txn = self.txn_lock();
        let mut provider = self.provider_lock(&txn);
        f(provider.key_store(name)?)
    }

    /// Runs `f` with exclusive access to the default (document) key
    /// store.
    pub fn with_default_key_store<T>(
        &self,
        f: impl FnOnce(&mut dyn KeyStore) -> Result<T>,
    ) -> Result<T> {
        let txn = self.txn_lock();
        let mut provider = self.provider_lock(&txn);
        f(provider.default_key_store()?)
    }

    /// Runs `f` with the version-vector replication bookkeeping store.
    /// Only available under [`SchemaVersion::V2`]; the store is created
    /// on first use.
    pub fn with_cas_store<T>(
        &self,
        f: impl FnOnce(&mut dyn KeyStore) -> Result<T>,
    ) -> Result<T> {
        self.must_be_schema(SchemaVersion::V2)?;
        let name = self
            .schema
            .cas_store_name()
            .ok_or_else(|| Error::report_code(ErrorCode::UnsupportedOperation))?;
        self.with_key_store(name, f)
    }

    // ---- Documents -----------------------------------------------------

    /// Creates a fresh in-memory document that does not yet exist in
    /// storage.
    #[must_use]
    pub fn new_document(&self, doc_id: &str) -> Document {
        self.schema.new_document(doc_id)
    }

    /// Decodes a stored record's document metadata. Returns `None` for
    /// metadata this database's schema cannot interpret.
    #[must_use]
    pub fn read_doc_meta(&self, record: &Record) -> Option<DocMeta> {
        self.schema.read_doc_meta(record)
    }

    /// Materializes a document from a stored record.
    ///
    /// # Errors
    ///
    /// Returns `CorruptRevisionData` when the record's metadata cannot
    /// be decoded under this database's schema.
    pub fn document_from_record(&self, record: &Record) -> Result<Document> {
        self.schema
            .document_from_record(record)
            .ok_or_else(|| Error::report_code(ErrorCode::CorruptRevisionData))
    }

    /// Reads a document by ID.
    ///
    /// With `must_exist`, a missing document fails with `NotFound`;
    /// otherwise it yields a fresh document whose
    /// [`exists`](Document::exists) is false.
    pub fn get_document(&self, doc_id: &str, must_exist: bool) -> Result<Document> {
        let record = self.with_default_key_store(|store| Ok(store.get(doc_id.as_bytes())?))?;
        match record {
            Some(record) => self.document_from_record(&record),
            None if must_exist => Err(Error::report_code(ErrorCode::NotFound)),
            None => Ok(self.new_document(doc_id)),
        }
    }

    /// Writes a document, returning the sequence assigned to it. Must
    /// be called inside a transaction.
    ///
    /// # Errors
    ///
    /// Fails with `BadRevisionId` / `InvalidParameter` when the
    /// metadata's revision ID or doc type exceeds what the schema can
    /// store; nothing is written in that case.
    pub fn put_document(&self, doc_id: &str, meta: &DocMeta, body: &[u8]) -> Result<u64> {
        self.must_be_in_transaction()?;
        let meta_bytes = self.schema.encode_doc_meta(meta)?;
        self.with_default_key_store(|store| {
            Ok(store.set(doc_id.as_bytes(), &meta_bytes, body)?)
        })
    }

    /// Removes a document and all its metadata, with no tombstone left
    /// behind. Returns whether the document existed. Must be called
    /// inside a transaction.
    pub fn purge_document(&self, doc_id: &str) -> Result<bool> {
        self.must_be_in_transaction()?;
        self.with_default_key_store(|store| Ok(store.delete(doc_id.as_bytes())?))
    }

    /// Number of documents in the default key store.
    pub fn document_count(&self) -> Result<u64> {
        self.with_default_key_store(|store| Ok(store.record_count()?))
    }

    /// The last sequence assigned in the default key store.
    pub fn last_sequence(&self) -> Result<u64> {
        self.with_default_key_store(|store| Ok(store.last_sequence()?))
    }

    // ---- Maintenance ---------------------------------------------------

    /// Re-encrypts the database with `new_key`, or decrypts it when
    /// `None`. Not allowed while a transaction is open.
    pub fn rekey(&self, new_key: Option<EncryptionKey>) -> Result<()> {
        self.must_not_be_in_transaction()?;
        let txn = self.txn_lock();
        self.provider_lock(&txn).rekey(new_key)?;
        Ok(())
    }

    /// Re-encrypts a storage provider that is not (yet) owned by a
    /// database handle. The provider's rekey must be atomic: on failure
    /// the store is unchanged.
    pub fn rekey_provider(
        provider: &mut dyn StorageProvider,
        new_key: Option<EncryptionKey>,
    ) -> Result<()> {
        provider.rekey(new_key)?;
        Ok(())
    }

    /// Closes the database, flushing buffered state. Not allowed while
    /// a transaction is open.
    pub fn close(self) -> Result<()> {
        self.must_not_be_in_transaction()?;
        let txn = self.txn_lock();
        self.provider_lock(&txn).close()?;
        drop(txn);
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let level = self.txn_state.lock().borrow().level;
        if level > 0 {
            log::write(
                LogLevel::Error,
                &format!("database dropped with a transaction still open (depth {level})"),
            );
            debug_assert!(false, "database dropped with a transaction still open");
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("schema", &self.config.schema)
            .field("read_only", &self.config.read_only)
            .finish_non_exhaustive()
    }
}
