//! Native error codes reported by storage providers.
//!
//! Each provider reports failures in its own status-code space: the
//! key-value engine uses negative codes, the SQL engine uses small
//! positive codes, and OS-level failures carry a raw errno. Callers that
//! want a uniform vocabulary standardize these through the taxonomy in
//! `tandem_core`; this crate only preserves the native codes with full
//! fidelity and knows how to render them as text.

use std::io;
use thiserror::Error;

/// Result type for provider operations.
pub type NativeResult<T> = Result<T, NativeError>;

/// The status-code space a native error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeDomain {
    /// The key-value/page storage engine.
    KeyValue,
    /// The SQL storage engine.
    Sql,
    /// The operating system (errno values).
    Os,
}

impl NativeDomain {
    /// Short name used in rendered messages and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::KeyValue => "KeyValue",
            Self::Sql => "SQL",
            Self::Os => "POSIX",
        }
    }
}

/// A failure reported by a storage provider in its native code space.
///
/// Code 0 means "no error" in every domain and is never constructed as a
/// failure by the providers in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{} error {}: {}", domain.name(), code, render_message(*domain, *code))]
pub struct NativeError {
    /// The code space this error belongs to.
    pub domain: NativeDomain,
    /// The status code, meaningful within `domain`.
    pub code: i32,
}

impl NativeError {
    /// Creates a native error from a domain and status code.
    #[must_use]
    pub const fn new(domain: NativeDomain, code: i32) -> Self {
        Self { domain, code }
    }

    /// Creates a key-value engine error.
    #[must_use]
    pub const fn kv(code: i32) -> Self {
        Self::new(NativeDomain::KeyValue, code)
    }

    /// Creates a SQL engine error.
    #[must_use]
    pub const fn sql(code: i32) -> Self {
        Self::new(NativeDomain::Sql, code)
    }

    /// Creates an OS error from a raw errno value.
    #[must_use]
    pub const fn os(errno: i32) -> Self {
        Self::new(NativeDomain::Os, errno)
    }

    /// Renders the human-readable message for this error.
    #[must_use]
    pub fn message(&self) -> String {
        render_message(self.domain, self.code)
    }
}

fn render_message(domain: NativeDomain, code: i32) -> String {
    match domain {
        NativeDomain::KeyValue => kv::message(code).to_owned(),
        NativeDomain::Sql => sql::message(code).to_owned(),
        NativeDomain::Os => io::Error::from_raw_os_error(code).to_string(),
    }
}

/// Status codes of the key-value storage engine.
///
/// Negative codes, 0 is success. The `E_*` block wraps errno values the
/// engine surfaces through its own space; they carry no detail beyond
/// the errno they stand for.
pub mod kv {
    /// Operation succeeded.
    pub const OK: i32 = 0;
    /// Invalid arguments passed to the engine.
    pub const INVALID_ARGS: i32 = -1;
    /// The store could not be opened.
    pub const OPEN_FAIL: i32 = -2;
    /// The store file does not exist.
    pub const NO_SUCH_FILE: i32 = -3;
    /// A write to the store failed.
    pub const WRITE_FAIL: i32 = -4;
    /// A read from the store failed.
    pub const READ_FAIL: i32 = -5;
    /// Closing the store failed.
    pub const CLOSE_FAIL: i32 = -6;
    /// Committing the native transaction failed.
    pub const COMMIT_FAIL: i32 = -7;
    /// The engine ran out of memory.
    pub const ALLOC_FAIL: i32 = -8;
    /// The requested key does not exist.
    pub const KEY_NOT_FOUND: i32 = -9;
    /// A write was attempted on a read-only store.
    pub const READ_ONLY_VIOLATION: i32 = -10;
    /// Seeking within the store file failed.
    pub const SEEK_FAIL: i32 = -11;
    /// Syncing the store file failed.
    pub const SYNC_FAIL: i32 = -12;
    /// A stored checksum did not match.
    pub const CHECKSUM_ERROR: i32 = -13;
    /// The store file is corrupted.
    pub const FILE_CORRUPT: i32 = -14;
    /// The store handle is invalid or closed.
    pub const INVALID_HANDLE: i32 = -15;
    /// The file has no valid database headers (not a store, or the
    /// encryption key is wrong).
    pub const NO_DB_HEADERS: i32 = -16;
    /// A transaction operation was invalid (nested begin, commit with
    /// no transaction open).
    pub const TRANSACTION_FAIL: i32 = -17;

    /// Wrapped errno: operation not permitted.
    pub const E_PERM: i32 = -20;
    /// Wrapped errno: I/O error.
    pub const E_IO: i32 = -21;
    /// Wrapped errno: out of memory.
    pub const E_NOMEM: i32 = -22;
    /// Wrapped errno: permission denied.
    pub const E_ACCESS: i32 = -23;
    /// Wrapped errno: file exists.
    pub const E_EXIST: i32 = -24;
    /// Wrapped errno: invalid argument.
    pub const E_INVAL: i32 = -25;
    /// Wrapped errno: no space left on device.
    pub const E_NOSPC: i32 = -26;
    /// Wrapped errno: resource temporarily unavailable.
    pub const E_AGAIN: i32 = -27;

    /// Renders the message for a key-value engine status code.
    #[must_use]
    pub fn message(code: i32) -> &'static str {
        match code {
            OK => "no error",
            INVALID_ARGS => "invalid arguments",
            OPEN_FAIL => "error opening file",
            NO_SUCH_FILE => "no such file",
            WRITE_FAIL => "error writing to file",
            READ_FAIL => "error reading from file",
            CLOSE_FAIL => "error closing file",
            COMMIT_FAIL => "commit failure",
            ALLOC_FAIL => "memory allocation failure",
            KEY_NOT_FOUND => "key not found",
            READ_ONLY_VIOLATION => "read-only violation",
            SEEK_FAIL => "error seeking in file",
            SYNC_FAIL => "error syncing file",
            CHECKSUM_ERROR => "checksum error",
            FILE_CORRUPT => "data corruption",
            INVALID_HANDLE => "invalid handle",
            NO_DB_HEADERS => "no database headers",
            TRANSACTION_FAIL => "transaction operation failed",
            E_PERM => "operation not permitted",
            E_IO => "I/O error",
            E_NOMEM => "out of memory",
            E_ACCESS => "permission denied",
            E_EXIST => "file exists",
            E_INVAL => "invalid argument",
            E_NOSPC => "no space left on device",
            E_AGAIN => "resource temporarily unavailable",
            _ => "unknown storage engine error",
        }
    }
}

/// Status codes of the SQL storage engine.
///
/// Small positive primary codes, 0 is success.
pub mod sql {
    /// Operation succeeded.
    pub const OK: i32 = 0;
    /// Generic SQL error.
    pub const ERROR: i32 = 1;
    /// Access permission denied.
    pub const PERM: i32 = 3;
    /// The database file is busy.
    pub const BUSY: i32 = 5;
    /// A table in the database is locked.
    pub const LOCKED: i32 = 6;
    /// The engine ran out of memory.
    pub const NOMEM: i32 = 7;
    /// Attempt to write a read-only database.
    pub const READONLY: i32 = 8;
    /// Disk I/O error.
    pub const IOERR: i32 = 10;
    /// The database disk image is malformed.
    pub const CORRUPT: i32 = 11;
    /// The database is full.
    pub const FULL: i32 = 13;
    /// Unable to open the database file.
    pub const CANTOPEN: i32 = 14;
    /// The file is not a database.
    pub const NOTADB: i32 = 26;

    /// Renders the message for a SQL engine status code.
    #[must_use]
    pub fn message(code: i32) -> &'static str {
        match code {
            OK => "not an error",
            ERROR => "SQL logic error",
            PERM => "access permission denied",
            BUSY => "database is locked",
            LOCKED => "database table is locked",
            NOMEM => "out of memory",
            READONLY => "attempt to write a readonly database",
            IOERR => "disk I/O error",
            CORRUPT => "database disk image is malformed",
            FULL => "database or disk is full",
            CANTOPEN => "unable to open database file",
            NOTADB => "file is not a database",
            _ => "unknown SQL engine error",
        }
    }
}

/// Common POSIX errno values used by the error mapping tables and tests.
pub mod os {
    /// Operation not permitted.
    pub const EPERM: i32 = 1;
    /// I/O error.
    pub const EIO: i32 = 5;
    /// Resource temporarily unavailable.
    pub const EAGAIN: i32 = 11;
    /// Out of memory.
    pub const ENOMEM: i32 = 12;
    /// Permission denied.
    pub const EACCES: i32 = 13;
    /// File exists.
    pub const EEXIST: i32 = 17;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// No space left on device.
    pub const ENOSPC: i32 = 28;
}
