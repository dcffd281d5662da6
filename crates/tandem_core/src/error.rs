//! Canonical error taxonomy.
//!
//! Every failure in tandemdb is a (domain, code) pair. The Tandem
//! domain is the canonical code space; the other three domains carry a
//! backend's native status (key-value engine, SQL engine, OS errno)
//! with full fidelity. [`Error::standardized`] folds native codes into
//! their canonical equivalents via ordered mapping tables, so callers
//! can branch on one vocabulary regardless of which backend failed,
//! while codes with no canonical equivalent stay inspectable in their
//! native domain.

use crate::log::{self, LogLevel};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_storage::{kv, os, NativeDomain, NativeError};
use thiserror::Error as ThisError;

/// Result type for tandemdb operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The code space an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// The canonical tandemdb code space ([`ErrorCode`]).
    Tandem,
    /// OS errno values.
    Os,
    /// The key-value storage engine's native codes.
    KeyValue,
    /// The SQL storage engine's native codes.
    Sql,
}

impl Domain {
    /// Short name used in rendered messages and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tandem => "Tandem",
            Self::Os => "POSIX",
            Self::KeyValue => "KeyValue",
            Self::Sql => "SQL",
        }
    }
}

impl From<NativeDomain> for Domain {
    fn from(domain: NativeDomain) -> Self {
        match domain {
            NativeDomain::KeyValue => Self::KeyValue,
            NativeDomain::Sql => Self::Sql,
            NativeDomain::Os => Self::Os,
        }
    }
}

/// Canonical error codes of the Tandem domain.
///
/// Code 0 is the reserved "no error" sentinel and has no variant; it is
/// never raised as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// An internal invariant check failed.
    AssertionFailed = 1,
    /// An unimplemented function was called.
    Unimplemented = 2,
    /// The requested encryption algorithm is not supported.
    UnsupportedEncryption = 3,
    /// A revision ID could not be parsed.
    BadRevisionId = 4,
    /// A version vector could not be parsed.
    BadVersionVector = 5,
    /// Stored revision data is corrupt.
    CorruptRevisionData = 6,
    /// Stored index data is corrupt.
    CorruptIndexData = 7,
    /// The database is not open.
    NotOpen = 8,
    /// The requested item does not exist.
    NotFound = 9,
    /// The requested item has been deleted.
    Deleted = 10,
    /// A revision conflict was detected.
    Conflict = 11,
    /// An invalid parameter was passed.
    InvalidParameter = 12,
    /// A lower-layer database error with no more specific code.
    DatabaseError = 13,
    /// An unexpected fault escaped a lower layer.
    UnexpectedError = 14,
    /// The database file could not be opened.
    CantOpenFile = 15,
    /// A file I/O operation failed.
    IoError = 16,
    /// Committing a transaction failed.
    CommitFailed = 17,
    /// A memory allocation failed.
    MemoryError = 18,
    /// The database is not writeable.
    NotWriteable = 19,
    /// Stored file data is corrupted.
    CorruptData = 20,
    /// The database is busy or locked.
    Busy = 21,
    /// The operation must be made inside a transaction.
    NotInTransaction = 22,
    /// A transaction is still open when it must not be.
    TransactionNotClosed = 23,
    /// The operation is not supported for this database's schema.
    UnsupportedOperation = 24,
    /// The file is not a database, or the encryption key is wrong.
    NotADatabaseFile = 25,
    /// The file or data is not in the requested format.
    WrongFormat = 26,
}

/// Messages for the Tandem domain, indexed by code.
static MESSAGES: [&str; 27] = [
    "no error", // 0
    "assertion failed",
    "unimplemented function called",
    "unsupported encryption algorithm",
    "bad revision ID",
    "bad version vector",
    "corrupt revision data",
    "corrupt index",
    "database not open",
    "not found",
    "deleted",
    "conflict",
    "invalid parameter",
    "database error",
    "unexpected exception",
    "can't open file",
    "file I/O error",
    "commit failed",
    "memory allocation failed",
    "not writeable",
    "file data is corrupted",
    "database busy/locked",
    "must be called during a transaction",
    "transaction not closed",
    "unsupported operation for this database type",
    "file is not a database (or encryption key is invalid/missing)",
    "file/data is not in the requested format",
];

fn tandem_message(code: i32) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|i| MESSAGES.get(i).copied())
        .unwrap_or("(unknown error)")
}

fn render_message(domain: Domain, code: i32) -> String {
    match domain {
        Domain::Tandem => tandem_message(code).to_owned(),
        Domain::Os => io::Error::from_raw_os_error(code).to_string(),
        Domain::KeyValue => kv::message(code).to_owned(),
        Domain::Sql => tandem_storage::sql::message(code).to_owned(),
    }
}

/// A canonical tandemdb error: a domain plus a code within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("{}", render_message(*domain, *code))]
pub struct Error {
    /// The code space `code` belongs to.
    pub domain: Domain,
    /// The status code. Nonzero for any raised failure.
    pub code: i32,
}

/// Row of a native→canonical mapping table. Tables are scanned linearly
/// and the first matching row wins, so a later duplicate for the same
/// native code is unreachable; that is an authoring error, not a
/// runtime condition.
struct CodeMapping {
    native: i32,
    domain: Domain,
    code: i32,
}

const fn row(native: i32, domain: Domain, code: i32) -> CodeMapping {
    CodeMapping {
        native,
        domain,
        code,
    }
}

/// Maps key-value engine statuses to canonical codes.
static KV_MAPPING: &[CodeMapping] = &[
    row(kv::INVALID_ARGS, Domain::Tandem, ErrorCode::InvalidParameter as i32),
    row(kv::OPEN_FAIL, Domain::Tandem, ErrorCode::CantOpenFile as i32),
    row(kv::NO_SUCH_FILE, Domain::Tandem, ErrorCode::CantOpenFile as i32),
    row(kv::WRITE_FAIL, Domain::Tandem, ErrorCode::IoError as i32),
    row(kv::READ_FAIL, Domain::Tandem, ErrorCode::IoError as i32),
    row(kv::CLOSE_FAIL, Domain::Tandem, ErrorCode::IoError as i32),
    row(kv::COMMIT_FAIL, Domain::Tandem, ErrorCode::CommitFailed as i32),
    row(kv::ALLOC_FAIL, Domain::Tandem, ErrorCode::MemoryError as i32),
    row(kv::KEY_NOT_FOUND, Domain::Tandem, ErrorCode::NotFound as i32),
    row(kv::READ_ONLY_VIOLATION, Domain::Tandem, ErrorCode::NotWriteable as i32),
    row(kv::SEEK_FAIL, Domain::Tandem, ErrorCode::IoError as i32),
    row(kv::SYNC_FAIL, Domain::Tandem, ErrorCode::IoError as i32),
    row(kv::CHECKSUM_ERROR, Domain::Tandem, ErrorCode::CorruptData as i32),
    row(kv::FILE_CORRUPT, Domain::Tandem, ErrorCode::CorruptData as i32),
    row(kv::INVALID_HANDLE, Domain::Tandem, ErrorCode::NotOpen as i32),
    row(kv::NO_DB_HEADERS, Domain::Tandem, ErrorCode::NotADatabaseFile as i32),
    row(kv::TRANSACTION_FAIL, Domain::Tandem, ErrorCode::DatabaseError as i32),
    row(kv::E_PERM, Domain::Os, os::EPERM),
    row(kv::E_IO, Domain::Os, os::EIO),
    row(kv::E_NOMEM, Domain::Os, os::ENOMEM),
    row(kv::E_ACCESS, Domain::Os, os::EACCES),
    row(kv::E_EXIST, Domain::Os, os::EEXIST),
    row(kv::E_INVAL, Domain::Os, os::EINVAL),
    row(kv::E_NOSPC, Domain::Os, os::ENOSPC),
    row(kv::E_AGAIN, Domain::Os, os::EAGAIN),
];

/// Maps SQL engine statuses to canonical codes.
static SQL_MAPPING: &[CodeMapping] = &[
    row(tandem_storage::sql::PERM, Domain::Tandem, ErrorCode::NotWriteable as i32),
    row(tandem_storage::sql::BUSY, Domain::Tandem, ErrorCode::Busy as i32),
    row(tandem_storage::sql::LOCKED, Domain::Tandem, ErrorCode::Busy as i32),
    row(tandem_storage::sql::NOMEM, Domain::Tandem, ErrorCode::MemoryError as i32),
    row(tandem_storage::sql::READONLY, Domain::Tandem, ErrorCode::NotWriteable as i32),
    row(tandem_storage::sql::IOERR, Domain::Tandem, ErrorCode::IoError as i32),
    row(tandem_storage::sql::CORRUPT, Domain::Tandem, ErrorCode::CorruptData as i32),
    row(tandem_storage::sql::FULL, Domain::Os, os::ENOSPC),
    row(tandem_storage::sql::CANTOPEN, Domain::Tandem, ErrorCode::CantOpenFile as i32),
    row(tandem_storage::sql::NOTADB, Domain::Tandem, ErrorCode::NotADatabaseFile as i32),
];

fn map_code(table: &[CodeMapping], code: i32) -> Option<(Domain, i32)> {
    table
        .iter()
        .find(|r| r.native == code)
        .map(|r| (r.domain, r.code))
}

/// Process-wide flag: when set, raised errors that are not unremarkable
/// emit a warning line through the logging sink.
static WARN_ON_ERROR: AtomicBool = AtomicBool::new(true);

/// Enables or disables warning-level logging of raised errors.
pub fn set_warn_on_error(value: bool) {
    WARN_ON_ERROR.store(value, Ordering::Relaxed);
}

/// Whether raised errors are currently logged.
#[must_use]
pub fn warn_on_error() -> bool {
    WARN_ON_ERROR.load(Ordering::Relaxed)
}

impl Error {
    /// Constructs an error from a domain and code.
    #[must_use]
    pub const fn new(domain: Domain, code: i32) -> Self {
        Self { domain, code }
    }

    /// Constructs a Tandem-domain error.
    #[must_use]
    pub const fn tandem(code: ErrorCode) -> Self {
        Self::new(Domain::Tandem, code as i32)
    }

    /// Constructs an error at a failure site, logging it unless it is
    /// unremarkable or [`set_warn_on_error`] is off. Raising code 0 is
    /// a contract violation caught here in debug builds.
    #[must_use]
    pub fn report(domain: Domain, code: i32) -> Self {
        debug_assert!(code != 0, "error code 0 must never be raised");
        let err = Self::new(domain, code);
        if warn_on_error() && !err.is_unremarkable() {
            log::write(
                LogLevel::Warning,
                &format!("throwing {} error {}: {}", domain.name(), code, err.message()),
            );
        }
        err
    }

    /// Constructs a Tandem-domain error at a failure site. See
    /// [`Error::report`].
    #[must_use]
    pub fn report_code(code: ErrorCode) -> Self {
        Self::report(Domain::Tandem, code as i32)
    }

    /// Constructs an OS-domain error from the current OS error number.
    /// When no OS error is pending (errno 0 or unavailable), reports a
    /// plain `IoError` instead; code 0 is never raised.
    #[must_use]
    pub fn last_os_error() -> Self {
        match io::Error::last_os_error().raw_os_error() {
            Some(errno) if errno != 0 => Self::report(Domain::Os, errno),
            _ => Self::report_code(ErrorCode::IoError),
        }
    }

    /// Renders this error's human-readable message.
    #[must_use]
    pub fn message(&self) -> String {
        render_message(self.domain, self.code)
    }

    /// Maps native-domain codes to their canonical equivalents.
    ///
    /// KeyValue and Sql codes are looked up in ordered tables
    /// (first match wins); codes without a table row, and errors in the
    /// Tandem and Os domains, are returned unchanged. Idempotent.
    #[must_use]
    pub fn standardized(&self) -> Self {
        let table = match self.domain {
            Domain::KeyValue => KV_MAPPING,
            Domain::Sql => SQL_MAPPING,
            Domain::Tandem | Domain::Os => return *self,
        };
        match map_code(table, self.code) {
            Some((domain, code)) => Self::new(domain, code),
            None => *self,
        }
    }

    /// Whether this error is an expected, non-exceptional outcome that
    /// should not generate log noise. Suppresses logging only; the
    /// error still propagates.
    #[must_use]
    pub fn is_unremarkable(&self) -> bool {
        if self.code == 0 {
            return true;
        }
        match self.domain {
            Domain::Tandem => {
                self.code == ErrorCode::NotFound as i32 || self.code == ErrorCode::Deleted as i32
            }
            Domain::KeyValue => {
                self.code == kv::KEY_NOT_FOUND || self.code == kv::NO_DB_HEADERS
            }
            Domain::Os | Domain::Sql => false,
        }
    }

    /// Recovers a canonical error from a fault reported by a lower
    /// layer through a generic error object.
    ///
    /// An [`Error`] passes through unchanged; a [`NativeError`] is
    /// wrapped in its native domain; anything else becomes
    /// `{Tandem, UnexpectedError}` after one diagnostic log line
    /// carrying the fault's rendered message.
    #[must_use]
    pub fn from_exception(fault: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(err) = fault.downcast_ref::<Error>() {
            return *err;
        }
        if let Some(native) = fault.downcast_ref::<NativeError>() {
            return Self::new(native.domain.into(), native.code);
        }
        log::write(
            LogLevel::Error,
            &format!("caught unexpected error: {fault}"),
        );
        Self::tandem(ErrorCode::UnexpectedError)
    }

    /// Reports an assertion failure: always logs the expression with
    /// its source location (falling back to the process error stream
    /// when the sink cannot take it) and returns the AssertionFailed
    /// error for propagation.
    #[must_use]
    pub fn assertion_failed(expr: &str, func: &str, file: &str, line: u32) -> Self {
        log::write_always(
            LogLevel::Error,
            &format!("Assertion failed: {expr} ({file}:{line}, in {func})"),
        );
        Self::tandem(ErrorCode::AssertionFailed)
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::tandem(code)
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        Self::report(err.domain.into(), err.code).standardized()
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::report(Domain::Os, errno),
            None => Self::report_code(ErrorCode::IoError),
        }
    }
}

/// Returns an `{Tandem, AssertionFailed}` error unless `cond` holds.
/// The failure is always logged with its source location.
macro_rules! db_assert {
    ($cond:expr) => {
        if !$cond {
            return Err($crate::error::Error::assertion_failed(
                stringify!($cond),
                module_path!(),
                file!(),
                line!(),
            ));
        }
    };
}
pub(crate) use db_assert;
