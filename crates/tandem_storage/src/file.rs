//! File-backed storage provider.
//!
//! Single-file layout:
//!
//! ```text
//! [magic "TNDM"][format u8][schema stamp u8][flags u8][reserved u8]
//! [payload: CBOR store image, AES-256-GCM encrypted when flag bit 0 set]
//! ```
//!
//! The image is rewritten atomically (temp file + rename) on commit, on
//! rekey, and on close. Writes made outside a native transaction are
//! held in memory until one of those points.

use crate::error::{kv, NativeError, NativeResult};
use crate::provider::{
    EncryptionKey, KeyStore, ProviderConfig, StorageProvider, DEFAULT_KEY_STORE,
};
use crate::stores::{BTreeStore, StoreSet};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"TNDM";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 8;
const FLAG_ENCRYPTED: u8 = 0x01;
const NONCE_LEN: usize = 12;

/// A persistent storage provider backed by a single file.
pub struct FileProvider {
    path: PathBuf,
    schema_stamp: u8,
    is_new: bool,
    read_only: bool,
    key: Option<EncryptionKey>,
    set: StoreSet,
}

impl FileProvider {
    /// Opens or creates a file-backed provider at `path`.
    ///
    /// # Errors
    ///
    /// Returns native errors for a missing file without
    /// `create_if_missing`, a file that is not a store or whose
    /// encryption key does not match (`NO_DB_HEADERS`), or a corrupt
    /// store image (`FILE_CORRUPT`).
    pub fn open(path: &Path, config: &ProviderConfig) -> NativeResult<Self> {
        if path.exists() {
            let bytes = fs::read(path).map_err(|e| read_error(&e))?;
            let (schema_stamp, stores) = decode_image(&bytes, config.encryption_key.as_ref())?;
            Ok(Self {
                path: path.to_path_buf(),
                schema_stamp,
                is_new: false,
                read_only: config.read_only,
                key: config.encryption_key.clone(),
                set: StoreSet::from_stores(stores, config.read_only),
            })
        } else {
            if !config.create_if_missing || config.read_only {
                return Err(NativeError::kv(kv::NO_SUCH_FILE));
            }
            let provider = Self {
                path: path.to_path_buf(),
                schema_stamp: config.schema_stamp,
                is_new: true,
                read_only: false,
                key: config.encryption_key.clone(),
                set: StoreSet::new(false),
            };
            // Persist an empty image immediately so reopening without
            // create_if_missing succeeds even if nothing is committed.
            provider.save()?;
            Ok(provider)
        }
    }

    fn save(&self) -> NativeResult<()> {
        let image = encode_image(self.schema_stamp, self.set.stores(), self.key.as_ref())?;
        let tmp = self.path.with_extension("tndm-tmp");
        write_atomically(&self.path, &tmp, &image)
    }
}

impl StorageProvider for FileProvider {
    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn schema_stamp(&self) -> u8 {
        self.schema_stamp
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn default_key_store(&mut self) -> NativeResult<&mut dyn KeyStore> {
        self.key_store(DEFAULT_KEY_STORE)
    }

    fn key_store(&mut self, name: &str) -> NativeResult<&mut dyn KeyStore> {
        Ok(self.set.obtain(name))
    }

    fn begin_transaction(&mut self) -> NativeResult<()> {
        self.set.begin()
    }

    fn commit(&mut self) -> NativeResult<()> {
        if !self.set.in_transaction() {
            return Err(NativeError::kv(kv::TRANSACTION_FAIL));
        }
        if self.save().is_err() {
            // Durability failed; roll back to the pre-transaction image
            // so memory matches what is on disk.
            self.set.restore_shadow();
            return Err(NativeError::kv(kv::COMMIT_FAIL));
        }
        self.set.commit()
    }

    fn abort(&mut self) -> NativeResult<()> {
        self.set.abort()
    }

    fn rekey(&mut self, new_key: Option<EncryptionKey>) -> NativeResult<()> {
        if self.read_only {
            return Err(NativeError::kv(kv::READ_ONLY_VIOLATION));
        }
        if self.set.in_transaction() {
            return Err(NativeError::kv(kv::TRANSACTION_FAIL));
        }
        let old_key = std::mem::replace(&mut self.key, new_key);
        match self.save() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.key = old_key;
                Err(err)
            }
        }
    }

    fn close(&mut self) -> NativeResult<()> {
        if self.set.in_transaction() {
            return Err(NativeError::kv(kv::TRANSACTION_FAIL));
        }
        if self.read_only {
            return Ok(());
        }
        self.save()
    }
}

impl std::fmt::Debug for FileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProvider")
            .field("path", &self.path)
            .field("schema_stamp", &self.schema_stamp)
            .field("encrypted", &self.key.is_some())
            .finish_non_exhaustive()
    }
}

fn encode_image(
    schema_stamp: u8,
    stores: &BTreeMap<String, BTreeStore>,
    key: Option<&EncryptionKey>,
) -> NativeResult<Vec<u8>> {
    let mut plain = Vec::new();
    ciborium::into_writer(stores, &mut plain)
        .map_err(|_| NativeError::kv(kv::WRITE_FAIL))?;

    let mut flags = 0u8;
    let payload = match key {
        Some(key) => {
            flags |= FLAG_ENCRYPTED;
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
            let nonce_bytes: [u8; NONCE_LEN] = rand::random();
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce_bytes), plain.as_ref())
                .map_err(|_| NativeError::kv(kv::WRITE_FAIL))?;
            let mut payload = nonce_bytes.to_vec();
            payload.extend_from_slice(&ciphertext);
            payload
        }
        None => plain,
    };

    let mut image = Vec::with_capacity(HEADER_LEN + payload.len());
    image.extend_from_slice(MAGIC);
    image.push(FORMAT_VERSION);
    image.push(schema_stamp);
    image.push(flags);
    image.push(0); // reserved
    image.extend_from_slice(&payload);
    Ok(image)
}

fn decode_image(
    bytes: &[u8],
    key: Option<&EncryptionKey>,
) -> NativeResult<(u8, BTreeMap<String, BTreeStore>)> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC || bytes[4] != FORMAT_VERSION {
        return Err(NativeError::kv(kv::NO_DB_HEADERS));
    }
    let schema_stamp = bytes[5];
    let encrypted = bytes[6] & FLAG_ENCRYPTED != 0;
    let payload = &bytes[HEADER_LEN..];

    let plain = match (encrypted, key) {
        (true, Some(key)) => {
            if payload.len() < NONCE_LEN {
                return Err(NativeError::kv(kv::NO_DB_HEADERS));
            }
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
            cipher
                .decrypt(Nonce::from_slice(&payload[..NONCE_LEN]), &payload[NONCE_LEN..])
                .map_err(|_| NativeError::kv(kv::NO_DB_HEADERS))?
        }
        (false, None) => payload.to_vec(),
        // Key supplied for a plaintext store, or missing for an
        // encrypted one: indistinguishable from "not a database".
        _ => return Err(NativeError::kv(kv::NO_DB_HEADERS)),
    };

    let stores = ciborium::from_reader(plain.as_slice())
        .map_err(|_| NativeError::kv(kv::FILE_CORRUPT))?;
    Ok((schema_stamp, stores))
}

fn write_atomically(path: &Path, tmp: &Path, image: &[u8]) -> NativeResult<()> {
    let result: io::Result<()> = (|| {
        let mut file = fs::File::create(tmp)?;
        file.write_all(image)?;
        file.sync_all()?;
        fs::rename(tmp, path)
    })();
    result.map_err(|e| write_error(&e))
}

fn read_error(err: &io::Error) -> NativeError {
    match err.kind() {
        io::ErrorKind::NotFound => NativeError::kv(kv::NO_SUCH_FILE),
        io::ErrorKind::PermissionDenied => NativeError::kv(kv::E_ACCESS),
        _ => NativeError::kv(kv::READ_FAIL),
    }
}

fn write_error(err: &io::Error) -> NativeError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => NativeError::kv(kv::E_ACCESS),
        _ => NativeError::kv(kv::WRITE_FAIL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes([byte; 32])
    }

    #[test]
    fn create_then_reopen_preserves_data_and_stamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.tndm");

        {
            let config = ProviderConfig {
                schema_stamp: 2,
                ..ProviderConfig::default()
            };
            let mut p = FileProvider::open(&path, &config).unwrap();
            assert!(p.is_new());
            p.begin_transaction().unwrap();
            p.default_key_store().unwrap().set(b"doc", b"m", b"b").unwrap();
            p.commit().unwrap();
        }

        let config = ProviderConfig {
            create_if_missing: false,
            ..ProviderConfig::default()
        };
        let mut p = FileProvider::open(&path, &config).unwrap();
        assert!(!p.is_new());
        assert_eq!(p.schema_stamp(), 2);
        let record = p.default_key_store().unwrap().get(b"doc").unwrap().unwrap();
        assert_eq!(record.body, b"b");
    }

    #[test]
    fn missing_file_without_create_fails() {
        let dir = tempdir().unwrap();
        let config = ProviderConfig {
            create_if_missing: false,
            ..ProviderConfig::default()
        };
        let err = FileProvider::open(&dir.path().join("absent"), &config).unwrap_err();
        assert_eq!(err, NativeError::kv(kv::NO_SUCH_FILE));
    }

    #[test]
    fn garbage_file_is_not_a_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk");
        fs::write(&path, b"this is not a store").unwrap();

        let err = FileProvider::open(&path, &ProviderConfig::default()).unwrap_err();
        assert_eq!(err, NativeError::kv(kv::NO_DB_HEADERS));
    }

    #[test]
    fn wrong_encryption_key_is_not_a_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("enc.tndm");

        let config = ProviderConfig {
            encryption_key: Some(key(1)),
            ..ProviderConfig::default()
        };
        drop(FileProvider::open(&path, &config).unwrap());

        let wrong = ProviderConfig {
            encryption_key: Some(key(2)),
            ..ProviderConfig::default()
        };
        let err = FileProvider::open(&path, &wrong).unwrap_err();
        assert_eq!(err, NativeError::kv(kv::NO_DB_HEADERS));

        let missing = ProviderConfig::default();
        let err = FileProvider::open(&path, &missing).unwrap_err();
        assert_eq!(err, NativeError::kv(kv::NO_DB_HEADERS));
    }

    #[test]
    fn abort_discards_uncommitted_writes_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.tndm");

        {
            let mut p = FileProvider::open(&path, &ProviderConfig::default()).unwrap();
            p.begin_transaction().unwrap();
            p.default_key_store().unwrap().set(b"k", b"", b"v").unwrap();
            p.abort().unwrap();
            p.close().unwrap();
        }

        let mut p = FileProvider::open(&path, &ProviderConfig::default()).unwrap();
        assert!(p.default_key_store().unwrap().get(b"k").unwrap().is_none());
    }

    #[test]
    fn rekey_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.tndm");

        {
            let mut p = FileProvider::open(&path, &ProviderConfig::default()).unwrap();
            p.begin_transaction().unwrap();
            p.default_key_store().unwrap().set(b"k", b"", b"v").unwrap();
            p.commit().unwrap();
            p.rekey(Some(key(7))).unwrap();
        }

        // Old (no) key no longer opens the store.
        let err = FileProvider::open(&path, &ProviderConfig::default()).unwrap_err();
        assert_eq!(err, NativeError::kv(kv::NO_DB_HEADERS));

        // New key does, with data intact.
        let config = ProviderConfig {
            encryption_key: Some(key(7)),
            ..ProviderConfig::default()
        };
        let mut p = FileProvider::open(&path, &config).unwrap();
        let record = p.default_key_store().unwrap().get(b"k").unwrap().unwrap();
        assert_eq!(record.body, b"v");
    }

    #[test]
    fn rekey_inside_transaction_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.tndm");
        let mut p = FileProvider::open(&path, &ProviderConfig::default()).unwrap();
        p.begin_transaction().unwrap();
        let err = p.rekey(Some(key(1))).unwrap_err();
        assert_eq!(err, NativeError::kv(kv::TRANSACTION_FAIL));
    }
}
