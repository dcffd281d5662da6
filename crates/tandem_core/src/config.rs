//! Database configuration.

use tandem_storage::EncryptionKey;

/// On-disk document schema a database is opened with.
///
/// The schema is fixed at open time and recorded in the storage file's
/// header stamp; reopening a file under a different schema fails rather
/// than migrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SchemaVersion {
    /// Revision-tree document storage.
    V1 = 1,
    /// Version-vector document storage.
    V2 = 2,
}

impl SchemaVersion {
    /// The header stamp written into storage files using this schema.
    #[must_use]
    pub const fn stamp(self) -> u8 {
        self as u8
    }
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to open the database read-only.
    pub read_only: bool,

    /// Document schema to use. Must match the file when opening an
    /// existing database.
    pub schema: SchemaVersion,

    /// Encryption key for the storage file, if any.
    pub encryption: Option<EncryptionKey>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            schema: SchemaVersion::V1,
            encryption: None,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to open read-only.
    #[must_use]
    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets the document schema.
    #[must_use]
    pub fn schema(mut self, schema: SchemaVersion) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the encryption key.
    #[must_use]
    pub fn encryption(mut self, key: Option<EncryptionKey>) -> Self {
        self.encryption = key;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DatabaseConfig::default();
        assert!(config.create_if_missing);
        assert!(!config.read_only);
        assert_eq!(config.schema, SchemaVersion::V1);
        assert!(config.encryption.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = DatabaseConfig::new()
            .create_if_missing(false)
            .read_only(true)
            .schema(SchemaVersion::V2);

        assert!(!config.create_if_missing);
        assert!(config.read_only);
        assert_eq!(config.schema, SchemaVersion::V2);
    }

    #[test]
    fn schema_stamps() {
        assert_eq!(SchemaVersion::V1.stamp(), 1);
        assert_eq!(SchemaVersion::V2.stamp(), 2);
    }
}
