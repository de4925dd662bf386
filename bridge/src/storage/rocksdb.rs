//! RocksDB-backed latency store.
//!
//! Records live in a dedicated `"latency"` column family, keyed by the
//! transaction id bytes, with JSON-encoded [`LatencyRecord`] values.

use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};

use super::{LatencyRecord, LatencyStore, StorageError};

const CF_LATENCY: &str = "latency";

/// Configuration for [`RocksDbLatencyStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/latency-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`LatencyStore`].
pub struct RocksDbLatencyStore {
    db: DB,
}

impl RocksDbLatencyStore {
    /// Opens (or creates) the store at the configured path.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_LATENCY, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db })
    }

    fn cf_latency(&self) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(CF_LATENCY)
            .ok_or(StorageError::MissingColumnFamily(CF_LATENCY))
    }
}

impl LatencyStore for RocksDbLatencyStore {
    fn get(&self, id: &str) -> Result<Option<LatencyRecord>, StorageError> {
        let cf = self.cf_latency()?;
        match self.db.get_cf(cf, id.as_bytes())? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StorageError::Corrupt {
                    id: id.to_string(),
                    source,
                }),
        }
    }

    fn put(&self, id: &str, record: &LatencyRecord) -> Result<(), StorageError> {
        let cf = self.cf_latency()?;
        let bytes = serde_json::to_vec(record).map_err(StorageError::Encode)?;
        self.db.put_cf(cf, id.as_bytes(), bytes)?;
        Ok(())
    }
}
