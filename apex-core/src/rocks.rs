//! RocksDB snapshot store
//!
//! # Column Families
//!
//! - `accounts` - Account records (key: owner id)
//! - `resources` - Resource records (key: `<capacity>_<owner>`)
//! - `meta` - Snapshot version (key: `version`)
//!
//! A save diffs the stored keys against the snapshot and commits puts and
//! deletes in a single `WriteBatch`.

use crate::store::AccountStore;
use crate::types::{Account, OwnerId, ResourceKey, ResourceRecord, Snapshot};
use crate::{Error, Result};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_RESOURCES: &str = "resources";
const CF_META: &str = "meta";

const VERSION_KEY: &[u8] = b"version";

/// RocksDB-backed store
pub struct RocksStore {
    db: DB,
    path: PathBuf,
    read_only: bool,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore").field("path", &self.path).finish()
    }
}

impl RocksStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::Storage(format!("Failed to create {}: {}", path.display(), e)))?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options()),
            ColumnFamilyDescriptor::new(CF_RESOURCES, Self::cf_options()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &path, cf_descriptors)?;
        tracing::info!(path = %path.display(), "Opened RocksDB snapshot store");

        Ok(Self {
            db,
            path,
            read_only: false,
            write_lock: Mutex::new(()),
        })
    }

    /// Open an existing database for reading; saves are refused
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = DB::open_cf_for_read_only(
            &Options::default(),
            &path,
            [CF_ACCOUNTS, CF_RESOURCES, CF_META],
            false,
        )?;
        tracing::info!(path = %path.display(), "Opened RocksDB snapshot store read-only");

        Ok(Self {
            db,
            path,
            read_only: true,
            write_lock: Mutex::new(()),
        })
    }

    fn cf_options() -> Options {
        let mut opts = Options::default();
        // Snapshots are read in full on every action
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn read_version(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, VERSION_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt snapshot version".to_string()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn stored_keys(&self, cf: &ColumnFamily) -> Result<BTreeSet<Vec<u8>>> {
        let mut keys = BTreeSet::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            keys.insert(key.to_vec());
        }
        Ok(keys)
    }
}

impl AccountStore for RocksStore {
    fn load(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot {
            version: self.read_version()?,
            ..Snapshot::default()
        };

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        for item in self.db.iterator_cf(cf_accounts, IteratorMode::Start) {
            let (key, value) = item?;
            let owner = std::str::from_utf8(&key)
                .map_err(|_| Error::Storage("Non UTF-8 owner id".to_string()))?;
            let account: Account = bincode::deserialize(&value)?;
            snapshot.accounts.insert(OwnerId::new(owner), account);
        }

        let cf_resources = self.cf_handle(CF_RESOURCES)?;
        for item in self.db.iterator_cf(cf_resources, IteratorMode::Start) {
            let (key, value) = item?;
            let key: ResourceKey = std::str::from_utf8(&key)
                .map_err(|_| Error::Storage("Non UTF-8 resource key".to_string()))?
                .parse()?;
            let record: ResourceRecord = bincode::deserialize(&value)?;
            snapshot.resources.insert(key, record);
        }

        snapshot.check_integrity()?;
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<u64> {
        if self.read_only {
            return Err(Error::Storage(format!("{} is opened read-only", self.path.display())));
        }
        let _guard = self.write_lock.lock();

        let found = self.read_version()?;
        if snapshot.version != found {
            return Err(Error::Conflict {
                expected: snapshot.version,
                found,
            });
        }

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_resources = self.cf_handle(CF_RESOURCES)?;
        let cf_meta = self.cf_handle(CF_META)?;

        let mut batch = WriteBatch::default();

        let mut stale_accounts = self.stored_keys(cf_accounts)?;
        for (owner, account) in &snapshot.accounts {
            let key = owner.as_str().as_bytes();
            stale_accounts.remove(key);
            batch.put_cf(cf_accounts, key, bincode::serialize(account)?);
        }
        for key in stale_accounts {
            batch.delete_cf(cf_accounts, key);
        }

        let mut stale_resources = self.stored_keys(cf_resources)?;
        for (key, record) in &snapshot.resources {
            let key = key.to_string();
            stale_resources.remove(key.as_bytes());
            batch.put_cf(cf_resources, key.as_bytes(), bincode::serialize(record)?);
        }
        for key in stale_resources {
            batch.delete_cf(cf_resources, key);
        }

        let version = found + 1;
        batch.put_cf(cf_meta, VERSION_KEY, version.to_be_bytes());

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(version, "Snapshot saved to RocksDB");
        Ok(version)
    }

    fn describe(&self) -> String {
        format!("rocksdb:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Capacity;
    use tempfile::TempDir;

    #[test]
    fn test_rocks_roundtrip_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(temp.path()).unwrap();

        let mut snapshot = store.load().unwrap();
        let owner = OwnerId::new("alice");
        snapshot.accounts.insert(owner.clone(), Account::new(30));
        let record = ResourceRecord {
            owner: owner.clone(),
            capacity: Capacity::new(512).unwrap(),
            launch_descriptor: "java -Xms512M -Xmx512M -jar server.jar nogui".to_string(),
        };
        snapshot.resources.insert(record.key(), record);
        assert_eq!(store.save(&snapshot).unwrap(), 1);

        let mut loaded = store.load().unwrap();
        assert_eq!(loaded.accounts, snapshot.accounts);
        assert_eq!(loaded.resources, snapshot.resources);

        loaded.resources.clear();
        assert_eq!(store.save(&loaded).unwrap(), 2);
        assert!(store.load().unwrap().resources.is_empty());

        // Stale writer
        assert!(matches!(store.save(&snapshot), Err(Error::Conflict { .. })));
    }

    #[test]
    fn test_misfiled_resource_is_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(temp.path()).unwrap();

        let owner = OwnerId::new("bob");
        let mut snapshot = Snapshot::default();
        snapshot.accounts.insert(owner.clone(), Account::new(100));
        store.save(&snapshot).unwrap();

        let record = ResourceRecord {
            owner,
            capacity: Capacity::new(1024).unwrap(),
            launch_descriptor: "java".to_string(),
        };
        let cf = store.cf_handle(CF_RESOURCES).unwrap();
        store
            .db
            .put_cf(cf, b"512_alice", bincode::serialize(&record).unwrap())
            .unwrap();

        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_read_only_refuses_saves() {
        let temp = TempDir::new().unwrap();
        {
            let store = RocksStore::open(temp.path()).unwrap();
            let mut snapshot = Snapshot::default();
            snapshot.accounts.insert(OwnerId::new("alice"), Account::new(5));
            store.save(&snapshot).unwrap();
        }

        let store = RocksStore::open_read_only(temp.path()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.version, 1);
        assert!(matches!(store.save(&loaded), Err(Error::Storage(_))));

        let missing = temp.path().join("missing");
        assert!(RocksStore::open_read_only(&missing).is_err());
        assert!(!missing.exists());
    }
}
