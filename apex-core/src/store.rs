//! Snapshot storage
//!
//! The store is the only durable state in the system. Every action loads the
//! full [`Snapshot`], mutates it in memory and saves it back in one call.
//!
//! # Atomicity
//!
//! - A save fully replaces the persisted snapshot or fails leaving the prior
//!   one intact (temp file + rename for JSON, one `WriteBatch` for RocksDB)
//! - Saves are compare-and-swap on [`Snapshot::version`]: a snapshot loaded at
//!   version `n` can only be saved while the store is still at `n`, and the
//!   save moves it to `n + 1`

use crate::config::{StoreBackend, StoreConfig};
use crate::types::Snapshot;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Durable snapshot storage
pub trait AccountStore: Send + Sync {
    /// Load the full snapshot
    fn load(&self) -> Result<Snapshot>;

    /// Replace the persisted snapshot; returns the new version
    ///
    /// Fails with `Conflict` if the store moved past `snapshot.version`.
    fn save(&self, snapshot: &Snapshot) -> Result<u64>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

fn check_version(expected: u64, found: u64) -> Result<()> {
    if expected != found {
        return Err(Error::Conflict { expected, found });
    }
    Ok(())
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Snapshot>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }
}

impl AccountStore for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<u64> {
        let mut current = self.snapshot.write();
        check_version(snapshot.version, current.version)?;

        let mut next = snapshot.clone();
        next.version = current.version + 1;
        *current = next;
        Ok(current.version)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// JSON file store
///
/// The file is rewritten through a temp file in the same directory and
/// renamed over the original, so readers only ever see a complete snapshot.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    read_only: bool,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open store at `path`, creating the parent directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        tracing::info!(path = %path.display(), exists = path.exists(), "Opened JSON snapshot store");

        Ok(Self {
            path,
            read_only: false,
            write_lock: Mutex::new(()),
        })
    }

    /// Open store at `path` without creating anything; saves are refused
    pub fn open_read_only(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        tracing::info!(path = %path.display(), exists = path.exists(), "Opened JSON snapshot store read-only");

        Self {
            path,
            read_only: true,
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Snapshot> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(Snapshot::default());
        }

        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("Malformed snapshot {}: {}", self.path.display(), e))
        })?;
        snapshot.check_integrity()?;
        Ok(snapshot)
    }
}

/// Replace `path` with `bytes` through a temp file in the same directory
///
/// On failure the temp file is removed and `path` is left as it was.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let storage = |e: std::io::Error| Error::Storage(format!("Failed to write {}: {}", path.display(), e));

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage)?;
    tmp.write_all(bytes).map_err(storage)?;
    tmp.as_file().sync_all().map_err(storage)?;
    tmp.persist(path)
        .map_err(|e| Error::Storage(format!("Failed to persist {}: {}", path.display(), e.error)))?;
    Ok(())
}

impl AccountStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot> {
        let snapshot = self.read()?;
        tracing::debug!(
            version = snapshot.version,
            accounts = snapshot.accounts.len(),
            resources = snapshot.resources.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<u64> {
        if self.read_only {
            return Err(Error::Storage(format!("{} is opened read-only", self.path.display())));
        }
        let _guard = self.write_lock.lock();

        let found = self.read()?.version;
        check_version(snapshot.version, found)?;

        let mut next = snapshot.clone();
        next.version = found + 1;
        replace_file(&self.path, &serde_json::to_vec_pretty(&next)?)?;

        tracing::debug!(version = next.version, path = %self.path.display(), "Snapshot saved");
        Ok(next.version)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Build the store selected by configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn AccountStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Json => Ok(Arc::new(JsonFileStore::open(config.json_path())?)),
        #[cfg(feature = "rocksdb-store")]
        StoreBackend::Rocksdb => Ok(Arc::new(crate::rocks::RocksStore::open(&config.data_dir)?)),
        #[cfg(not(feature = "rocksdb-store"))]
        StoreBackend::Rocksdb => Err(Error::Config(
            "RocksDB backend requires the rocksdb-store feature".to_string(),
        )),
    }
}

/// Build the configured store for inspection; nothing is created on disk
pub fn open_store_read_only(config: &StoreConfig) -> Result<Arc<dyn AccountStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Json => Ok(Arc::new(JsonFileStore::open_read_only(config.json_path()))),
        #[cfg(feature = "rocksdb-store")]
        StoreBackend::Rocksdb => Ok(Arc::new(crate::rocks::RocksStore::open_read_only(
            &config.data_dir,
        )?)),
        #[cfg(not(feature = "rocksdb-store"))]
        StoreBackend::Rocksdb => Err(Error::Config(
            "RocksDB backend requires the rocksdb-store feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Capacity;
    use crate::types::{Account, OwnerId, ResourceRecord};
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        let owner = OwnerId::new("alice");
        let mut account = Account::new(42);
        account.tokens = 3;
        account.last_mine_claim = 1_700_000_000;
        snapshot.accounts.insert(owner.clone(), account);
        let record = ResourceRecord {
            owner,
            capacity: Capacity::new(2048).unwrap(),
            launch_descriptor: "java -Xms2048M -Xmx2048M -jar server.jar nogui".to_string(),
        };
        snapshot.resources.insert(record.key(), record);
        snapshot
    }

    fn json_store() -> (JsonFileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("users").join("users.json")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_missing_file_is_empty_snapshot() {
        let (store, _temp) = json_store();
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let (store, _temp) = json_store();
        let snapshot = sample_snapshot();

        assert_eq!(store.save(&snapshot).unwrap(), 1);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.accounts, snapshot.accounts);
        assert_eq!(loaded.resources, snapshot.resources);
    }

    #[test]
    fn test_file_names_resource_pairs() {
        let (store, _temp) = json_store();
        store.save(&sample_snapshot()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw["resources"].get("2048_alice").is_some());
        assert_eq!(raw["accounts"]["alice"]["tokens"], 3);
    }

    #[test]
    fn test_stale_save_conflicts() {
        let (store, _temp) = json_store();
        let stale = store.load().unwrap();

        let mut first = stale.clone();
        first.accounts.insert(OwnerId::new("bob"), Account::new(5));
        store.save(&first).unwrap();

        let mut second = stale;
        second.accounts.insert(OwnerId::new("carol"), Account::new(5));
        assert!(matches!(
            store.save(&second),
            Err(Error::Conflict { expected: 0, found: 1 })
        ));

        let loaded = store.load().unwrap();
        assert!(loaded.accounts.contains_key(&OwnerId::new("bob")));
        assert!(!loaded.accounts.contains_key(&OwnerId::new("carol")));
    }

    #[test]
    fn test_malformed_file_is_storage_error() {
        let (store, _temp) = json_store();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(Error::Storage(_))));

        std::fs::write(store.path(), r#"{"resources": {"3000_alice": {}}}"#).unwrap();
        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_failed_save_keeps_prior_snapshot() {
        let (store, _temp) = json_store();
        store.save(&sample_snapshot()).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        // Stale version: rejected before anything is written
        assert!(store.save(&Snapshot::default()).is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_failed_replace_keeps_prior_contents() {
        let (store, temp) = json_store();
        store.save(&sample_snapshot()).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        // Rename onto a non-empty directory fails after the temp file is written
        let blocked = temp.path().join("users").join("blocked");
        std::fs::create_dir_all(blocked.join("inner")).unwrap();
        let result = replace_file(&blocked, b"{}");
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(blocked.join("inner").is_dir());

        // Only the snapshot and the blocking directory remain
        let entries = std::fs::read_dir(temp.path().join("users")).unwrap().count();
        assert_eq!(entries, 2);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
        assert_eq!(store.load().unwrap().version, 1);
    }

    #[test]
    fn test_io_failures_are_storage_errors() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain");
        std::fs::write(&file, "x").unwrap();

        // Parent directory cannot be created under a regular file
        let result = JsonFileStore::open(file.join("users").join("users.json"));
        assert!(matches!(result, Err(Error::Storage(_))));

        let result = replace_file(&file.join("users.json"), b"{}");
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn test_misfiled_resource_is_storage_error() {
        let (store, _temp) = json_store();
        let json = r#"{
            "version": 1,
            "accounts": {
                "alice": {"coins": 5, "tokens": 0, "rank": "Noob", "last_daily_claim": 0, "last_mine_claim": 0},
                "bob": {"coins": 100, "tokens": 0, "rank": "Miner", "last_daily_claim": 0, "last_mine_claim": 0}
            },
            "resources": {
                "512_alice": {"owner": "bob", "capacity": 1024, "launch_descriptor": "java"}
            }
        }"#;
        std::fs::write(store.path(), json).unwrap();
        assert!(matches!(store.load(), Err(Error::Storage(_))));

        let orphan = r#"{
            "accounts": {},
            "resources": {
                "512_alice": {"owner": "alice", "capacity": 512, "launch_descriptor": "java"}
            }
        }"#;
        std::fs::write(store.path(), orphan).unwrap();
        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_read_only_store_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("users.json");

        let store = JsonFileStore::open_read_only(&path);
        assert_eq!(store.load().unwrap(), Snapshot::default());
        assert!(matches!(store.save(&Snapshot::default()), Err(Error::Storage(_))));
        assert!(!temp_dir.path().join("missing").exists());

        let config = StoreConfig {
            backend: StoreBackend::Json,
            data_dir: temp_dir.path().join("also-missing"),
            file_name: "users.json".to_string(),
        };
        let store = open_store_read_only(&config).unwrap();
        assert_eq!(store.load().unwrap().version, 0);
        assert!(!temp_dir.path().join("also-missing").exists());
    }

    #[test]
    fn test_memory_store_cas() {
        let store = MemoryStore::new();
        let snapshot = store.load().unwrap();
        assert_eq!(store.save(&snapshot).unwrap(), 1);
        assert!(matches!(store.save(&snapshot), Err(Error::Conflict { .. })));
        assert_eq!(store.load().unwrap().version, 1);
    }

    #[test]
    fn test_open_store_by_backend() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::Json,
            data_dir: temp_dir.path().to_path_buf(),
            file_name: "users.json".to_string(),
        };
        let store = open_store(&config).unwrap();
        assert!(store.describe().starts_with("json:"));

        let memory = open_store(&StoreConfig {
            backend: StoreBackend::Memory,
            ..config
        })
        .unwrap();
        assert_eq!(memory.describe(), "memory");
    }
}
