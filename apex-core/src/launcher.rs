//! Process launcher seam
//!
//! The core never starts a server. After a provisioning change is committed
//! the economy hands the [`ProvisionEvent`] to a [`ProcessLauncher`], which
//! owns whatever backing artifacts exist outside the snapshot.

use crate::provisioner::ProvisionEvent;
use crate::types::{ResourceKey, ResourceRecord};
use crate::{Error, Result};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Start script written for each server
pub const START_SCRIPT: &str = "start.sh";

/// External collaborator that materialises resource records
pub trait ProcessLauncher: Send + Sync + Debug {
    /// A record was created
    fn provision(&self, record: &ResourceRecord) -> Result<()>;

    /// A record moved from `previous` to `record.key()`
    fn resize(&self, previous: &ResourceKey, record: &ResourceRecord) -> Result<()>;

    /// A record was deleted; reclaim its artifacts
    fn reclaim(&self, key: &ResourceKey) -> Result<()>;

    /// Dispatch a committed event
    fn apply(&self, event: &ProvisionEvent) -> Result<()> {
        match event {
            ProvisionEvent::Created(record) => self.provision(record),
            ProvisionEvent::Resized { previous, record } => self.resize(previous, record),
            ProvisionEvent::Deleted(key) => self.reclaim(key),
        }
    }
}

/// Launcher that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLauncher;

impl ProcessLauncher for NoopLauncher {
    fn provision(&self, _record: &ResourceRecord) -> Result<()> {
        Ok(())
    }

    fn resize(&self, _previous: &ResourceKey, _record: &ResourceRecord) -> Result<()> {
        Ok(())
    }

    fn reclaim(&self, _key: &ResourceKey) -> Result<()> {
        Ok(())
    }
}

/// Lays servers out as `<root>/<capacity>_<owner>/` directories
///
/// Each directory holds an empty `plugins/` folder and a `start.sh` with the
/// launch descriptor. The script is written, never executed.
#[derive(Debug, Clone)]
pub struct DirectoryLauncher {
    root: PathBuf,
}

impl DirectoryLauncher {
    /// Create launcher rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one server
    pub fn server_dir(&self, key: &ResourceKey) -> Result<PathBuf> {
        let name = key.to_string();
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(Error::Launcher(format!("Refusing unsafe server name {:?}", name)));
        }
        Ok(self.root.join(name))
    }

    fn write_start_script(dir: &Path, record: &ResourceRecord) -> Result<()> {
        std::fs::create_dir_all(dir.join("plugins"))
            .map_err(|e| Error::Launcher(format!("{}: {}", dir.display(), e)))?;
        std::fs::write(dir.join(START_SCRIPT), &record.launch_descriptor)
            .map_err(|e| Error::Launcher(format!("{}: {}", dir.display(), e)))?;
        Ok(())
    }
}

impl ProcessLauncher for DirectoryLauncher {
    fn provision(&self, record: &ResourceRecord) -> Result<()> {
        let dir = self.server_dir(&record.key())?;
        Self::write_start_script(&dir, record)?;
        tracing::info!(dir = %dir.display(), "Server directory provisioned");
        Ok(())
    }

    fn resize(&self, previous: &ResourceKey, record: &ResourceRecord) -> Result<()> {
        let old_dir = self.server_dir(previous)?;
        let new_dir = self.server_dir(&record.key())?;

        if old_dir.exists() {
            std::fs::rename(&old_dir, &new_dir)
                .map_err(|e| Error::Launcher(format!("{}: {}", old_dir.display(), e)))?;
        } else {
            tracing::warn!(dir = %old_dir.display(), "Server directory missing, recreating");
        }
        Self::write_start_script(&new_dir, record)?;

        tracing::info!(from = %old_dir.display(), to = %new_dir.display(), "Server directory resized");
        Ok(())
    }

    fn reclaim(&self, key: &ResourceKey) -> Result<()> {
        let dir = self.server_dir(key)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(dir = %dir.display(), "Server directory reclaimed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %dir.display(), "Server directory already gone");
                Ok(())
            }
            Err(e) => Err(Error::Launcher(format!("{}: {}", dir.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Capacity;
    use crate::types::OwnerId;

    fn record(mb: u32) -> ResourceRecord {
        ResourceRecord {
            owner: OwnerId::new("alice"),
            capacity: Capacity::new(mb).unwrap(),
            launch_descriptor: format!("java -Xms{mb}M -Xmx{mb}M -jar server.jar nogui"),
        }
    }

    #[test]
    fn test_directory_lifecycle() {
        let temp = tempfile::tempdir().unwrap();
        let launcher = DirectoryLauncher::new(temp.path().join("servers")).unwrap();

        let small = record(512);
        launcher.apply(&ProvisionEvent::Created(small.clone())).unwrap();
        let small_dir = launcher.root().join("512_alice");
        assert!(small_dir.join("plugins").is_dir());
        assert_eq!(
            std::fs::read_to_string(small_dir.join(START_SCRIPT)).unwrap(),
            small.launch_descriptor
        );

        let big = record(1024);
        launcher
            .apply(&ProvisionEvent::Resized {
                previous: small.key(),
                record: big.clone(),
            })
            .unwrap();
        let big_dir = launcher.root().join("1024_alice");
        assert!(!small_dir.exists());
        assert!(big_dir.join("plugins").is_dir());
        assert!(std::fs::read_to_string(big_dir.join(START_SCRIPT))
            .unwrap()
            .contains("-Xmx1024M"));

        launcher.apply(&ProvisionEvent::Deleted(big.key())).unwrap();
        assert!(!big_dir.exists());

        // Reclaiming twice is harmless
        launcher.reclaim(&big.key()).unwrap();
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let temp = tempfile::tempdir().unwrap();
        let launcher = DirectoryLauncher::new(temp.path()).unwrap();
        let key = ResourceKey::new(OwnerId::new("../../etc"), Capacity::new(512).unwrap());
        assert!(matches!(launcher.server_dir(&key), Err(Error::Launcher(_))));
    }
}
