//! File-backed marker storage.
//!
//! This module provides the `FileMarkerStore` implementation of the
//! `MarkerStore` trait.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use docknet_core::NetworkName;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::types::OwnershipMarker;
use crate::MarkerStore;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DOCKNET_DATA_DIR";

/// Data directory used when [`DATA_DIR_ENV`] is unset.
pub const DEFAULT_DATA_DIR: &str = ".docknet";

const MARKER_SUBDIR: &str = "docker-networks";

/// Marker store keeping one JSON file per network.
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    dir: PathBuf,
}

impl FileMarkerStore {
    /// Open a store rooted at `data_dir`, creating the marker directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let dir = data_dir.as_ref().join(MARKER_SUBDIR);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Open a store rooted at `$DOCKNET_DATA_DIR`, or `.docknet` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn from_env() -> Result<Self> {
        let root = std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        Self::open(root)
    }

    /// Directory holding the marker files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the marker file for `name`.
    #[must_use]
    pub fn marker_path(&self, name: &NetworkName) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl MarkerStore for FileMarkerStore {
    fn put_marker(&self, marker: &OwnershipMarker) -> Result<()> {
        let path = self.marker_path(&marker.name);
        let body = serde_json::to_vec_pretty(marker)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(&body)
            .and_then(|()| tmp.flush())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;

        debug!(network = %marker.name, path = %path.display(), "Wrote ownership marker");
        Ok(())
    }

    fn get_marker(&self, name: &NetworkName) -> Result<Option<OwnershipMarker>> {
        let path = self.marker_path(name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        match serde_json::from_slice(&data) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                warn!(network = %name, path = %path.display(), error = %e, "Ignoring unreadable ownership marker");
                Ok(None)
            }
        }
    }

    fn delete_marker(&self, name: &NetworkName) -> Result<()> {
        let path = self.marker_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(network = %name, "Deleted ownership marker");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docknet_core::{MachineId, NetworkSpec};
    use tempfile::TempDir;

    fn create_test_store() -> (FileMarkerStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileMarkerStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn machine() -> MachineId {
        MachineId::parse("machine-1").unwrap()
    }

    #[test]
    fn marker_crud() {
        let (store, _dir) = create_test_store();
        let spec = NetworkSpec::default();
        let marker = OwnershipMarker::new(machine(), &spec);

        store.put_marker(&marker).unwrap();
        assert!(store.marker_path(&spec.name).exists());

        let read = store.get_marker(&spec.name).unwrap().unwrap();
        assert_eq!(read.name, spec.name);
        assert_eq!(read.machine_id, machine());
        assert_eq!(read.config.subnet, spec.subnet);

        store.delete_marker(&spec.name).unwrap();
        assert!(store.get_marker(&spec.name).unwrap().is_none());
    }

    #[test]
    fn missing_marker_reads_as_none() {
        let (store, _dir) = create_test_store();
        let name = NetworkName::parse("ghost").unwrap();
        assert!(store.get_marker(&name).unwrap().is_none());
    }

    #[test]
    fn corrupt_marker_reads_as_none() {
        let (store, _dir) = create_test_store();
        let name = NetworkName::parse("broken").unwrap();
        fs::write(store.marker_path(&name), b"{not json").unwrap();
        assert!(store.get_marker(&name).unwrap().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _dir) = create_test_store();
        let name = NetworkName::parse("never-written").unwrap();
        store.delete_marker(&name).unwrap();
        store.delete_marker(&name).unwrap();
    }

    #[test]
    fn put_replaces_existing_marker() {
        let (store, _dir) = create_test_store();
        let spec = NetworkSpec::default();
        store
            .put_marker(&OwnershipMarker::new(machine(), &spec))
            .unwrap();

        let other = MachineId::parse("machine-2").unwrap();
        store
            .put_marker(&OwnershipMarker::new(other.clone(), &spec))
            .unwrap();

        let read = store.get_marker(&spec.name).unwrap().unwrap();
        assert_eq!(read.machine_id, other);
        let leftovers = fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn open_creates_marker_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileMarkerStore::open(dir.path().join("nested")).unwrap();
        assert!(store.dir().ends_with("docker-networks"));
        assert!(store.dir().is_dir());
    }
}
