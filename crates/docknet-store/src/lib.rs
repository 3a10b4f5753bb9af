//! Ownership marker storage for docknet.
//!
//! A marker is a small JSON file remembering that this machine created a
//! network. It is one of the two ownership signals (the other being daemon
//! labels) and is deliberately forgiving: a missing or unreadable marker reads
//! as "no marker", and callers treat write failures as warnings.
//!
//! # Layout
//!
//! ```text
//! <data_dir>/docker-networks/<network name>.json
//! ```
//!
//! # Example
//!
//! ```no_run
//! use docknet_core::{MachineId, NetworkSpec};
//! use docknet_store::{FileMarkerStore, MarkerStore, OwnershipMarker};
//!
//! let store = FileMarkerStore::open(".docknet").unwrap();
//! let spec = NetworkSpec::default();
//! let marker = OwnershipMarker::new(MachineId::parse("m-1").unwrap(), &spec);
//! store.put_marker(&marker).unwrap();
//! assert!(store.get_marker(&spec.name).unwrap().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod file;
pub mod types;

pub use error::{Result, StoreError};
pub use file::{FileMarkerStore, DATA_DIR_ENV, DEFAULT_DATA_DIR};
pub use types::{MarkerConfig, OwnershipMarker};

use docknet_core::NetworkName;

/// Storage for ownership markers, one per network name.
pub trait MarkerStore: Send + Sync {
    // =========================================================================
    // Marker Operations
    // =========================================================================

    /// Write the marker for `marker.name`, replacing any existing one.
    ///
    /// The write is atomic: readers see either the old or the new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be serialized or written.
    fn put_marker(&self, marker: &OwnershipMarker) -> Result<()>;

    /// Read the marker for a network.
    ///
    /// A missing file and a file that does not parse both read as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read.
    fn get_marker(&self, name: &NetworkName) -> Result<Option<OwnershipMarker>>;

    /// Delete the marker for a network. Deleting a missing marker succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    fn delete_marker(&self, name: &NetworkName) -> Result<()>;
}
