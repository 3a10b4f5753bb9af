//! Ownership resolution.
//!
//! Two independent signals say whether a network belongs to a machine: the
//! local marker written when the machine created or adopted the network, and
//! the labels stored on the network itself. Either one is enough to allow a
//! destroy.

use chrono::Utc;
use docknet_core::{labels, MachineId, NetworkName, NetworkSpec};
use docknet_daemon::{Inventory, IpamConfig, NetworkDaemon};
use docknet_store::{MarkerConfig, MarkerStore, OwnershipMarker};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which ownership signals matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// The local marker names this machine.
    pub by_marker: bool,
    /// The network labels name this machine.
    pub by_labels: bool,
}

impl Eligibility {
    /// True if either signal matched.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.by_marker || self.by_labels
    }
}

/// Answers ownership questions for one daemon and marker store.
pub struct OwnershipResolver<'a, D: ?Sized, S: ?Sized> {
    inventory: Inventory<'a, D>,
    store: &'a S,
}

impl<'a, D, S> OwnershipResolver<'a, D, S>
where
    D: NetworkDaemon + ?Sized,
    S: MarkerStore + ?Sized,
{
    /// Create a resolver.
    #[must_use]
    pub fn new(daemon: &'a D, store: &'a S, batch_size: usize) -> Self {
        Self {
            inventory: Inventory::new(daemon, batch_size),
            store,
        }
    }

    /// True if the network exists and its labels name `caller`.
    pub async fn is_owned_by_caller(&self, name: &NetworkName, caller: &MachineId) -> bool {
        self.inventory
            .inspect(name.as_str())
            .await
            .is_some_and(|n| labels::is_owned_by(&n.labels, caller))
    }

    /// True if the local marker for `name` was written by `caller`.
    ///
    /// An unreadable marker counts as absent.
    pub fn was_created_by_caller(&self, name: &NetworkName, caller: &MachineId) -> bool {
        match self.store.get_marker(name) {
            Ok(Some(marker)) => marker.matches(name, caller),
            Ok(None) => false,
            Err(e) => {
                warn!(network = %name, error = %e, "Failed to read ownership marker");
                false
            }
        }
    }

    /// Both signals for `name`.
    pub async fn destroy_eligibility(&self, name: &NetworkName, caller: &MachineId) -> Eligibility {
        let eligibility = Eligibility {
            by_marker: self.was_created_by_caller(name, caller),
            by_labels: self.is_owned_by_caller(name, caller).await,
        };
        debug!(
            network = %name,
            by_marker = eligibility.by_marker,
            by_labels = eligibility.by_labels,
            "Resolved destroy eligibility"
        );
        eligibility
    }

    /// Write the marker for a network `caller` created or adopted.
    ///
    /// Returns whether the marker was written; a failure is only logged.
    pub fn record_creation(&self, caller: &MachineId, spec: &NetworkSpec) -> bool {
        let marker = OwnershipMarker::new(caller.clone(), spec);
        self.put(&marker)
    }

    /// Move the marker of a replaced network to its replacement.
    ///
    /// The new marker keeps the machine and driver settings and takes the
    /// replacement's addressing. Does nothing if `old` has no marker.
    pub fn carry_marker(&self, old: &NetworkName, new: &NetworkName, ipam: &IpamConfig) -> bool {
        let previous = match self.store.get_marker(old) {
            Ok(Some(marker)) => marker,
            Ok(None) => return false,
            Err(e) => {
                warn!(network = %old, error = %e, "Failed to read ownership marker");
                return false;
            }
        };

        let marker = OwnershipMarker {
            name: new.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            config: MarkerConfig {
                subnet: ipam.subnet.clone(),
                gateway: ipam.gateway.clone(),
                ip_range: ipam.ip_range.clone(),
                ..previous.config
            },
            ..previous
        };
        let written = self.put(&marker);
        if written && old != new {
            self.clear_marker(old);
        }
        written
    }

    /// Delete the marker for `name`. Returns whether the store is now clean.
    pub fn clear_marker(&self, name: &NetworkName) -> bool {
        match self.store.delete_marker(name) {
            Ok(()) => true,
            Err(e) => {
                warn!(network = %name, error = %e, "Failed to delete ownership marker");
                false
            }
        }
    }

    fn put(&self, marker: &OwnershipMarker) -> bool {
        match self.store.put_marker(marker) {
            Ok(()) => {
                debug!(network = %marker.name, machine = %marker.machine_id, "Recorded ownership marker");
                true
            }
            Err(e) => {
                warn!(network = %marker.name, error = %e, "Failed to write ownership marker");
                false
            }
        }
    }
}
