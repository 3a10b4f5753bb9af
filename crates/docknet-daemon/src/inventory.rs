//! Read-only view of the daemon's networks.
//!
//! Detail lookups are batched: the daemon accepts many references per
//! `network inspect` call, but fails the whole call if any one of them
//! vanished in the meantime. A failed batch is therefore dropped rather than
//! failing the caller, and conflict detection decides what a dropped batch
//! means through [`InspectFailurePolicy`].

use std::fmt;
use std::str::FromStr;

use docknet_core::{cidr, labels};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::docker::NetworkDaemon;
use crate::types::{NetworkRow, ObservedNetwork, MAX_BATCH_SIZE};
use crate::Result;

/// How conflict detection treats an inspection batch that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectFailurePolicy {
    /// A failed batch contributes no conflicts.
    #[default]
    Lenient,
    /// A failed batch blocks the operation as if it conflicted.
    Strict,
}

impl fmt::Display for InspectFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        })
    }
}

impl FromStr for InspectFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown inspect failure policy: {other}")),
        }
    }
}

/// A managed network with the details the list and prune commands need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedNetwork {
    /// Row from the daemon list.
    #[serde(flatten)]
    pub row: NetworkRow,
    /// Declared subnets; empty if unknown.
    pub subnets: Vec<String>,
    /// Attached endpoint count; `None` if the detail lookup failed.
    pub containers: Option<usize>,
}

/// Outcome of scanning the daemon for address-space conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictScan {
    /// Names of networks whose subnets overlap the candidate.
    pub conflicting: Vec<String>,
    /// Number of inspection batches that failed.
    pub failed_batches: usize,
}

impl ConflictScan {
    /// Whether the scan blocks creation under `policy`.
    #[must_use]
    pub fn blocks(&self, policy: InspectFailurePolicy) -> bool {
        !self.conflicting.is_empty()
            || (policy == InspectFailurePolicy::Strict && self.failed_batches > 0)
    }
}

struct Batched {
    networks: Vec<ObservedNetwork>,
    failed_batches: usize,
}

/// Batched, failure-tolerant reads against a [`NetworkDaemon`].
pub struct Inventory<'a, D: ?Sized> {
    daemon: &'a D,
    batch_size: usize,
}

impl<'a, D: NetworkDaemon + ?Sized> Inventory<'a, D> {
    /// Create a reader issuing at most `batch_size` references per inspect.
    ///
    /// The size is clamped to `1..=50` whatever the caller asks for.
    #[must_use]
    pub fn new(daemon: &'a D, batch_size: usize) -> Self {
        Self {
            daemon,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Whether a network named `name` appears in the daemon's list.
    ///
    /// # Errors
    ///
    /// Returns an error if the network list cannot be read.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let rows = self.daemon.list_networks(None).await?;
        Ok(rows.iter().any(|r| r.name == name))
    }

    /// Inspect one network by exact name. Any failure reads as absent, and
    /// so does a reference the daemon resolved to a differently named network.
    pub async fn inspect(&self, name: &str) -> Option<ObservedNetwork> {
        match self.daemon.inspect_networks(&[name.to_string()]).await {
            Ok(found) => {
                let hit = found.into_iter().find(|n| n.name == name);
                if hit.is_none() {
                    debug!(network = %name, "Inspect resolved to another network, treating as absent");
                }
                hit
            }
            Err(e) => {
                debug!(network = %name, error = %e, "Inspect failed, treating as absent");
                None
            }
        }
    }

    /// Networks carrying the plugin label, sorted by name, with details.
    ///
    /// Networks whose detail batch failed are still listed, with no subnets
    /// and an unknown container count.
    ///
    /// # Errors
    ///
    /// Returns an error if the network list cannot be read.
    pub async fn list_managed(&self) -> Result<Vec<ManagedNetwork>> {
        let rows = self
            .daemon
            .list_networks(Some(&labels::plugin_filter()))
            .await?;
        let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
        let details = self.inspect_batched(&names).await;

        let mut managed: Vec<ManagedNetwork> = rows
            .into_iter()
            .map(|row| {
                let detail = details.networks.iter().find(|n| n.name == row.name);
                ManagedNetwork {
                    subnets: detail.map(ObservedNetwork::subnets).unwrap_or_default(),
                    containers: detail.map(|n| n.endpoints.len()),
                    row,
                }
            })
            .collect();
        managed.sort_by(|a, b| a.row.name.cmp(&b.row.name));
        Ok(managed)
    }

    /// Scan every daemon network for subnets overlapping `candidate`.
    ///
    /// The network named `excluding` is skipped, so a network being replaced
    /// does not conflict with itself. An unparseable candidate conflicts with
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the network list cannot be read.
    pub async fn scan_conflicts(
        &self,
        candidate: &str,
        excluding: Option<&str>,
    ) -> Result<ConflictScan> {
        let Some(target) = cidr::normalize(candidate) else {
            return Ok(ConflictScan::default());
        };

        let rows = self.daemon.list_networks(None).await?;
        let ids: Vec<String> = rows.into_iter().map(|r| r.id).collect();
        let details = self.inspect_batched(&ids).await;

        let conflicting = details
            .networks
            .iter()
            .filter(|n| Some(n.name.as_str()) != excluding)
            .filter(|n| {
                n.normalized_subnets()
                    .iter()
                    .any(|s| cidr::overlap(&target, s))
            })
            .map(|n| n.name.clone())
            .collect();

        Ok(ConflictScan {
            conflicting,
            failed_batches: details.failed_batches,
        })
    }

    /// Whether `candidate` overlaps any network other than `excluding`,
    /// with failed batches handled per `policy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the network list cannot be read.
    pub async fn any_conflict(
        &self,
        candidate: &str,
        excluding: Option<&str>,
        policy: InspectFailurePolicy,
    ) -> Result<bool> {
        let scan = self.scan_conflicts(candidate, excluding).await?;
        if !scan.conflicting.is_empty() {
            debug!(subnet = %candidate, networks = ?scan.conflicting, "Subnet overlaps existing networks");
        }
        if scan.failed_batches > 0 {
            warn!(
                subnet = %candidate,
                failed_batches = scan.failed_batches,
                policy = %policy,
                "Conflict check could not inspect every network"
            );
        }
        Ok(scan.blocks(policy))
    }

    async fn inspect_batched(&self, refs: &[String]) -> Batched {
        let mut out = Batched {
            networks: Vec::with_capacity(refs.len()),
            failed_batches: 0,
        };
        for chunk in refs.chunks(self.batch_size) {
            match self.daemon.inspect_networks(chunk).await {
                Ok(found) => out.networks.extend(found),
                Err(e) => {
                    out.failed_batches += 1;
                    debug!(batch = chunk.len(), error = %e, "Inspect batch failed, skipping");
                }
            }
        }
        out
    }
}
