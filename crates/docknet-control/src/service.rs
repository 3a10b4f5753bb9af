//! Lifecycle service implementation.
//!
//! This module provides the `NetworkLifecycle` trait and the
//! `LifecycleService` implementation that drives create, adopt, destroy,
//! rename and reload against a [`NetworkDaemon`] and a [`MarkerStore`].
//!
//! Every operation probes the daemon first and validates its input before the
//! first mutating call. Once a destructive call has been made, failures are
//! reported precisely instead of being rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use docknet_core::{cidr, labels, MachineId, NetworkName, NetworkSpec, OperationId, SpecError};
use docknet_daemon::{
    render_create, CreateNetwork, DaemonError, Inventory, IpamConfig, ManagedNetwork,
    NetworkDaemon, ObservedNetwork,
};
use docknet_store::MarkerStore;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::error::{ControlError, Result};
use crate::lifecycle::{NetworkState, StateTracker};
use crate::migrate::{self, EndpointFailure};
use crate::ownership::OwnershipResolver;
use crate::types::{
    ControlConfig, DestroyOutcome, DestroyReport, EnsureOutcome, EnsureReport, InitReport,
    NetworkInfo, PruneReport, RenamePath, RenamePlan, RenameReport,
};

/// Trait defining the network lifecycle operations.
///
/// Machine hooks (`ensure`, `destroy`) act on behalf of one machine and are
/// ownership-gated. Operator commands act on any network by name.
#[async_trait]
pub trait NetworkLifecycle: Send + Sync {
    // =========================================================================
    // Machine Hooks
    // =========================================================================

    /// Create the network described by `spec`, or adopt it if it already
    /// exists with `caller`'s labels.
    ///
    /// A network that exists without `caller`'s labels is left untouched and
    /// reported as [`EnsureOutcome::Foreign`].
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidSpec` or `ControlError::SubnetConflict`
    /// before any mutating call, and `ControlError::CreateFailed` if the
    /// daemon rejects the create.
    async fn ensure(&self, caller: &MachineId, spec: &NetworkSpec) -> Result<EnsureReport>;

    /// Remove the network if `caller` created or owns it.
    ///
    /// Does nothing when `cleanup` is false or the network belongs to someone
    /// else.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RemoveFailed` if the network could not be
    /// removed; the ownership marker is kept in that case.
    async fn destroy(
        &self,
        caller: &MachineId,
        name: &NetworkName,
        cleanup: bool,
    ) -> Result<DestroyReport>;

    // =========================================================================
    // Operator Commands
    // =========================================================================

    /// Create a bridge network carrying only the plugin label.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NetworkExists`, `ControlError::InvalidSubnet`
    /// or `ControlError::SubnetConflict` before any mutating call.
    async fn init(&self, name: &NetworkName, subnet: &str) -> Result<InitReport>;

    /// Detach every endpoint and remove the network, regardless of ownership.
    ///
    /// With `with_containers`, attached containers are removed as well.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the network does not exist.
    async fn remove(&self, name: &NetworkName, with_containers: bool) -> Result<DestroyReport>;

    /// Details of one network.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the network does not exist.
    async fn info(&self, name: &NetworkName) -> Result<NetworkInfo>;

    /// Networks carrying the plugin label, sorted by name.
    async fn list(&self) -> Result<Vec<ManagedNetwork>>;

    /// Managed networks with no attached endpoints.
    ///
    /// Networks whose endpoint count could not be read are never candidates.
    async fn prune_candidates(&self) -> Result<Vec<ManagedNetwork>>;

    /// Remove each named network, continuing past failures.
    async fn prune(&self, names: &[String]) -> Result<PruneReport>;

    // =========================================================================
    // Rename and Reload
    // =========================================================================

    /// Validate a rename and decide how to carry it out.
    ///
    /// No mutating call is made. `subnet` defaults to the current first
    /// subnet.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound`, `ControlError::TargetExists`,
    /// `ControlError::InvalidSubnet` or `ControlError::SubnetConflict`.
    async fn plan_rename(
        &self,
        old: &NetworkName,
        new: &NetworkName,
        subnet: Option<&str>,
    ) -> Result<RenamePlan>;

    /// Carry out a plan from [`NetworkLifecycle::plan_rename`].
    ///
    /// Endpoints that could not be reattached are listed in
    /// `failed_reconnect`; the report is a partial failure, not an error.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RemoveFailed` or `ControlError::CreateFailed`
    /// when nothing was lost, `ControlError::RecreateFailed` when the old
    /// network is gone and the replacement could not be created, and
    /// `ControlError::OldNetworkRetained` when the old network could not be
    /// removed after migration, which includes any endpoint that failed to
    /// join the new network and so never left the old one.
    async fn execute_rename(&self, plan: &RenamePlan) -> Result<RenameReport>;

    /// Plan and carry out a rename.
    ///
    /// # Errors
    ///
    /// See [`NetworkLifecycle::plan_rename`] and
    /// [`NetworkLifecycle::execute_rename`].
    async fn rename(
        &self,
        old: &NetworkName,
        new: &NetworkName,
        subnet: Option<&str>,
    ) -> Result<RenameReport> {
        let plan = self.plan_rename(old, new, subnet).await?;
        self.execute_rename(&plan).await
    }

    /// Recreate a network under the same name, optionally with a new subnet.
    ///
    /// # Errors
    ///
    /// See [`NetworkLifecycle::rename`].
    async fn reload(&self, name: &NetworkName, subnet: Option<&str>) -> Result<RenameReport> {
        self.rename(name, name, subnet).await
    }
}

/// The main lifecycle service implementation.
pub struct LifecycleService<D: NetworkDaemon, S: MarkerStore> {
    daemon: Arc<D>,
    store: Arc<S>,
    config: ControlConfig,
}

impl<D: NetworkDaemon, S: MarkerStore> LifecycleService<D, S> {
    /// Create a new lifecycle service.
    #[must_use]
    pub fn new(daemon: Arc<D>, store: Arc<S>, config: ControlConfig) -> Self {
        Self {
            daemon,
            store,
            config,
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(daemon: Arc<D>, store: Arc<S>) -> Self {
        Self::new(daemon, store, ControlConfig::default())
    }

    /// Get a reference to the daemon.
    #[must_use]
    pub fn daemon(&self) -> &D {
        &self.daemon
    }

    /// Get a reference to the marker store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn inventory(&self) -> Inventory<'_, D> {
        Inventory::new(self.daemon.as_ref(), self.config.batch_size)
    }

    fn ownership(&self) -> OwnershipResolver<'_, D, S> {
        OwnershipResolver::new(
            self.daemon.as_ref(),
            self.store.as_ref(),
            self.config.batch_size,
        )
    }

    async fn precheck(&self) -> Result<()> {
        if self.daemon.is_available().await {
            Ok(())
        } else {
            warn!("Network daemon is not reachable");
            Err(ControlError::DaemonUnavailable)
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.inventory()
            .exists(name)
            .await
            .map_err(|e| ControlError::daemon("list", "networks", e))
    }

    /// Inspect a network that must exist, surfacing the daemon error.
    async fn inspect_required(&self, name: &NetworkName) -> Result<ObservedNetwork> {
        let found = self
            .daemon
            .inspect_networks(&[name.to_string()])
            .await
            .map_err(|e| ControlError::daemon("inspect", name.as_str(), e))?;
        found
            .into_iter()
            .find(|n| n.name == name.as_str())
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }

    async fn check_conflicts(&self, subnet: &str, excluding: Option<&str>) -> Result<()> {
        let blocked = self
            .inventory()
            .any_conflict(subnet, excluding, self.config.conflict_policy)
            .await
            .map_err(|e| ControlError::daemon("list", "networks", e))?;
        if blocked {
            warn!(subnet = %subnet, "Subnet overlaps an existing network");
            return Err(ControlError::SubnetConflict {
                subnet: subnet.to_string(),
            });
        }
        Ok(())
    }

    /// Issue a create, moving `tracker` out of `Creating` either way.
    async fn create(
        &self,
        request: &CreateNetwork,
        tracker: &mut StateTracker,
        on_failure: NetworkState,
    ) -> std::result::Result<(), (String, DaemonError)> {
        match self.daemon.create_network(request).await {
            Ok(()) => {
                let _ = tracker.advance(NetworkState::Present);
                info!(network = %request.name, subnets = ?request.subnets(), "Created network");
                Ok(())
            }
            Err(e) => {
                let _ = tracker.advance(on_failure);
                let command = e
                    .command()
                    .map_or_else(|| render_create("docker", request), str::to_string);
                error!(network = %request.name, command = %command, error = %e, "Failed to create network");
                Err((command, e))
            }
        }
    }

    async fn teardown(&self, name: &NetworkName, with_containers: bool) -> Result<DestroyReport> {
        let endpoints = self
            .inventory()
            .inspect(name.as_str())
            .await
            .map(|n| n.endpoint_names())
            .unwrap_or_default();

        let mut tracker = StateTracker::new(name.as_str(), NetworkState::Present);
        tracker.advance(NetworkState::Destroying)?;

        let mut failures =
            migrate::disconnect_all(self.daemon.as_ref(), name.as_str(), &endpoints).await;
        let disconnected = succeeded(&endpoints, &failures);

        let removed_containers = if with_containers {
            let (removed, failed) = migrate::remove_containers(self.daemon.as_ref(), &endpoints).await;
            failures.extend(failed);
            removed
        } else {
            Vec::new()
        };

        if let Err(e) = self.daemon.remove_network(name.as_str()).await {
            tracker.advance(NetworkState::Present)?;
            error!(network = %name, error = %e, "Failed to remove network");
            return Err(ControlError::RemoveFailed {
                name: name.to_string(),
                disconnected,
                source: e,
            });
        }
        tracker.advance(NetworkState::Absent)?;

        let marker_cleared = self.ownership().clear_marker(name);
        info!(network = %name, endpoints = endpoints.len(), "Removed network");

        Ok(DestroyReport {
            name: name.to_string(),
            outcome: DestroyOutcome::Removed,
            disconnected,
            endpoint_failures: failures,
            removed_containers,
            marker_cleared,
        })
    }

    async fn do_ensure(&self, caller: &MachineId, spec: &NetworkSpec) -> Result<EnsureReport> {
        self.precheck().await?;
        let name = spec.name.as_str();
        let ownership = self.ownership();

        if self.exists(name).await? {
            if ownership.is_owned_by_caller(&spec.name, caller).await {
                let marker_written = ownership.record_creation(caller, spec);
                info!(network = %name, machine = %caller, "Adopted existing network");
                return Ok(EnsureReport {
                    name: name.to_string(),
                    outcome: EnsureOutcome::Adopted,
                    subnet: None,
                    marker_written,
                });
            }
            info!(network = %name, "Network exists and is not managed by this machine, leaving it untouched");
            return Ok(EnsureReport {
                name: name.to_string(),
                outcome: EnsureOutcome::Foreign,
                subnet: None,
                marker_written: false,
            });
        }

        spec.validate()?;
        let Some(subnet) = spec.subnet.as_deref() else {
            return Err(SpecError::MissingSubnet.into());
        };
        self.check_conflicts(subnet, None).await?;

        let mut tracker = StateTracker::new(name, NetworkState::Absent);
        tracker.advance(NetworkState::Creating)?;
        let request = CreateNetwork::from_spec(spec, labels::ownership_labels(Some(caller)));
        self.create(&request, &mut tracker, NetworkState::Absent)
            .await
            .map_err(|(command, source)| ControlError::CreateFailed {
                name: name.to_string(),
                command,
                source,
            })?;

        let marker_written = ownership.record_creation(caller, spec);
        Ok(EnsureReport {
            name: name.to_string(),
            outcome: EnsureOutcome::Created,
            subnet: Some(subnet.to_string()),
            marker_written,
        })
    }

    async fn do_destroy(
        &self,
        caller: &MachineId,
        name: &NetworkName,
        cleanup: bool,
    ) -> Result<DestroyReport> {
        if !cleanup {
            info!(network = %name, "Cleanup on destroy is disabled, keeping network");
            return Ok(DestroyReport::unchanged(name.as_str(), DestroyOutcome::Skipped));
        }
        self.precheck().await?;

        let ownership = self.ownership();
        if !ownership.destroy_eligibility(name, caller).await.is_eligible() {
            info!(network = %name, machine = %caller, "Network is not owned by this machine, nothing to do");
            return Ok(DestroyReport::unchanged(name.as_str(), DestroyOutcome::NotOwned));
        }

        if !self.exists(name.as_str()).await? {
            let mut report = DestroyReport::unchanged(name.as_str(), DestroyOutcome::AlreadyAbsent);
            report.marker_cleared = ownership.clear_marker(name);
            info!(network = %name, "Network already absent, nothing to do");
            return Ok(report);
        }

        self.teardown(name, self.config.destroy_with_containers).await
    }

    async fn do_init(&self, name: &NetworkName, subnet: &str) -> Result<InitReport> {
        self.precheck().await?;
        if self.exists(name.as_str()).await? {
            return Err(ControlError::NetworkExists(name.to_string()));
        }
        if !cidr::is_aligned(subnet) {
            return Err(ControlError::InvalidSubnet(subnet.to_string()));
        }
        self.check_conflicts(subnet, None).await?;

        let spec = NetworkSpec::new(name.clone(), subnet);
        let request = CreateNetwork::from_spec(&spec, labels::ownership_labels(None));
        let mut tracker = StateTracker::new(name.as_str(), NetworkState::Absent);
        tracker.advance(NetworkState::Creating)?;
        self.create(&request, &mut tracker, NetworkState::Absent)
            .await
            .map_err(|(command, source)| ControlError::CreateFailed {
                name: name.to_string(),
                command,
                source,
            })?;

        Ok(InitReport {
            name: name.to_string(),
            subnet: subnet.to_string(),
        })
    }

    async fn do_plan_rename(
        &self,
        old: &NetworkName,
        new: &NetworkName,
        subnet: Option<&str>,
    ) -> Result<RenamePlan> {
        self.precheck().await?;
        if !self.exists(old.as_str()).await? {
            return Err(ControlError::NotFound(old.to_string()));
        }
        if new != old && self.exists(new.as_str()).await? {
            return Err(ControlError::TargetExists(new.to_string()));
        }

        let observed = self.inspect_required(old).await?;
        let subnet = match subnet {
            Some(s) => s.to_string(),
            None => observed
                .subnets()
                .into_iter()
                .next()
                .ok_or(SpecError::MissingSubnet)?,
        };
        if !cidr::is_aligned(&subnet) {
            return Err(ControlError::InvalidSubnet(subnet));
        }

        let same_subnet = cidr::normalize(&subnet)
            .is_some_and(|target| observed.normalized_subnets().contains(&target));
        if !same_subnet {
            if self.config.skip_conflicts {
                warn!(network = %old, subnet = %subnet, "Skipping subnet conflict check");
            } else {
                self.check_conflicts(&subnet, Some(old.as_str())).await?;
            }
        }

        let path = if new == old || same_subnet {
            RenamePath::Rebuild
        } else {
            RenamePath::Migrate
        };
        // an unchanged subnet keeps the declared gateway and ip range
        let ipam = (!same_subnet).then(|| vec![IpamConfig::subnet(subnet.clone())]);
        let request = CreateNetwork::replacing(&observed, new.clone(), ipam);

        Ok(RenamePlan {
            old: old.clone(),
            new: new.clone(),
            subnet,
            same_subnet,
            path,
            observed,
            request,
        })
    }

    async fn do_execute_rename(&self, plan: &RenamePlan) -> Result<RenameReport> {
        let mut tracker = StateTracker::new(plan.old.as_str(), NetworkState::Present);
        tracker.advance(if plan.is_reload() {
            NetworkState::Reloading
        } else {
            NetworkState::Renaming
        })?;

        let outcome = match plan.path {
            RenamePath::Rebuild => self.rebuild(plan, &mut tracker).await,
            RenamePath::Migrate => self.migrate(plan, &mut tracker).await,
        };
        if outcome.is_err() && !tracker.is_settled() {
            warn!(network = %tracker.network(), state = %tracker.state(), "Operation stopped mid-transition");
        }
        let report = outcome?;

        if report.is_partial() {
            warn!(
                old = %report.old,
                new = %report.new,
                failed = ?report.failed_reconnect,
                "Some endpoints could not be reconnected"
            );
        } else {
            info!(old = %report.old, new = %report.new, subnet = %report.subnet, "Replaced network");
        }
        Ok(report)
    }

    /// Disconnect all, remove old, create replacement, reconnect all.
    async fn rebuild(&self, plan: &RenamePlan, tracker: &mut StateTracker) -> Result<RenameReport> {
        let endpoints = plan.endpoints();
        let old = plan.old.as_str();

        let failures = migrate::disconnect_all(self.daemon.as_ref(), old, &endpoints).await;
        if let Err(e) = self.daemon.remove_network(old).await {
            tracker.advance(NetworkState::Present)?;
            error!(network = %old, error = %e, "Failed to remove network, aborting");
            return Err(ControlError::RemoveFailed {
                name: old.to_string(),
                disconnected: succeeded(&endpoints, &failures),
                source: e,
            });
        }
        tracker.advance(NetworkState::Absent)?;

        tracker.rename(plan.new.as_str());
        tracker.advance(NetworkState::Creating)?;
        if let Err((command, source)) = self.create(&plan.request, tracker, NetworkState::Failed).await {
            return Err(ControlError::RecreateFailed {
                name: plan.new.to_string(),
                subnet: plan.subnet.clone(),
                command,
                endpoints,
                source,
            });
        }
        self.carry_marker(plan);

        let migration =
            migrate::reconnect_all(self.daemon.as_ref(), plan.new.as_str(), &endpoints).await;
        Ok(RenameReport::new(plan, migration))
    }

    /// Create new, move endpoints across one by one, remove old last.
    async fn migrate(&self, plan: &RenamePlan, tracker: &mut StateTracker) -> Result<RenameReport> {
        let endpoints = plan.endpoints();
        let old = plan.old.as_str();

        let mut created = StateTracker::new(plan.new.as_str(), NetworkState::Absent);
        created.advance(NetworkState::Creating)?;
        if let Err((command, source)) = self.create(&plan.request, &mut created, NetworkState::Absent).await {
            tracker.advance(NetworkState::Present)?;
            return Err(ControlError::CreateFailed {
                name: plan.new.to_string(),
                command,
                source,
            });
        }

        let migration =
            migrate::migrate_endpoints(self.daemon.as_ref(), old, plan.new.as_str(), &endpoints)
                .await;
        let report = RenameReport::new(plan, migration);

        if let Err(e) = self.daemon.remove_network(old).await {
            tracker.advance(NetworkState::Present)?;
            error!(network = %old, error = %e, "Failed to remove old network after migration");
            return Err(ControlError::OldNetworkRetained {
                report: Box::new(report),
                source: e,
            });
        }
        tracker.advance(NetworkState::Absent)?;
        self.carry_marker(plan);

        Ok(report)
    }

    fn carry_marker(&self, plan: &RenamePlan) {
        let ipam = plan
            .request
            .ipam
            .first()
            .cloned()
            .unwrap_or_else(|| IpamConfig::subnet(plan.subnet.clone()));
        self.ownership().carry_marker(&plan.old, &plan.new, &ipam);
    }

    async fn do_prune(&self, names: &[String]) -> Result<PruneReport> {
        self.precheck().await?;
        let mut report = PruneReport::default();
        for name in names {
            match self.daemon.remove_network(name).await {
                Ok(()) => {
                    info!(network = %name, "Pruned network");
                    if let Ok(parsed) = NetworkName::parse(name) {
                        self.ownership().clear_marker(&parsed);
                    }
                    report.pruned.push(name.clone());
                }
                Err(e) => {
                    warn!(network = %name, error = %e, "Failed to prune network");
                    report.failed.push(name.clone());
                }
            }
        }
        Ok(report)
    }
}

/// Endpoints that do not appear in `failures`, in order.
fn succeeded(endpoints: &[String], failures: &[EndpointFailure]) -> Vec<String> {
    endpoints
        .iter()
        .filter(|e| !failures.iter().any(|f| &f.endpoint == *e))
        .cloned()
        .collect()
}

fn operation_span(action: &'static str, network: &str) -> Span {
    info_span!("operation", action, network = %network, op = %OperationId::generate())
}

#[async_trait]
impl<D: NetworkDaemon, S: MarkerStore> NetworkLifecycle for LifecycleService<D, S> {
    async fn ensure(&self, caller: &MachineId, spec: &NetworkSpec) -> Result<EnsureReport> {
        self.do_ensure(caller, spec)
            .instrument(operation_span("ensure", spec.name.as_str()))
            .await
    }

    async fn destroy(
        &self,
        caller: &MachineId,
        name: &NetworkName,
        cleanup: bool,
    ) -> Result<DestroyReport> {
        self.do_destroy(caller, name, cleanup)
            .instrument(operation_span("destroy", name.as_str()))
            .await
    }

    async fn init(&self, name: &NetworkName, subnet: &str) -> Result<InitReport> {
        self.do_init(name, subnet)
            .instrument(operation_span("init", name.as_str()))
            .await
    }

    async fn remove(&self, name: &NetworkName, with_containers: bool) -> Result<DestroyReport> {
        async {
            self.precheck().await?;
            if !self.exists(name.as_str()).await? {
                return Err(ControlError::NotFound(name.to_string()));
            }
            self.teardown(name, with_containers).await
        }
        .instrument(operation_span("remove", name.as_str()))
        .await
    }

    async fn info(&self, name: &NetworkName) -> Result<NetworkInfo> {
        self.precheck().await?;
        if !self.exists(name.as_str()).await? {
            return Err(ControlError::NotFound(name.to_string()));
        }
        Ok(self.inspect_required(name).await?.into())
    }

    async fn list(&self) -> Result<Vec<ManagedNetwork>> {
        self.precheck().await?;
        self.inventory()
            .list_managed()
            .await
            .map_err(|e| ControlError::daemon("list", "networks", e))
    }

    async fn prune_candidates(&self) -> Result<Vec<ManagedNetwork>> {
        let managed = self.list().await?;
        Ok(managed
            .into_iter()
            .filter(|n| n.containers == Some(0))
            .collect())
    }

    async fn prune(&self, names: &[String]) -> Result<PruneReport> {
        self.do_prune(names)
            .instrument(operation_span("prune", "*"))
            .await
    }

    async fn plan_rename(
        &self,
        old: &NetworkName,
        new: &NetworkName,
        subnet: Option<&str>,
    ) -> Result<RenamePlan> {
        self.do_plan_rename(old, new, subnet)
            .instrument(operation_span("plan", old.as_str()))
            .await
    }

    async fn execute_rename(&self, plan: &RenamePlan) -> Result<RenameReport> {
        let action = if plan.is_reload() { "reload" } else { "rename" };
        self.do_execute_rename(plan)
            .instrument(operation_span(action, plan.old.as_str()))
            .await
    }
}
