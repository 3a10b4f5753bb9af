//! Requests, reports and configuration for lifecycle operations.
//!
//! Every report converts into the caller-facing [`OperationResult`]
//! envelope:
//!
//! ```json
//! { "action": "rename", "status": "partial_failure", "code": 1, "data": { ... }, "error": "..." }
//! ```

use docknet_core::NetworkName;
use docknet_daemon::{CreateNetwork, InspectFailurePolicy, ObservedNetwork, MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ControlError, ErrorKind};
use crate::migrate::{EndpointFailure, EndpointMigration};

/// Environment variable selecting the [`InspectFailurePolicy`].
pub const CONFLICT_POLICY_ENV: &str = "DOCKNET_CONFLICT_POLICY";

/// Environment variable that disables the overlap gate on rename and reload.
pub const SKIP_CONFLICTS_ENV: &str = "DOCKNET_SKIP_CONFLICTS";

/// Environment variable making the machine-hook destroy remove containers too.
pub const DESTROY_WITH_CONTAINERS_ENV: &str = "DOCKNET_DESTROY_WITH_CONTAINERS";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the lifecycle service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// How a failed inspection batch affects conflict detection.
    pub conflict_policy: InspectFailurePolicy,
    /// Skip the overlap gate on rename and reload.
    pub skip_conflicts: bool,
    /// Remove attached containers when a machine's network is destroyed.
    pub destroy_with_containers: bool,
    /// References per inspection call.
    pub batch_size: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            conflict_policy: InspectFailurePolicy::Lenient,
            skip_conflicts: false,
            destroy_with_containers: false,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl ControlConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// An unknown conflict policy falls back to lenient with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let conflict_policy = match std::env::var(CONFLICT_POLICY_ENV) {
            Ok(raw) => raw.parse::<InspectFailurePolicy>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring {CONFLICT_POLICY_ENV}");
                InspectFailurePolicy::Lenient
            }),
            Err(_) => InspectFailurePolicy::Lenient,
        };

        Self {
            conflict_policy,
            skip_conflicts: env_flag(SKIP_CONFLICTS_ENV),
            destroy_with_containers: env_flag(DESTROY_WITH_CONTAINERS_ENV),
            ..Self::default()
        }
    }

    /// Override the inspection batch size, clamped to `1..=50`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ============================================================================
// Result envelope
// ============================================================================

/// Overall outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The operation did what was asked.
    Success,
    /// There was nothing to do.
    Noop,
    /// The operation finished but some endpoints or items failed.
    PartialFailure,
    /// The operation failed.
    Error,
}

impl OutcomeStatus {
    /// Exit code for this status when no error supplies one.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success | Self::Noop => 0,
            Self::PartialFailure | Self::Error => 1,
        }
    }
}

/// A report that can be rendered as an [`OperationResult`].
pub trait Report: Serialize {
    /// Overall outcome.
    fn status(&self) -> OutcomeStatus;

    /// Human-readable explanation for non-success outcomes.
    fn message(&self) -> Option<String> {
        None
    }
}

/// The caller-facing result of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Operation name.
    pub action: String,
    /// Overall outcome.
    pub status: OutcomeStatus,
    /// Process exit code.
    pub code: i32,
    /// Operation-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error or partial-failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    /// A successful result carrying `data`.
    #[must_use]
    pub fn success(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            status: OutcomeStatus::Success,
            code: 0,
            data: non_empty(data),
            error: None,
        }
    }

    /// A failed result with an explicit message and code.
    #[must_use]
    pub fn failure(
        action: impl Into<String>,
        error: impl Into<String>,
        data: Value,
        code: i32,
    ) -> Self {
        Self {
            action: action.into(),
            status: OutcomeStatus::Error,
            code,
            data: non_empty(data),
            error: Some(error.into()),
        }
    }

    /// Render a report.
    #[must_use]
    pub fn from_report<R: Report>(action: impl Into<String>, report: &R) -> Self {
        let status = report.status();
        let error = match status {
            OutcomeStatus::PartialFailure | OutcomeStatus::Error => report.message(),
            OutcomeStatus::Success | OutcomeStatus::Noop => None,
        };
        Self {
            action: action.into(),
            status,
            code: status.exit_code(),
            data: serde_json::to_value(report).ok().and_then(non_empty),
            error,
        }
    }

    /// Render an error.
    #[must_use]
    pub fn from_error(action: impl Into<String>, err: &ControlError) -> Self {
        let status = if err.kind() == ErrorKind::PartialFailure {
            OutcomeStatus::PartialFailure
        } else {
            OutcomeStatus::Error
        };
        Self {
            action: action.into(),
            status,
            code: err.exit_code(),
            data: err.data().and_then(non_empty),
            error: Some(err.to_string()),
        }
    }

    /// True for success and no-op outcomes.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success | OutcomeStatus::Noop)
    }
}

fn non_empty(value: Value) -> Option<Value> {
    let empty = value.is_null() || value.as_object().is_some_and(serde_json::Map::is_empty);
    (!empty).then_some(value)
}

// ============================================================================
// Reports
// ============================================================================

/// How `ensure` resolved an existing or missing network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    /// The network was created.
    Created,
    /// The network already existed with this machine's labels and was adopted.
    Adopted,
    /// The network already existed and belongs to someone else.
    Foreign,
}

/// Result of `ensure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureReport {
    /// Network name.
    pub name: String,
    /// What happened.
    pub outcome: EnsureOutcome,
    /// Subnet the network was created with, if it was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Whether the ownership marker was written.
    pub marker_written: bool,
}

impl Report for EnsureReport {
    fn status(&self) -> OutcomeStatus {
        match self.outcome {
            EnsureOutcome::Created | EnsureOutcome::Adopted => OutcomeStatus::Success,
            EnsureOutcome::Foreign => OutcomeStatus::Noop,
        }
    }

    fn message(&self) -> Option<String> {
        (self.outcome == EnsureOutcome::Foreign)
            .then(|| format!("network {} exists and is not managed by this machine", self.name))
    }
}

/// How a destroy resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyOutcome {
    /// The network was removed.
    Removed,
    /// The network was already gone.
    AlreadyAbsent,
    /// The network is not owned by the caller and was left alone.
    NotOwned,
    /// Cleanup on destroy is disabled.
    Skipped,
}

/// Result of a destroy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyReport {
    /// Network name.
    pub name: String,
    /// What happened.
    pub outcome: DestroyOutcome,
    /// Endpoints detached before removal.
    #[serde(default)]
    pub disconnected: Vec<String>,
    /// Endpoints that could not be detached or removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint_failures: Vec<EndpointFailure>,
    /// Containers removed along with the network.
    #[serde(default)]
    pub removed_containers: Vec<String>,
    /// Whether an ownership marker was cleared.
    pub marker_cleared: bool,
}

impl DestroyReport {
    pub(crate) fn unchanged(name: impl Into<String>, outcome: DestroyOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            disconnected: Vec::new(),
            endpoint_failures: Vec::new(),
            removed_containers: Vec::new(),
            marker_cleared: false,
        }
    }
}

impl Report for DestroyReport {
    fn status(&self) -> OutcomeStatus {
        match self.outcome {
            DestroyOutcome::Removed => OutcomeStatus::Success,
            DestroyOutcome::AlreadyAbsent | DestroyOutcome::NotOwned | DestroyOutcome::Skipped => {
                OutcomeStatus::Noop
            }
        }
    }

    fn message(&self) -> Option<String> {
        match self.outcome {
            DestroyOutcome::Removed => None,
            DestroyOutcome::AlreadyAbsent | DestroyOutcome::NotOwned => {
                Some(format!("nothing to do for network {}", self.name))
            }
            DestroyOutcome::Skipped => Some("cleanup on destroy is disabled".to_string()),
        }
    }
}

/// Result of `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitReport {
    /// Network name.
    pub name: String,
    /// Subnet the network was created with.
    pub subnet: String,
}

impl Report for InitReport {
    fn status(&self) -> OutcomeStatus {
        OutcomeStatus::Success
    }
}

/// One attached container as shown by `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInfo {
    /// Container name.
    pub name: String,
    /// IPv4 address with prefix, if any.
    #[serde(rename = "IPv4")]
    pub ipv4: Option<String>,
}

/// Details of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkInfo {
    /// Network name.
    pub name: String,
    /// Full network id.
    pub id: String,
    /// Driver name.
    pub driver: String,
    /// Declared subnets.
    pub subnets: Vec<String>,
    /// Attached containers, ordered by name.
    pub containers: Vec<ContainerInfo>,
}

impl NetworkInfo {
    /// The 12-character id prefix.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}

impl From<ObservedNetwork> for NetworkInfo {
    fn from(observed: ObservedNetwork) -> Self {
        Self {
            subnets: observed.subnets(),
            containers: observed
                .endpoints
                .into_iter()
                .map(|e| ContainerInfo {
                    name: e.name,
                    ipv4: e.ipv4,
                })
                .collect(),
            name: observed.name,
            id: observed.id,
            driver: observed.driver,
        }
    }
}

/// Result of `prune`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    /// Networks that were removed.
    pub pruned: Vec<String>,
    /// Networks that could not be removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

impl PruneReport {
    /// Every network a removal was attempted for.
    #[must_use]
    pub fn attempted(&self) -> Vec<String> {
        let mut all = self.pruned.clone();
        all.extend(self.failed.iter().cloned());
        all.sort();
        all
    }
}

impl Report for PruneReport {
    fn status(&self) -> OutcomeStatus {
        if !self.failed.is_empty() {
            OutcomeStatus::PartialFailure
        } else if self.pruned.is_empty() {
            OutcomeStatus::Noop
        } else {
            OutcomeStatus::Success
        }
    }

    fn message(&self) -> Option<String> {
        (!self.failed.is_empty())
            .then(|| format!("failed to remove: {}", self.failed.join(", ")))
    }
}

/// Which procedure a rename or reload follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenamePath {
    /// Disconnect, remove, recreate, reconnect.
    #[default]
    Rebuild,
    /// Create the new network, move endpoints across, remove the old one.
    Migrate,
}

/// A validated rename or reload, ready to execute.
#[derive(Debug, Clone)]
pub struct RenamePlan {
    /// Current network name.
    pub old: NetworkName,
    /// Target network name; equal to `old` for a reload.
    pub new: NetworkName,
    /// Subnet the replacement will use.
    pub subnet: String,
    /// Whether `subnet` matches one of the current subnets.
    pub same_subnet: bool,
    /// Procedure to follow.
    pub path: RenamePath,
    /// Snapshot of the current network.
    pub observed: ObservedNetwork,
    /// Create request for the replacement.
    pub request: CreateNetwork,
}

impl RenamePlan {
    /// True if the network keeps its name.
    #[must_use]
    pub fn is_reload(&self) -> bool {
        self.old == self.new
    }

    /// Names of the endpoints that will be moved, in order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        self.observed.endpoint_names()
    }
}

/// Result of a rename or reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameReport {
    /// Previous network name.
    pub old: String,
    /// New network name.
    pub new: String,
    /// Subnet of the replacement.
    pub subnet: String,
    /// Procedure that was followed.
    pub path: RenamePath,
    /// Endpoints attached to the replacement.
    pub reconnected: Vec<String>,
    /// Endpoints that could not be attached to the new network.
    pub failed_reconnect: Vec<String>,
}

impl RenameReport {
    pub(crate) fn new(plan: &RenamePlan, migration: EndpointMigration) -> Self {
        Self {
            old: plan.old.to_string(),
            new: plan.new.to_string(),
            subnet: plan.subnet.clone(),
            path: plan.path,
            reconnected: migration.reconnected,
            failed_reconnect: migration.failed_reconnect,
        }
    }

    /// True if at least one endpoint could not be reattached.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_reconnect.is_empty()
    }
}

impl Report for RenameReport {
    fn status(&self) -> OutcomeStatus {
        if self.is_partial() {
            OutcomeStatus::PartialFailure
        } else {
            OutcomeStatus::Success
        }
    }

    fn message(&self) -> Option<String> {
        self.is_partial().then(|| {
            format!(
                "failed to reconnect to {}: {}",
                self.new,
                self.failed_reconnect.join(", ")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_config_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.conflict_policy, InspectFailurePolicy::Lenient);
        assert!(!config.skip_conflicts);
        assert!(!config.destroy_with_containers);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.with_batch_size(7).batch_size, 7);
    }

    #[test]
    fn control_batch_size_is_clamped() {
        assert_eq!(ControlConfig::default().with_batch_size(0).batch_size, 1);
        assert_eq!(ControlConfig::default().with_batch_size(500).batch_size, 50);
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "false", "nope"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn partial_rename_is_never_success() {
        let report = RenameReport {
            old: "a".into(),
            new: "b".into(),
            subnet: "10.0.0.0/24".into(),
            path: RenamePath::Migrate,
            reconnected: vec!["web".into()],
            failed_reconnect: vec!["db".into()],
        };
        let result = OperationResult::from_report("rename", &report);
        assert_eq!(result.status, OutcomeStatus::PartialFailure);
        assert_eq!(result.code, 1);
        assert!(result.error.unwrap().contains("db"));

        let data = result.data.unwrap();
        assert_eq!(data["old"], "a");
        assert_eq!(data["new"], "b");
        assert_eq!(data["reconnected"], json!(["web"]));
        assert_eq!(data["failed_reconnect"], json!(["db"]));
    }

    #[test]
    fn envelope_skips_empty_fields() {
        let result = OperationResult::success("version", json!({}));
        let text = serde_json::to_string(&result).unwrap();
        assert_eq!(text, r#"{"action":"version","status":"success","code":0}"#);
    }

    #[test]
    fn error_envelope_uses_exit_code() {
        let result = OperationResult::from_error("info", &ControlError::DaemonUnavailable);
        assert_eq!(result.status, OutcomeStatus::Error);
        assert_eq!(result.code, 2);
        assert!(result.data.is_none());

        let result = OperationResult::from_error("info", &ControlError::NotFound("x".into()));
        assert_eq!(result.code, 1);
        assert_eq!(result.data.unwrap()["name"], "x");
    }

    #[test]
    fn destroy_noop_outcomes() {
        let report = DestroyReport::unchanged("net-a", DestroyOutcome::NotOwned);
        assert_eq!(report.status(), OutcomeStatus::Noop);
        let result = OperationResult::from_report("destroy", &report);
        assert!(result.is_ok());
        assert_eq!(result.code, 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn prune_statuses() {
        assert_eq!(PruneReport::default().status(), OutcomeStatus::Noop);
        let report = PruneReport {
            pruned: vec!["b".into()],
            failed: vec!["a".into()],
        };
        assert_eq!(report.status(), OutcomeStatus::PartialFailure);
        assert_eq!(report.attempted(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn info_json_shape() {
        let info = NetworkInfo {
            name: "net-a".into(),
            id: "0123456789abcdef".into(),
            driver: "bridge".into(),
            subnets: vec!["10.0.0.0/24".into()],
            containers: vec![ContainerInfo {
                name: "web".into(),
                ipv4: Some("10.0.0.2/24".into()),
            }],
        };
        assert_eq!(info.short_id(), "0123456789ab");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["Name"], "net-a");
        assert_eq!(value["Subnets"], json!(["10.0.0.0/24"]));
        assert_eq!(value["Containers"][0]["IPv4"], "10.0.0.2/24");
    }
}
