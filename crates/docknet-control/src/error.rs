//! Error types for the lifecycle orchestrator.
//!
//! Validation and conflict errors are raised before any mutating daemon call.
//! Errors raised after a destructive step carry enough context to tell the
//! caller exactly what state the daemon was left in.

use docknet_core::{CoreError, IdError, SpecError};
use docknet_daemon::DaemonError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::lifecycle::NetworkState;
use crate::types::RenameReport;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Broad classification of a [`ControlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; nothing was touched.
    Validation,
    /// The request collides with existing daemon state; nothing was touched.
    Conflict,
    /// The named network does not exist.
    NotFound,
    /// The daemon refused or could not run a command.
    External,
    /// The operation completed only in part.
    PartialFailure,
    /// The orchestrator reached a state it should never reach.
    Internal,
}

/// Errors that can occur in lifecycle operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The desired-state spec is invalid.
    #[error("invalid network spec: {0}")]
    InvalidSpec(#[from] SpecError),

    /// A name or machine identity is malformed.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// A subnet is malformed or not aligned to its prefix.
    #[error("invalid subnet: {0:?}")]
    InvalidSubnet(String),

    /// The subnet overlaps an existing network.
    #[error("subnet {subnet} is already in use")]
    SubnetConflict {
        /// The rejected subnet.
        subnet: String,
    },

    /// A network with this name already exists.
    #[error("network already exists: {0}")]
    NetworkExists(String),

    /// The rename target name is taken by another network.
    #[error("target network already exists: {0}")]
    TargetExists(String),

    /// The named network does not exist.
    #[error("network not found: {0}")]
    NotFound(String),

    /// The daemon is not reachable.
    #[error("network daemon is unavailable")]
    DaemonUnavailable,

    /// A daemon call failed.
    #[error("failed to {operation} {target}: {source}")]
    Daemon {
        /// What was being done.
        operation: &'static str,
        /// Network or endpoint the operation targeted.
        target: String,
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },

    /// A network could not be created. Nothing was removed beforehand.
    #[error("failed to create network {name}: {source}")]
    CreateFailed {
        /// Network that was being created.
        name: String,
        /// Rendered create command.
        command: String,
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },

    /// A network could not be removed and is still in place.
    #[error("failed to remove network {name}: {source}")]
    RemoveFailed {
        /// Network that is still present.
        name: String,
        /// Endpoints that were detached before the removal was attempted.
        disconnected: Vec<String>,
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },

    /// The old network was removed but its replacement could not be created.
    #[error("network {name} was removed but could not be recreated with subnet {subnet}: {source}")]
    RecreateFailed {
        /// Name of the replacement that does not exist.
        name: String,
        /// Subnet the replacement was declared with.
        subnet: String,
        /// Rendered create command.
        command: String,
        /// Endpoints left without a network.
        endpoints: Vec<String>,
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },

    /// Endpoints were migrated but the old network could not be removed.
    #[error(
        "network {} could not be removed after migrating to {}: {source}",
        .report.old,
        .report.new
    )]
    OldNetworkRetained {
        /// Migration outcome up to the failed removal.
        report: Box<RenameReport>,
        /// Underlying daemon error.
        #[source]
        source: DaemonError,
    },

    /// An operation tried an impossible state transition.
    #[error("invalid state transition for network {network}: cannot go from {from} to {to}")]
    InvalidState {
        /// The tracked network.
        network: String,
        /// The current state.
        from: NetworkState,
        /// The requested target state.
        to: NetworkState,
    },
}

impl From<CoreError> for ControlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidId(e) => Self::InvalidId(e),
            CoreError::Spec(e) => Self::InvalidSpec(e),
            CoreError::InvalidCidr(e) => Self::InvalidSubnet(e.to_string()),
        }
    }
}

impl ControlError {
    /// Wrap a daemon error raised while performing `operation` on `target`.
    ///
    /// An unreachable daemon maps to [`ControlError::DaemonUnavailable`].
    pub(crate) fn daemon(
        operation: &'static str,
        target: impl Into<String>,
        source: DaemonError,
    ) -> Self {
        if matches!(source, DaemonError::Unavailable) {
            Self::DaemonUnavailable
        } else {
            Self::Daemon {
                operation,
                target: target.into(),
                source,
            }
        }
    }

    /// Broad classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSpec(_) | Self::InvalidId(_) | Self::InvalidSubnet(_) => {
                ErrorKind::Validation
            }
            Self::SubnetConflict { .. } | Self::NetworkExists(_) | Self::TargetExists(_) => {
                ErrorKind::Conflict
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DaemonUnavailable
            | Self::Daemon { .. }
            | Self::CreateFailed { .. }
            | Self::RemoveFailed { .. }
            | Self::RecreateFailed { .. } => ErrorKind::External,
            Self::OldNetworkRetained { .. } => ErrorKind::PartialFailure,
            Self::InvalidState { .. } => ErrorKind::Internal,
        }
    }

    /// Process exit code for this error.
    ///
    /// An unreachable daemon exits with 2, everything else with 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::DaemonUnavailable => 2,
            _ => 1,
        }
    }

    /// True if nothing was changed on the daemon before this error was raised.
    #[must_use]
    pub const fn is_before_mutation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::NotFound
        ) || matches!(self, Self::DaemonUnavailable | Self::CreateFailed { .. })
    }

    /// Structured context for the caller-facing result, if any.
    #[must_use]
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::SubnetConflict { subnet } => Some(json!({ "subnet": subnet })),
            Self::NetworkExists(name) | Self::TargetExists(name) | Self::NotFound(name) => {
                Some(json!({ "name": name }))
            }
            Self::CreateFailed { name, command, .. } => {
                Some(json!({ "name": name, "command": command }))
            }
            Self::RemoveFailed {
                name, disconnected, ..
            } => Some(json!({ "name": name, "disconnected": disconnected })),
            Self::RecreateFailed {
                name,
                subnet,
                command,
                endpoints,
                ..
            } => Some(json!({
                "name": name,
                "subnet": subnet,
                "command": command,
                "state": NetworkState::Failed,
                "endpoints": endpoints,
            })),
            Self::OldNetworkRetained { report, .. } => serde_json::to_value(report).ok(),
            Self::Daemon { source, .. } => source.command().map(|c| json!({ "command": c })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_failed() -> DaemonError {
        DaemonError::CommandFailed {
            command: "'docker' 'network' 'create' 'net-a'".to_string(),
            code: Some(1),
            stderr: "boom".to_string(),
        }
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            ControlError::InvalidSubnet("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ControlError::SubnetConflict {
                subnet: "10.0.0.0/24".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ControlError::TargetExists("b".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(ControlError::NotFound("a".into()).kind(), ErrorKind::NotFound);
        assert_eq!(ControlError::DaemonUnavailable.kind(), ErrorKind::External);
        assert_eq!(
            ControlError::OldNetworkRetained {
                report: Box::default(),
                source: command_failed(),
            }
            .kind(),
            ErrorKind::PartialFailure
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ControlError::DaemonUnavailable.exit_code(), 2);
        assert_eq!(ControlError::NotFound("a".into()).exit_code(), 1);
        assert_eq!(
            ControlError::daemon("remove", "net-a", command_failed()).exit_code(),
            1
        );
    }

    #[test]
    fn unavailable_daemon_error_collapses() {
        let err = ControlError::daemon("list", "networks", DaemonError::Unavailable);
        assert!(matches!(err, ControlError::DaemonUnavailable));
    }

    #[test]
    fn before_mutation_classification() {
        assert!(ControlError::InvalidSubnet("x".into()).is_before_mutation());
        assert!(ControlError::CreateFailed {
            name: "a".into(),
            command: "c".into(),
            source: command_failed(),
        }
        .is_before_mutation());
        assert!(!ControlError::RecreateFailed {
            name: "a".into(),
            subnet: "10.0.0.0/24".into(),
            command: "c".into(),
            endpoints: vec![],
            source: command_failed(),
        }
        .is_before_mutation());
    }

    #[test]
    fn recreate_failure_data_names_command_and_state() {
        let err = ControlError::RecreateFailed {
            name: "net-a".into(),
            subnet: "10.0.0.0/24".into(),
            command: "'docker' 'network' 'create' 'net-a'".into(),
            endpoints: vec!["web".into()],
            source: command_failed(),
        };
        let data = err.data().unwrap();
        assert_eq!(data["state"], "failed");
        assert_eq!(data["endpoints"][0], "web");
        assert!(data["command"].as_str().unwrap().contains("create"));
    }

    #[test]
    fn core_errors_map_to_validation() {
        let err: ControlError = docknet_core::NetworkName::parse("-bad")
            .map_err(CoreError::from)
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
