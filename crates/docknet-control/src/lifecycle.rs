//! Network lifecycle state machine.
//!
//! Every mutating operation drives a [`StateTracker`] through these states, so
//! an operation that stops halfway always knows (and logs) where it stopped.
//!
//! # State Machine
//!
//! ```text
//!                    ┌──────────┐
//!          ┌────────▶│  Absent  │◄───────────────────┐
//!          │         └────┬─────┘                    │
//!          │              │ (create)                 │
//!          │ (failed)     ▼                          │
//!          │         ┌──────────┐   (failed)   ┌─────┴────┐
//!          └─────────│ Creating │─────────────▶│  Failed  │
//!                    └────┬─────┘              └──────────┘
//!                         │ (created)
//!                         ▼
//!     ┌──────────────────────────────────────┐
//!     │               Present                │◄──────────┐
//!     └──────────────────────────────────────┘           │
//!           │                  │                          │
//!           │ (destroy)        │ (rename / reload)        │ (migrated, or
//!           ▼                  ▼                          │  aborted early)
//!     ┌────────────┐    ┌──────────────────────┐          │
//!     │ Destroying │    │ Renaming / Reloading │──────────┘
//!     └─────┬──────┘    └──────────┬───────────┘
//!           │                      │ (old removed)
//!           ▼                      ▼
//!        Absent                 Absent ──▶ Creating ──▶ Present
//! ```
//!
//! A failed removal returns `Destroying` to `Present`. `Failed` is only
//! reached when a replacement could not be created after its predecessor
//! was already removed.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ControlError, Result};

/// Where a network stands within one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    /// No network with this name exists.
    Absent,
    /// A create call is in flight.
    Creating,
    /// The network exists.
    Present,
    /// Endpoints are being detached and the network removed.
    Destroying,
    /// The network is being replaced under a new name.
    Renaming,
    /// The network is being replaced under the same name.
    Reloading,
    /// The network was removed and its replacement could not be created.
    Failed,
}

impl NetworkState {
    /// Lowercase name, as used in logs and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Present => "present",
            Self::Destroying => "destroying",
            Self::Renaming => "renaming",
            Self::Reloading => "reloading",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NetworkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `ControlError::InvalidState` if the transition is not allowed.
pub fn validate_transition(
    network: &str,
    from: NetworkState,
    to: NetworkState,
) -> Result<NetworkState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ControlError::InvalidState {
            network: network.to_string(),
            from,
            to,
        })
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: NetworkState, to: NetworkState) -> bool {
    use NetworkState::{Absent, Creating, Destroying, Failed, Present, Reloading, Renaming};

    matches!(
        (from, to),
        (Absent | Failed, Creating)
            // a failed create leaves nothing behind, unless it replaced something
            | (Creating, Present | Absent | Failed)
            | (Present, Destroying | Renaming | Reloading)
            // a failed removal keeps the network
            | (Destroying, Absent | Present)
            // the rebuild path passes through Absent, the migrate path does not
            | (Renaming | Reloading, Absent | Present)
    )
}

/// Returns the list of valid target states from the given state.
#[must_use]
pub fn valid_transitions_from(state: NetworkState) -> Vec<NetworkState> {
    use NetworkState::{Absent, Creating, Destroying, Failed, Present, Reloading, Renaming};

    match state {
        Absent | Failed => vec![Creating],
        Creating => vec![Present, Absent, Failed],
        Present => vec![Destroying, Renaming, Reloading],
        Destroying | Renaming | Reloading => vec![Absent, Present],
    }
}

/// Returns true while an operation holds the network in a transient state.
#[must_use]
pub const fn is_transient(state: NetworkState) -> bool {
    matches!(
        state,
        NetworkState::Creating
            | NetworkState::Destroying
            | NetworkState::Renaming
            | NetworkState::Reloading
    )
}

/// Follows one network through a single operation.
#[derive(Debug, Clone)]
pub struct StateTracker {
    network: String,
    state: NetworkState,
}

impl StateTracker {
    /// Start tracking `network` in `initial`.
    #[must_use]
    pub fn new(network: impl Into<String>, initial: NetworkState) -> Self {
        Self {
            network: network.into(),
            state: initial,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> NetworkState {
        self.state
    }

    /// The tracked network name.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidState` if the transition is not allowed;
    /// the tracker keeps its current state.
    pub fn advance(&mut self, to: NetworkState) -> Result<()> {
        let from = self.state;
        self.state = validate_transition(&self.network, from, to).inspect_err(|_| {
            warn!(
                network = %self.network,
                from = %from,
                to = %to,
                allowed = ?valid_transitions_from(from),
                "Rejected state transition"
            );
        })?;
        debug!(network = %self.network, from = %from, to = %to, "State transition");
        Ok(())
    }

    /// True unless the network is held in a transient state.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !is_transient(self.state)
    }

    /// Retarget the tracker to another network name, keeping the state.
    ///
    /// Used when an operation continues on a replacement network.
    pub fn rename(&mut self, network: impl Into<String>) {
        self.network = network.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NetworkState::{Absent, Creating, Destroying, Failed, Present, Reloading, Renaming};

    const ALL: [NetworkState; 7] = [
        Absent, Creating, Present, Destroying, Renaming, Reloading, Failed,
    ];

    #[test]
    fn create_path() {
        assert!(is_valid_transition(Absent, Creating));
        assert!(is_valid_transition(Creating, Present));
        assert!(is_valid_transition(Creating, Absent));
    }

    #[test]
    fn destroy_path() {
        assert!(is_valid_transition(Present, Destroying));
        assert!(is_valid_transition(Destroying, Absent));
        assert!(is_valid_transition(Destroying, Present));
    }

    #[test]
    fn replacement_paths() {
        assert!(is_valid_transition(Present, Renaming));
        assert!(is_valid_transition(Present, Reloading));
        assert!(is_valid_transition(Renaming, Absent));
        assert!(is_valid_transition(Reloading, Absent));
        assert!(is_valid_transition(Renaming, Present));
        assert!(is_valid_transition(Creating, Failed));
        assert!(is_valid_transition(Failed, Creating));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!is_valid_transition(Absent, Present));
        assert!(!is_valid_transition(Absent, Destroying));
        assert!(!is_valid_transition(Present, Absent));
        assert!(!is_valid_transition(Present, Failed));
        assert!(!is_valid_transition(Failed, Present));
        assert!(!is_valid_transition(Destroying, Renaming));
    }

    #[test]
    fn valid_transitions_matches_predicate() {
        for from in ALL {
            let targets = valid_transitions_from(from);
            for to in ALL {
                assert_eq!(
                    targets.contains(&to),
                    is_valid_transition(from, to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn validate_transition_error() {
        let err = validate_transition("net-a", Absent, Present).unwrap_err();
        assert!(matches!(
            err,
            ControlError::InvalidState {
                from: Absent,
                to: Present,
                ..
            }
        ));
        assert!(err.to_string().contains("net-a"));
    }

    #[test]
    fn transient_states() {
        assert!(is_transient(Creating));
        assert!(is_transient(Reloading));
        assert!(!is_transient(Present));
        assert!(!is_transient(Failed));
    }

    #[test]
    fn tracker_follows_rebuild() {
        let mut tracker = StateTracker::new("net-a", Present);
        tracker.advance(Reloading).unwrap();
        tracker.advance(Absent).unwrap();
        tracker.advance(Creating).unwrap();
        assert!(!tracker.is_settled());
        tracker.advance(Failed).unwrap();
        assert_eq!(tracker.state(), Failed);
        assert!(tracker.is_settled());
    }

    #[test]
    fn tracker_rejects_and_keeps_state() {
        let mut tracker = StateTracker::new("net-a", Absent);
        assert!(tracker.advance(Destroying).is_err());
        assert_eq!(tracker.state(), Absent);

        tracker.rename("net-b");
        assert_eq!(tracker.network(), "net-b");
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Reloading).unwrap(), "\"reloading\"");
        assert_eq!(Present.to_string(), "present");
    }
}
