//! Endpoint moves between networks.
//!
//! All loops run sequentially in input order. Nothing here returns early: a
//! failing endpoint is recorded and the loop moves on, so the caller always
//! gets a complete account of which endpoints ended up where.

use docknet_daemon::NetworkDaemon;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// An endpoint operation that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFailure {
    /// Endpoint name.
    pub endpoint: String,
    /// Daemon error message.
    pub error: String,
}

/// Where each endpoint ended up after a rename or reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMigration {
    /// Endpoints attached to the new network.
    pub reconnected: Vec<String>,
    /// Endpoints that could not be attached to the new network.
    pub failed_reconnect: Vec<String>,
}

impl EndpointMigration {
    /// True if at least one endpoint failed to reattach.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_reconnect.is_empty()
    }

    fn record(&mut self, endpoint: &str, reattached: bool) {
        if reattached {
            self.reconnected.push(endpoint.to_string());
        } else {
            self.failed_reconnect.push(endpoint.to_string());
        }
    }
}

/// Force-disconnect every endpoint from `network`.
pub async fn disconnect_all<D>(
    daemon: &D,
    network: &str,
    endpoints: &[String],
) -> Vec<EndpointFailure>
where
    D: NetworkDaemon + ?Sized,
{
    let mut failures = Vec::new();
    for endpoint in endpoints {
        match daemon.disconnect(network, endpoint, true).await {
            Ok(()) => debug!(network = %network, endpoint = %endpoint, "Disconnected endpoint"),
            Err(e) => {
                warn!(network = %network, endpoint = %endpoint, error = %e, "Failed to disconnect endpoint");
                failures.push(EndpointFailure {
                    endpoint: endpoint.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    failures
}

/// Remove every container in `endpoints`. Returns the removed names and the
/// failures.
pub async fn remove_containers<D>(
    daemon: &D,
    endpoints: &[String],
) -> (Vec<String>, Vec<EndpointFailure>)
where
    D: NetworkDaemon + ?Sized,
{
    let mut removed = Vec::new();
    let mut failures = Vec::new();
    for endpoint in endpoints {
        match daemon.remove_container(endpoint).await {
            Ok(()) => {
                info!(container = %endpoint, "Removed container");
                removed.push(endpoint.clone());
            }
            Err(e) => {
                warn!(container = %endpoint, error = %e, "Failed to remove container");
                failures.push(EndpointFailure {
                    endpoint: endpoint.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    (removed, failures)
}

/// Connect every endpoint to `network`.
pub async fn reconnect_all<D>(daemon: &D, network: &str, endpoints: &[String]) -> EndpointMigration
where
    D: NetworkDaemon + ?Sized,
{
    let mut migration = EndpointMigration::default();
    for endpoint in endpoints {
        let reattached = match daemon.connect(network, endpoint).await {
            Ok(()) => true,
            Err(e) => {
                warn!(network = %network, endpoint = %endpoint, error = %e, "Failed to reconnect endpoint");
                false
            }
        };
        migration.record(endpoint, reattached);
    }
    migration
}

/// Move every endpoint from `from` to `to`.
///
/// Each endpoint is connected to `to` first and only then detached from
/// `from`. An endpoint that cannot join `to` stays attached to `from`.
pub async fn migrate_endpoints<D>(
    daemon: &D,
    from: &str,
    to: &str,
    endpoints: &[String],
) -> EndpointMigration
where
    D: NetworkDaemon + ?Sized,
{
    let mut migration = EndpointMigration::default();
    for endpoint in endpoints {
        let reattached = match daemon.connect(to, endpoint).await {
            Ok(()) => true,
            Err(e) => {
                warn!(network = %to, endpoint = %endpoint, error = %e, "Failed to connect endpoint to new network");
                false
            }
        };
        if reattached {
            if let Err(e) = daemon.disconnect(from, endpoint, true).await {
                warn!(network = %from, endpoint = %endpoint, error = %e, "Failed to disconnect endpoint from old network");
            }
        }
        migration.record(endpoint, reattached);
    }
    migration
}

#[cfg(test)]
mod tests {
    use super::*;
    use docknet_daemon::{DaemonCall, MockDaemon};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn disconnect_all_collects_failures_and_continues() {
        let daemon = MockDaemon::new();
        daemon.add_network("net-a", Some("10.0.0.0/24"), &[]);
        daemon.attach("net-a", "web");
        daemon.attach("net-a", "db");
        daemon.fail_disconnect("net-a", "web");

        let failures = disconnect_all(&daemon, "net-a", &names(&["web", "db"])).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].endpoint, "web");
        assert_eq!(daemon.endpoints_of("net-a"), vec!["web".to_string()]);
    }

    #[tokio::test]
    async fn reconnect_preserves_order_and_splits_results() {
        let daemon = MockDaemon::new();
        daemon.add_network("net-a", Some("10.0.0.0/24"), &[]);
        daemon.add_network("scratch", None, &[]);
        for ep in ["c", "a", "b"] {
            daemon.attach("scratch", ep);
        }
        daemon.fail_connect("net-a", "a");

        let migration = reconnect_all(&daemon, "net-a", &names(&["c", "a", "b"])).await;
        assert_eq!(migration.reconnected, names(&["c", "b"]));
        assert_eq!(migration.failed_reconnect, names(&["a"]));
        assert!(migration.is_partial());
    }

    #[tokio::test]
    async fn migrate_connects_before_disconnecting() {
        let daemon = MockDaemon::new();
        daemon.add_network("old", Some("10.0.0.0/24"), &[]);
        daemon.add_network("new", Some("10.0.1.0/24"), &[]);
        daemon.attach("old", "web");
        daemon.clear_calls();

        let migration = migrate_endpoints(&daemon, "old", "new", &names(&["web"])).await;
        assert!(!migration.is_partial());
        assert_eq!(
            daemon.mutations(),
            vec![
                DaemonCall::Connect {
                    network: "new".into(),
                    endpoint: "web".into()
                },
                DaemonCall::Disconnect {
                    network: "old".into(),
                    endpoint: "web".into(),
                    force: true
                },
            ]
        );
        assert!(daemon.endpoints_of("old").is_empty());
        assert_eq!(daemon.endpoints_of("new"), names(&["web"]));
    }

    #[tokio::test]
    async fn migrate_failure_stays_on_old_network() {
        let daemon = MockDaemon::new();
        daemon.add_network("old", Some("10.0.0.0/24"), &[]);
        daemon.add_network("new", Some("10.0.1.0/24"), &[]);
        daemon.attach("old", "web");
        daemon.attach("old", "db");
        daemon.fail_connect("new", "db");

        let migration = migrate_endpoints(&daemon, "old", "new", &names(&["db", "web"])).await;
        assert_eq!(migration.reconnected, names(&["web"]));
        assert_eq!(migration.failed_reconnect, names(&["db"]));
        assert_eq!(daemon.endpoints_of("old"), names(&["db"]));
        assert_eq!(daemon.endpoints_of("new"), names(&["web"]));
    }

    #[tokio::test]
    async fn remove_containers_reports_each() {
        let daemon = MockDaemon::new();
        daemon.add_network("net-a", None, &[]);
        daemon.attach("net-a", "web");

        let (removed, failures) = remove_containers(&daemon, &names(&["web", "ghost"])).await;
        assert_eq!(removed, names(&["web"]));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].endpoint, "ghost");
        assert!(!daemon.has_container("web"));
    }
}
