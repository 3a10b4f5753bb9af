//! Records persisted by the store.
//!
//! The on-disk shape is a pretty-printed JSON object:
//!
//! ```json
//! {
//!   "name": "network_lo1",
//!   "machine_id": "3f2a9c1e",
//!   "plugin": "vagrant-docker-networks-manager",
//!   "version": "0.1.0",
//!   "created_at": "2024-05-01T12:00:00Z",
//!   "config": { "type": "bridge", "subnet": "172.28.100.0/26", ... }
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use docknet_core::labels::MARKER_PLUGIN;
use docknet_core::{Driver, MachineId, NetworkName, NetworkSpec};
use serde::{Deserialize, Serialize};

/// Local proof that this machine created (or adopted) a network.
///
/// Written on create and adopt, deleted after a successful removal, never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipMarker {
    /// Network name the marker belongs to.
    pub name: NetworkName,
    /// Machine that created the network.
    pub machine_id: MachineId,
    /// Plugin identity.
    pub plugin: String,
    /// Version of docknet that wrote the marker.
    pub version: String,
    /// Creation time, UTC, RFC 3339 with second precision.
    #[serde(with = "rfc3339_seconds")]
    pub created_at: DateTime<Utc>,
    /// Effective configuration at creation time.
    pub config: MarkerConfig,
}

impl OwnershipMarker {
    /// Build a marker for `spec` created by `machine_id` now.
    #[must_use]
    pub fn new(machine_id: MachineId, spec: &NetworkSpec) -> Self {
        Self {
            name: spec.name.clone(),
            machine_id,
            plugin: MARKER_PLUGIN.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            config: MarkerConfig::from(spec),
        }
    }

    /// True if this marker names `name` and was written by `machine`.
    #[must_use]
    pub fn matches(&self, name: &NetworkName, machine: &MachineId) -> bool {
        &self.name == name && &self.machine_id == machine
    }
}

/// Snapshot of the network configuration stored in a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Driver type.
    #[serde(rename = "type")]
    pub driver: Driver,
    /// Subnet.
    pub subnet: Option<String>,
    /// Gateway.
    pub gateway: Option<String>,
    /// IP range.
    pub ip_range: Option<String>,
    /// IPv6 flag.
    pub ipv6: bool,
    /// Attachable flag.
    pub attachable: bool,
    /// Macvlan parent.
    pub parent: Option<String>,
}

impl From<&NetworkSpec> for MarkerConfig {
    fn from(spec: &NetworkSpec) -> Self {
        Self {
            driver: spec.driver,
            subnet: spec.subnet.clone(),
            gateway: spec.gateway.clone(),
            ip_range: spec.ip_range.clone(),
            ipv6: spec.ipv6,
            attachable: spec.attachable,
            parent: spec.parent.clone(),
        }
    }
}

mod rfc3339_seconds {
    use super::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_json_shape() {
        let spec = NetworkSpec::default();
        let mut marker = OwnershipMarker::new(MachineId::parse("m-1").unwrap(), &spec);
        marker.created_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let value = serde_json::to_value(&marker).unwrap();
        assert_eq!(value["name"], "network_lo1");
        assert_eq!(value["machine_id"], "m-1");
        assert_eq!(value["plugin"], "vagrant-docker-networks-manager");
        assert_eq!(value["created_at"], "2024-05-01T12:00:00Z");
        assert_eq!(value["config"]["type"], "bridge");
        assert_eq!(value["config"]["subnet"], "172.28.100.0/26");
        assert_eq!(value["config"]["gateway"], "172.28.100.1");
        assert!(value["config"]["ip_range"].is_null());
        assert_eq!(value["config"]["ipv6"], false);
        assert!(value["config"]["parent"].is_null());
    }

    #[test]
    fn marker_matches_name_and_machine() {
        let spec = NetworkSpec::default();
        let m1 = MachineId::parse("m-1").unwrap();
        let marker = OwnershipMarker::new(m1.clone(), &spec);
        assert!(marker.matches(&spec.name, &m1));
        assert!(!marker.matches(&spec.name, &MachineId::parse("m-2").unwrap()));
        assert!(!marker.matches(&NetworkName::parse("other").unwrap(), &m1));
    }
}
