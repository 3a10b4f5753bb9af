//! Ownership labels stored on the daemon side of every managed network.

use std::collections::HashMap;

use crate::ids::MachineId;

/// Label key identifying networks managed by docknet.
pub const PLUGIN_LABEL: &str = "com.vagrant.plugin";

/// Value of [`PLUGIN_LABEL`] on managed networks.
pub const PLUGIN_LABEL_VALUE: &str = "docker_networks_manager";

/// Label key carrying the identity of the machine that created the network.
pub const MACHINE_LABEL: &str = "com.vagrant.machine_id";

/// Plugin identity written into local ownership markers.
pub const MARKER_PLUGIN: &str = "vagrant-docker-networks-manager";

/// Daemon list filter selecting managed networks.
#[must_use]
pub fn plugin_filter() -> String {
    format!("label={PLUGIN_LABEL}={PLUGIN_LABEL_VALUE}")
}

/// Labels to attach at creation time.
///
/// The plugin label always comes first; the machine label follows only when
/// the network belongs to a machine (operator-created networks have none).
#[must_use]
pub fn ownership_labels(machine: Option<&MachineId>) -> Vec<(String, String)> {
    let mut labels = vec![(PLUGIN_LABEL.to_string(), PLUGIN_LABEL_VALUE.to_string())];
    if let Some(machine) = machine {
        labels.push((MACHINE_LABEL.to_string(), machine.to_string()));
    }
    labels
}

/// True if the labels mark the network as managed by docknet.
#[must_use]
pub fn is_plugin_managed(labels: &HashMap<String, String>) -> bool {
    labels.get(PLUGIN_LABEL).map(String::as_str) == Some(PLUGIN_LABEL_VALUE)
}

/// The machine recorded in the labels, if any.
#[must_use]
pub fn machine_of(labels: &HashMap<String, String>) -> Option<&str> {
    labels.get(MACHINE_LABEL).map(String::as_str)
}

/// True if the labels carry the plugin label and name `machine` as owner.
#[must_use]
pub fn is_owned_by(labels: &HashMap<String, String>, machine: &MachineId) -> bool {
    is_plugin_managed(labels) && machine_of(labels) == Some(machine.as_str())
}
