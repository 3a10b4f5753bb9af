//! Types for the daemon crate.

use std::collections::HashMap;

use docknet_core::{cidr, NetworkName, NetworkSpec};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the daemon binary.
pub const DOCKER_BIN_ENV: &str = "DOCKNET_DOCKER_BIN";

/// Environment variable overriding the inspection batch size.
pub const BATCH_SIZE_ENV: &str = "DOCKNET_BATCH_SIZE";

/// Largest number of networks inspected by a single daemon call.
pub const MAX_BATCH_SIZE: usize = 50;

/// One row of the daemon's network list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRow {
    /// Network ID (short form as listed).
    pub id: String,
    /// Network name.
    pub name: String,
    /// Driver name.
    pub driver: String,
    /// Scope (`local`, `swarm`, ...).
    pub scope: String,
}

impl NetworkRow {
    /// List format producing one tab-separated row per network.
    pub const FORMAT: &'static str = "{{.ID}}\t{{.Name}}\t{{.Driver}}\t{{.Scope}}";

    /// Parse one line produced with [`NetworkRow::FORMAT`].
    ///
    /// Blank lines yield `None`; missing trailing columns are left empty.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let mut cols = line.splitn(4, '\t').map(str::trim);
        let mut next = || cols.next().unwrap_or_default().to_string();
        Some(Self {
            id: next(),
            name: next(),
            driver: next(),
            scope: next(),
        })
    }
}

/// One IPAM configuration block of a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamConfig {
    /// Subnet in CIDR form.
    pub subnet: Option<String>,
    /// Gateway address.
    pub gateway: Option<String>,
    /// Allocation range in CIDR form.
    pub ip_range: Option<String>,
}

impl IpamConfig {
    /// An IPAM block declaring only a subnet.
    #[must_use]
    pub fn subnet(subnet: impl Into<String>) -> Self {
        Self {
            subnet: Some(subnet.into()),
            ..Self::default()
        }
    }
}

/// A container attached to a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedEndpoint {
    /// Container name.
    pub name: String,
    /// IPv4 address with prefix as the daemon reports it, if any.
    pub ipv4: Option<String>,
}

/// Snapshot of a network as read back from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedNetwork {
    /// Full network ID.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Driver name.
    pub driver: String,
    /// IPAM configuration blocks in daemon order.
    pub ipam: Vec<IpamConfig>,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Attached endpoints, ordered by name.
    pub endpoints: Vec<AttachedEndpoint>,
    /// IPv6 flag.
    pub ipv6: bool,
    /// Attachable flag.
    pub attachable: bool,
    /// Driver options.
    pub options: HashMap<String, String>,
}

impl ObservedNetwork {
    /// Subnets declared by the IPAM blocks, as written by the daemon.
    #[must_use]
    pub fn subnets(&self) -> Vec<String> {
        self.ipam.iter().filter_map(|c| c.subnet.clone()).collect()
    }

    /// Subnets in canonical form; unparseable entries are dropped.
    #[must_use]
    pub fn normalized_subnets(&self) -> Vec<String> {
        self.ipam
            .iter()
            .filter_map(|c| c.subnet.as_deref().and_then(cidr::normalize))
            .collect()
    }

    /// Names of attached endpoints in name order.
    #[must_use]
    pub fn endpoint_names(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name.clone()).collect()
    }

    /// The macvlan parent interface, if set.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.options.get("parent").map(String::as_str)
    }

    /// Short (12 character) form of the network ID.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}

/// Everything needed to issue one `network create` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateNetwork {
    /// Name of the network to create.
    pub name: NetworkName,
    /// Driver name.
    pub driver: String,
    /// Labels, emitted in order.
    pub labels: Vec<(String, String)>,
    /// IPAM blocks, emitted in order.
    pub ipam: Vec<IpamConfig>,
    /// IPv6 flag.
    pub ipv6: bool,
    /// Attachable flag.
    pub attachable: bool,
    /// Macvlan parent interface. Ignored for other drivers.
    pub parent: Option<String>,
}

impl CreateNetwork {
    /// Build a create request from a desired-state spec and its labels.
    #[must_use]
    pub fn from_spec(spec: &NetworkSpec, labels: Vec<(String, String)>) -> Self {
        Self {
            name: spec.name.clone(),
            driver: spec.driver.as_str().to_string(),
            labels,
            ipam: vec![IpamConfig {
                subnet: spec.subnet.clone(),
                gateway: spec.gateway.clone(),
                ip_range: spec.ip_range.clone(),
            }],
            ipv6: spec.ipv6,
            attachable: spec.attachable,
            parent: spec.parent.clone(),
        }
    }

    /// Build a replacement for an observed network under a new name.
    ///
    /// Driver, flags, parent and labels are carried over. When `ipam` is
    /// `None` the observed IPAM blocks are reused unchanged.
    #[must_use]
    pub fn replacing(
        observed: &ObservedNetwork,
        name: NetworkName,
        ipam: Option<Vec<IpamConfig>>,
    ) -> Self {
        let mut labels: Vec<(String, String)> = observed
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.sort();
        if !labels
            .iter()
            .any(|(k, _)| k == docknet_core::labels::PLUGIN_LABEL)
        {
            labels.insert(
                0,
                (
                    docknet_core::labels::PLUGIN_LABEL.to_string(),
                    docknet_core::labels::PLUGIN_LABEL_VALUE.to_string(),
                ),
            );
        }

        Self {
            name,
            driver: if observed.driver.is_empty() {
                "bridge".to_string()
            } else {
                observed.driver.clone()
            },
            labels,
            ipam: ipam.unwrap_or_else(|| observed.ipam.clone()),
            ipv6: observed.ipv6,
            attachable: observed.attachable,
            parent: observed.parent().map(str::to_string),
        }
    }

    /// The subnets this request declares.
    #[must_use]
    pub fn subnets(&self) -> Vec<String> {
        self.ipam.iter().filter_map(|c| c.subnet.clone()).collect()
    }

    /// Argument vector for the daemon, without the program name.
    ///
    /// Order: labels, driver, IPAM flags, `--ipv6`, `--attachable`, the
    /// macvlan parent option, then the network name last.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["network".to_string(), "create".to_string()];
        for (key, value) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{key}={value}"));
        }
        if !self.driver.is_empty() {
            args.push("--driver".to_string());
            args.push(self.driver.clone());
        }
        for block in &self.ipam {
            push_opt(&mut args, "--subnet", block.subnet.as_deref());
            push_opt(&mut args, "--gateway", block.gateway.as_deref());
            push_opt(&mut args, "--ip-range", block.ip_range.as_deref());
        }
        if self.ipv6 {
            args.push("--ipv6".to_string());
        }
        if self.attachable {
            args.push("--attachable".to_string());
        }
        if self.driver == "macvlan" {
            if let Some(parent) = self.parent.as_deref().filter(|p| !p.is_empty()) {
                args.push("--opt".to_string());
                args.push(format!("parent={parent}"));
            }
        }
        args.push(self.name.to_string());
        args
    }
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

/// Configuration for the daemon client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Program used to reach the daemon.
    pub docker_bin: String,
    /// Networks inspected per daemon call, `1..=50`.
    pub batch_size: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `DOCKNET_DOCKER_BIN`: daemon CLI program (default `docker`)
    /// - `DOCKNET_BATCH_SIZE`: networks per inspect call, clamped to `1..=50`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, such as a map in tests.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup(DOCKER_BIN_ENV) {
            if !val.is_empty() {
                config.docker_bin = val;
            }
        }
        let batch_size = lookup(BATCH_SIZE_ENV)
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(config.batch_size);

        config.with_batch_size(batch_size)
    }

    /// Set the batch size, clamped to `1..=50`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }
}

// =============================================================================
// Raw daemon JSON
// =============================================================================

/// A network as printed by `network inspect`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawNetwork {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default, rename = "EnableIPv6")]
    enable_ipv6: bool,
    #[serde(default)]
    attachable: bool,
    #[serde(default, rename = "IPAM")]
    ipam: Option<RawIpam>,
    #[serde(default)]
    containers: Option<HashMap<String, RawEndpoint>>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
    #[serde(default)]
    options: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawIpam {
    #[serde(default)]
    config: Option<Vec<RawIpamConfig>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawIpamConfig {
    #[serde(default)]
    subnet: Option<String>,
    #[serde(default)]
    gateway: Option<String>,
    #[serde(default, rename = "IPRange")]
    ip_range: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEndpoint {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "IPv4Address")]
    ipv4_address: Option<String>,
}

impl From<RawNetwork> for ObservedNetwork {
    fn from(raw: RawNetwork) -> Self {
        let ipam = raw
            .ipam
            .and_then(|i| i.config)
            .unwrap_or_default()
            .into_iter()
            .map(|c| IpamConfig {
                subnet: c.subnet.filter(|s| !s.is_empty()),
                gateway: c.gateway.filter(|s| !s.is_empty()),
                ip_range: c.ip_range.filter(|s| !s.is_empty()),
            })
            .collect();

        let mut endpoints: Vec<AttachedEndpoint> = raw
            .containers
            .unwrap_or_default()
            .into_values()
            .filter(|e| !e.name.is_empty())
            .map(|e| AttachedEndpoint {
                name: e.name,
                ipv4: e.ipv4_address.filter(|s| !s.is_empty()),
            })
            .collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            id: raw.id,
            name: raw.name,
            driver: raw.driver,
            ipam,
            labels: raw.labels.unwrap_or_default(),
            endpoints,
            ipv6: raw.enable_ipv6,
            attachable: raw.attachable,
            options: raw.options.unwrap_or_default(),
        }
    }
}

/// Parse the JSON array printed by `network inspect`.
///
/// # Errors
///
/// Returns an error if the output is not a JSON array of networks.
pub fn parse_inspect_output(stdout: &str) -> serde_json::Result<Vec<ObservedNetwork>> {
    let raw: Vec<RawNetwork> = serde_json::from_str(stdout.trim())?;
    Ok(raw.into_iter().map(ObservedNetwork::from).collect())
}
