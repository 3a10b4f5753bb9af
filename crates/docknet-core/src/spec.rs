//! Desired-state descriptor for a managed network.
//!
//! A [`NetworkSpec`] is what the caller asks for. It is validated in full
//! before any daemon call is made; [`NetworkSpec::validation_errors`] reports
//! every problem at once so a misconfigured machine can be fixed in one pass.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cidr::{self, Cidr};
use crate::ids::NetworkName;

pub use crate::ids::DEFAULT_NETWORK_NAME;

/// Default subnet used when the caller does not set one.
pub const DEFAULT_SUBNET: &str = "172.28.100.0/26";

/// Default gateway matching [`DEFAULT_SUBNET`].
pub const DEFAULT_GATEWAY: &str = "172.28.100.1";

/// Network driver supported by docknet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Single-host bridge network.
    #[default]
    Bridge,
    /// Macvlan network bound to a host parent interface.
    Macvlan,
}

impl Driver {
    /// The driver name as the daemon spells it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Macvlan => "macvlan",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(Self::Bridge),
            "macvlan" => Ok(Self::Macvlan),
            other => Err(SpecError::UnknownDriver(other.to_string())),
        }
    }
}

/// A violated [`NetworkSpec`] invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// No subnet was given.
    #[error("subnet is required")]
    MissingSubnet,

    /// The subnet is not a valid, aligned IPv4 CIDR.
    #[error("invalid subnet {0:?}: expected an aligned IPv4 CIDR such as 172.28.100.0/26")]
    InvalidSubnet(String),

    /// The gateway is not a usable host address of the subnet.
    #[error("invalid gateway {gateway:?} for subnet {subnet}")]
    InvalidGateway {
        /// The rejected gateway.
        gateway: String,
        /// The subnet it was checked against.
        subnet: String,
    },

    /// The IP range is malformed or not contained in the subnet.
    #[error("invalid ip range {ip_range:?} for subnet {subnet}")]
    InvalidIpRange {
        /// The rejected range.
        ip_range: String,
        /// The subnet it was checked against.
        subnet: String,
    },

    /// A macvlan network was requested without a parent interface.
    #[error("macvlan networks require a parent interface")]
    MissingParent,

    /// The driver name is not supported.
    #[error("unsupported driver {0:?}: expected bridge or macvlan")]
    UnknownDriver(String),
}

/// Desired state of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Network name.
    pub name: NetworkName,
    /// Driver type.
    pub driver: Driver,
    /// Subnet in CIDR form. Optional in input, required to create.
    pub subnet: Option<String>,
    /// Gateway address inside the subnet.
    pub gateway: Option<String>,
    /// Allocation sub-range of the subnet.
    pub ip_range: Option<String>,
    /// Whether standalone containers may attach.
    pub attachable: bool,
    /// Whether IPv6 is enabled.
    pub ipv6: bool,
    /// Host interface for macvlan networks.
    pub parent: Option<String>,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            name: NetworkName::default(),
            driver: Driver::Bridge,
            subnet: Some(DEFAULT_SUBNET.to_string()),
            gateway: Some(DEFAULT_GATEWAY.to_string()),
            ip_range: None,
            attachable: false,
            ipv6: false,
            parent: None,
        }
    }
}

impl NetworkSpec {
    /// A spec with only a name and subnet, as the operator `init` command
    /// creates: bridge driver, no gateway, no range.
    #[must_use]
    pub fn new(name: NetworkName, subnet: impl Into<String>) -> Self {
        Self {
            name,
            driver: Driver::Bridge,
            subnet: Some(subnet.into()),
            gateway: None,
            ip_range: None,
            attachable: false,
            ipv6: false,
            parent: None,
        }
    }

    /// Set the network name.
    #[must_use]
    pub fn with_name(mut self, name: NetworkName) -> Self {
        self.name = name;
        self
    }

    /// Set the driver.
    #[must_use]
    pub const fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    /// Set or clear the subnet.
    #[must_use]
    pub fn with_subnet(mut self, subnet: Option<String>) -> Self {
        self.subnet = subnet;
        self
    }

    /// Set or clear the gateway.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Option<String>) -> Self {
        self.gateway = gateway;
        self
    }

    /// Set or clear the IP range.
    #[must_use]
    pub fn with_ip_range(mut self, ip_range: Option<String>) -> Self {
        self.ip_range = ip_range;
        self
    }

    /// Set or clear the macvlan parent interface.
    #[must_use]
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    /// Set the attachable flag.
    #[must_use]
    pub const fn attachable(mut self, attachable: bool) -> Self {
        self.attachable = attachable;
        self
    }

    /// Set the IPv6 flag.
    #[must_use]
    pub const fn ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    /// The parsed subnet, if it is present and aligned.
    #[must_use]
    pub fn subnet_cidr(&self) -> Option<Cidr> {
        self.subnet
            .as_deref()
            .and_then(cidr::parse)
            .filter(Cidr::is_aligned)
    }

    /// Validate, returning the first violated invariant.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpecError`] found, in field order.
    pub fn validate(&self) -> Result<(), SpecError> {
        match self.validation_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect every violated invariant.
    ///
    /// Gateway and range containment are only checked against a valid
    /// subnet, so a bad subnet produces one error rather than three.
    #[must_use]
    pub fn validation_errors(&self) -> Vec<SpecError> {
        let mut errors = Vec::new();

        let subnet = match self.subnet.as_deref().filter(|s| !s.is_empty()) {
            None => {
                errors.push(SpecError::MissingSubnet);
                None
            }
            Some(raw) => {
                let parsed = cidr::parse(raw).filter(Cidr::is_aligned);
                if parsed.is_none() {
                    errors.push(SpecError::InvalidSubnet(raw.to_string()));
                }
                parsed
            }
        };

        if let Some(gateway) = present(self.gateway.as_deref()) {
            let ok = match (gateway.parse::<Ipv4Addr>(), subnet) {
                (Err(_), _) => false,
                (Ok(ip), Some(net)) => net.is_host_address(ip),
                (Ok(_), None) => true,
            };
            if !ok {
                errors.push(SpecError::InvalidGateway {
                    gateway: gateway.to_string(),
                    subnet: self.subnet.clone().unwrap_or_default(),
                });
            }
        }

        if let Some(range) = present(self.ip_range.as_deref()) {
            let ok = match (cidr::parse(range), subnet) {
                (None, _) => false,
                (Some(inner), Some(net)) => net.contains(&inner),
                (Some(_), None) => true,
            };
            if !ok {
                errors.push(SpecError::InvalidIpRange {
                    ip_range: range.to_string(),
                    subnet: self.subnet.clone().unwrap_or_default(),
                });
            }
        }

        if self.driver == Driver::Macvlan && present(self.parent.as_deref()).is_none() {
            errors.push(SpecError::MissingParent);
        }

        errors
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
