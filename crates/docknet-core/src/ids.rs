//! Identifier types for docknet.
//!
//! Network names and machine identities arrive as plain strings from the
//! command line and from the daemon. These wrappers validate them once so the
//! rest of the workspace can rely on their shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a network name accepted by the daemon.
pub const MAX_NETWORK_NAME_LEN: usize = 127;

/// Network name used when the caller does not set one.
pub const DEFAULT_NETWORK_NAME: &str = "network_lo1";

/// A validated daemon network name.
///
/// Names start with an ASCII letter or digit, continue with letters, digits,
/// `_`, `.` or `-`, and are at most 127 characters long.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkName(String);

impl NetworkName {
    /// Parse and validate a network name.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidNetworkName` if the name does not match
    /// `^[A-Za-z0-9][A-Za-z0-9_.-]{0,126}$`.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if is_valid_network_name(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(IdError::InvalidNetworkName(s.to_string()))
        }
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True iff `s` is an acceptable network name.
#[must_use]
pub fn is_valid_network_name(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    s.len() <= MAX_NETWORK_NAME_LEN
        && first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl Default for NetworkName {
    fn default() -> Self {
        Self(DEFAULT_NETWORK_NAME.to_string())
    }
}

impl FromStr for NetworkName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkName({})", self.0)
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NetworkName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NetworkName> for String {
    fn from(name: NetworkName) -> Self {
        name.0
    }
}

impl AsRef<str> for NetworkName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of the machine (caller) that creates and owns networks.
///
/// This is the value written into the `com.vagrant.machine_id` label and the
/// local ownership marker. It is opaque: any non-blank string without
/// whitespace is accepted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineId(String);

impl MachineId {
    /// Parse a machine identity.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidMachineId` if the value is empty or contains
    /// whitespace.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(IdError::InvalidMachineId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Return the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MachineId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineId({})", self.0)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MachineId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MachineId> for String {
    fn from(id: MachineId) -> Self {
        id.0
    }
}

/// Correlation ID for one lifecycle operation (UUID v4).
///
/// Attached to the tracing span of every orchestrator call so that the
/// daemon commands issued by one rename or destroy can be grouped in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationId(uuid::Uuid);

impl OperationId {
    /// Generate a new random `OperationId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for OperationId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for OperationId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OperationId> for String {
    fn from(id: OperationId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The network name does not match the daemon's naming rules.
    #[error("invalid network name: {0:?}")]
    InvalidNetworkName(String),

    /// The machine identity is blank or contains whitespace.
    #[error("invalid machine id: {0:?}")]
    InvalidMachineId(String),

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}
