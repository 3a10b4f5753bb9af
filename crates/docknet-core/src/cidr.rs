//! IPv4 CIDR arithmetic.
//!
//! Everything in this module is pure: no I/O, no allocation beyond rendering.
//! The string-level helpers ([`is_aligned`], [`normalize`], [`overlap`],
//! [`contains`], [`is_host_address`]) are total functions. Malformed input
//! (missing `/prefix`, a non-numeric prefix, a prefix outside `0..=32`, or an
//! address that is not dotted-decimal IPv4) yields `false` or `None`, never
//! an error.
//!
//! # Example
//!
//! ```
//! use docknet_core::cidr::{self, Cidr};
//!
//! let subnet: Cidr = "192.168.10.0/24".parse().unwrap();
//! assert!(subnet.is_aligned());
//! assert!(cidr::contains("10.0.0.0/16", "10.0.1.0/24"));
//! assert!(!cidr::is_host_address("192.168.10.0/24", "192.168.10.255"));
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest prefix length accepted for an IPv4 network.
pub const MAX_PREFIX: u8 = 32;

/// Errors produced when parsing a CIDR string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    /// The input has no `/prefix` segment.
    #[error("missing prefix length in {0:?}")]
    MissingPrefix(String),

    /// The prefix is empty, non-numeric or outside `0..=32`.
    #[error("invalid prefix length in {0:?}")]
    InvalidPrefix(String),

    /// The address part is not dotted-decimal IPv4.
    #[error("invalid IPv4 address in {0:?}")]
    InvalidAddress(String),
}

/// An IPv4 address paired with a prefix length.
///
/// The address is kept exactly as written, so `10.0.0.1/24` and
/// `10.0.0.0/24` are distinct values. Use [`Cidr::normalized`] to compare
/// address spaces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr(Ipv4Net);

impl Cidr {
    /// Create a CIDR from an address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns `CidrError::InvalidPrefix` if `prefix` exceeds 32.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, CidrError> {
        Ipv4Net::new(addr, prefix)
            .map(Self)
            .map_err(|_| CidrError::InvalidPrefix(format!("{addr}/{prefix}")))
    }

    /// The address as written.
    #[must_use]
    pub fn addr(&self) -> Ipv4Addr {
        self.0.addr()
    }

    /// The prefix length.
    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.0.prefix_len()
    }

    /// The netmask as a host-order integer.
    #[must_use]
    pub fn mask(&self) -> u32 {
        u32::from(self.0.netmask())
    }

    /// The network address (host bits cleared).
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// The broadcast address (host bits set).
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        self.0.broadcast()
    }

    /// True iff the address has no host bits set.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.0.network() == self.0.addr()
    }

    /// The canonical form of this CIDR: network address plus prefix.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self(self.0.trunc())
    }

    /// True iff `ip` falls inside this network's range.
    #[must_use]
    pub fn contains_addr(&self, ip: Ipv4Addr) -> bool {
        self.0.contains(&ip)
    }

    /// True iff the two address ranges share at least one address.
    ///
    /// Prefix ranges either nest or are disjoint, so checking each network
    /// address against the other range is enough.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.0.contains(&other.0.network()) || other.0.contains(&self.0.network())
    }

    /// True iff `inner` lies entirely within this range.
    #[must_use]
    pub fn contains(&self, inner: &Self) -> bool {
        self.0.contains(&inner.0)
    }

    /// True iff `ip` is a usable host address: inside the range and neither
    /// the network nor the broadcast address.
    #[must_use]
    pub fn is_host_address(&self, ip: Ipv4Addr) -> bool {
        self.contains_addr(ip) && ip != self.network() && ip != self.broadcast()
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::MissingPrefix(s.to_string()))?;

        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| CidrError::InvalidAddress(s.to_string()))?;

        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CidrError::InvalidPrefix(s.to_string()));
        }
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| CidrError::InvalidPrefix(s.to_string()))?;

        Ipv4Net::new(addr, prefix)
            .map(Self)
            .map_err(|_| CidrError::InvalidPrefix(s.to_string()))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.addr(), self.0.prefix_len())
    }
}

impl fmt::Debug for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cidr({self})")
    }
}

impl TryFrom<String> for Cidr {
    type Error = CidrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cidr> for String {
    fn from(cidr: Cidr) -> Self {
        cidr.to_string()
    }
}

/// Parse a CIDR string, returning `None` when it is malformed.
#[must_use]
pub fn parse(s: &str) -> Option<Cidr> {
    s.parse().ok()
}

/// True iff `s` is a valid CIDR whose address is already the network address.
#[must_use]
pub fn is_aligned(s: &str) -> bool {
    parse(s).is_some_and(|c| c.is_aligned())
}

/// Render the canonical `network/prefix` form, or `None` on malformed input.
#[must_use]
pub fn normalize(s: &str) -> Option<String> {
    parse(s).map(|c| c.normalized().to_string())
}

/// True iff both inputs are valid and their ranges overlap. Symmetric.
#[must_use]
pub fn overlap(a: &str, b: &str) -> bool {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a.overlaps(&b),
        _ => false,
    }
}

/// True iff both inputs are valid and `inner` lies within `outer`.
#[must_use]
pub fn contains(outer: &str, inner: &str) -> bool {
    match (parse(outer), parse(inner)) {
        (Some(outer), Some(inner)) => outer.contains(&inner),
        _ => false,
    }
}

/// True iff `addr` is a usable host address of `cidr`.
#[must_use]
pub fn is_host_address(cidr: &str, addr: &str) -> bool {
    match (parse(cidr), addr.parse::<Ipv4Addr>()) {
        (Some(net), Ok(ip)) => net.is_host_address(ip),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "0.0.0.0/0",
        "10.0.0.0/8",
        "10.0.0.1/24",
        "10.0.0.128/25",
        "10.0.1.0/24",
        "172.28.100.0/26",
        "172.28.100.63/26",
        "192.168.10.0/24",
        "192.168.10.77/32",
        "255.255.255.255/1",
    ];

    #[test]
    fn parse_accepts_dotted_decimal_with_prefix() {
        let c: Cidr = "172.28.100.0/26".parse().unwrap();
        assert_eq!(c.addr(), Ipv4Addr::new(172, 28, 100, 0));
        assert_eq!(c.prefix(), 26);
        assert_eq!(c.to_string(), "172.28.100.0/26");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(
            "10.0.0.0".parse::<Cidr>(),
            Err(CidrError::MissingPrefix(_))
        ));
        assert!(matches!(
            "10.0.0.0/".parse::<Cidr>(),
            Err(CidrError::InvalidPrefix(_))
        ));
        assert!(matches!(
            "10.0.0.0/abc".parse::<Cidr>(),
            Err(CidrError::InvalidPrefix(_))
        ));
        assert!(matches!(
            "10.0.0.0/33".parse::<Cidr>(),
            Err(CidrError::InvalidPrefix(_))
        ));
        assert!(matches!(
            "10.0.0.0/-1".parse::<Cidr>(),
            Err(CidrError::InvalidPrefix(_))
        ));
        assert!(matches!(
            "10.0.0.0/99999999999".parse::<Cidr>(),
            Err(CidrError::InvalidPrefix(_))
        ));
        assert!(matches!(
            "10.0.0/8".parse::<Cidr>(),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(matches!(
            "fd00::/64".parse::<Cidr>(),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(parse("").is_none());
        assert!(parse("banana").is_none());
    }

    #[test]
    fn address_is_checked_before_prefix() {
        assert!(matches!(
            "300.0.0.0/40".parse::<Cidr>(),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(matches!(
            "fd00::/16".parse::<Cidr>(),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(matches!(
            "10.0.0.0/40".parse::<Cidr>(),
            Err(CidrError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn mask_matches_prefix() {
        assert_eq!(Cidr::new(Ipv4Addr::UNSPECIFIED, 0).unwrap().mask(), 0);
        assert_eq!("10.0.0.0/24".parse::<Cidr>().unwrap().mask(), 0xffff_ff00);
        assert_eq!("10.0.0.9/32".parse::<Cidr>().unwrap().mask(), u32::MAX);
    }

    #[test]
    fn new_rejects_long_prefix() {
        assert!(Cidr::new(Ipv4Addr::LOCALHOST, 33).is_err());
        assert!(Cidr::new(Ipv4Addr::LOCALHOST, 32).is_ok());
    }

    #[test]
    fn normalize_masks_host_bits() {
        assert_eq!(normalize("10.0.0.7/24").as_deref(), Some("10.0.0.0/24"));
        assert_eq!(normalize("172.28.100.63/26").as_deref(), Some("172.28.100.0/26"));
        assert_eq!(normalize("1.2.3.4/0").as_deref(), Some("0.0.0.0/0"));
        assert_eq!(normalize("1.2.3.4/32").as_deref(), Some("1.2.3.4/32"));
        assert!(normalize("1.2.3.4").is_none());
        assert!(normalize("1.2.3.4/x").is_none());
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in SAMPLES {
            let once = normalize(s).unwrap();
            assert_eq!(normalize(&once).as_deref(), Some(once.as_str()), "{s}");
        }
    }

    #[test]
    fn aligned_iff_normalize_is_fixpoint() {
        for s in SAMPLES {
            assert_eq!(is_aligned(s), normalize(s).as_deref() == Some(*s), "{s}");
        }
        assert!(is_aligned("10.0.0.0/24"));
        assert!(!is_aligned("10.0.0.1/24"));
        assert!(!is_aligned("10.0.0.0"));
        assert!(!is_aligned("10.0.0.0/40"));
    }

    #[test]
    fn overlap_examples() {
        assert!(overlap("10.0.0.0/24", "10.0.0.128/25"));
        assert!(!overlap("10.0.0.0/24", "10.0.1.0/24"));
        assert!(overlap("10.0.0.0/8", "10.200.3.0/24"));
        assert!(overlap("0.0.0.0/0", "192.168.1.0/24"));
        assert!(overlap("10.0.0.5/24", "10.0.1.0/16"));
        assert!(!overlap("10.0.0.0/24", "garbage"));
        assert!(!overlap("10.0.0.0", "10.0.0.0/24"));
    }

    #[test]
    fn overlap_is_symmetric() {
        for a in SAMPLES {
            for b in SAMPLES {
                assert_eq!(overlap(a, b), overlap(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn contains_examples() {
        assert!(contains("10.0.0.0/16", "10.0.1.0/24"));
        assert!(!contains("10.0.1.0/24", "10.0.0.0/16"));
        assert!(contains("172.28.100.0/26", "172.28.100.32/27"));
        assert!(!contains("172.28.100.0/26", "172.28.100.64/27"));
        assert!(contains("10.0.0.0/24", "10.0.0.0/24"));
        assert!(!contains("10.0.0.0/24", "10.0.0.0"));
    }

    #[test]
    fn host_address_excludes_network_and_broadcast() {
        assert!(!is_host_address("192.168.10.0/24", "192.168.10.0"));
        assert!(!is_host_address("192.168.10.0/24", "192.168.10.255"));
        assert!(is_host_address("192.168.10.0/24", "192.168.10.1"));
        assert!(!is_host_address("192.168.10.0/24", "192.168.11.1"));
        assert!(!is_host_address("192.168.10.0/24", "not-an-ip"));
        assert!(!is_host_address("192.168.10.0/33", "192.168.10.1"));
        assert!(!is_host_address("192.168.10.7/32", "192.168.10.7"));
    }

    #[test]
    fn network_and_broadcast() {
        let c: Cidr = "172.28.100.17/26".parse().unwrap();
        assert_eq!(c.network(), Ipv4Addr::new(172, 28, 100, 0));
        assert_eq!(c.broadcast(), Ipv4Addr::new(172, 28, 100, 63));
        assert!(!c.is_aligned());
        assert!(c.normalized().is_aligned());
    }

    #[test]
    fn cidr_serde_json() {
        let c: Cidr = "10.1.0.0/16".parse().unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"10.1.0.0/16\"");
        let back: Cidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<Cidr>("\"10.1.0.0\"").is_err());
    }
}
