//! Host identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Address family used when resolving a hostname to a socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
}

impl AddressFamily {
    /// Whether the given address belongs to this family.
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Identifies one monitored host for the duration of a fetch cycle.
///
/// Immutable once built: cache entries are keyed by `hostname`, and the
/// fetcher connects to `address` (or resolves `hostname` when no explicit
/// address is configured).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub address: Option<IpAddr>,
    pub family: AddressFamily,
}

impl HostIdentity {
    pub fn new(hostname: impl Into<String>, address: Option<IpAddr>, family: AddressFamily) -> Self {
        Self {
            hostname: hostname.into(),
            address,
            family,
        }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(addr) => write!(f, "{} ({})", self.hostname, addr),
            None => write!(f, "{}", self.hostname),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_matches_address() {
        let v4: IpAddr = "192.168.1.10".parse().unwrap();
        let v6: IpAddr = "::1".parse().unwrap();
        assert!(AddressFamily::V4.matches(&v4));
        assert!(!AddressFamily::V4.matches(&v6));
        assert!(AddressFamily::V6.matches(&v6));
    }

    #[test]
    fn display_includes_address_when_known() {
        let host = HostIdentity::new("web-01", Some("10.0.0.5".parse().unwrap()), AddressFamily::V4);
        assert_eq!(host.to_string(), "web-01 (10.0.0.5)");

        let bare = HostIdentity::new("web-02", None, AddressFamily::V4);
        assert_eq!(bare.to_string(), "web-02");
    }
}
