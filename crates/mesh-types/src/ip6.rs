//! IPv6 address and prefix types with mesh scope classification.

use crate::{InterfaceIdentifier, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Multicast scope nibble (RFC 7346).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MulticastScope(u8);

impl MulticastScope {
    pub const INTERFACE_LOCAL: MulticastScope = MulticastScope(1);
    pub const LINK_LOCAL: MulticastScope = MulticastScope(2);
    pub const REALM_LOCAL: MulticastScope = MulticastScope(3);
    pub const ADMIN_LOCAL: MulticastScope = MulticastScope(4);
    pub const SITE_LOCAL: MulticastScope = MulticastScope(5);
    pub const ORGANIZATION_LOCAL: MulticastScope = MulticastScope(8);
    pub const GLOBAL: MulticastScope = MulticastScope(14);

    pub const fn value(&self) -> u8 {
        self.0
    }
}

/// An IPv6 address wrapper with mesh-specific classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ip6Address(Ipv6Addr);

impl Ip6Address {
    pub const UNSPECIFIED: Self = Ip6Address(Ipv6Addr::UNSPECIFIED);

    /// Link-local all-nodes (`ff02::1`).
    pub const LINK_LOCAL_ALL_NODES: Self = Ip6Address::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
    /// Link-local all-routers (`ff02::2`).
    pub const LINK_LOCAL_ALL_ROUTERS: Self = Ip6Address::new(0xff02, 0, 0, 0, 0, 0, 0, 2);
    /// Realm-local all-nodes (`ff03::1`).
    pub const REALM_LOCAL_ALL_NODES: Self = Ip6Address::new(0xff03, 0, 0, 0, 0, 0, 0, 1);
    /// Realm-local all-routers (`ff03::2`).
    pub const REALM_LOCAL_ALL_ROUTERS: Self = Ip6Address::new(0xff03, 0, 0, 0, 0, 0, 0, 2);
    /// Realm-local all-MPL-forwarders (`ff03::fc`).
    pub const REALM_LOCAL_ALL_MPL_FORWARDERS: Self =
        Ip6Address::new(0xff03, 0, 0, 0, 0, 0, 0, 0xfc);

    #[allow(clippy::too_many_arguments)]
    pub const fn new(a: u16, b: u16, c: u16, d: u16, e: u16, f: u16, g: u16, h: u16) -> Self {
        Ip6Address(Ipv6Addr::new(a, b, c, d, e, f, g, h))
    }

    /// Joins a /64 prefix with an interface identifier.
    pub fn from_prefix_and_iid(prefix: &Ip6Prefix, iid: &InterfaceIdentifier) -> Self {
        let mut octets = prefix.address().octets();
        octets[8..].copy_from_slice(iid.as_bytes());
        Ip6Address(Ipv6Addr::from(octets))
    }

    pub const fn inner(&self) -> Ipv6Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 16] {
        self.0.octets()
    }

    pub const fn segments(&self) -> [u16; 8] {
        self.0.segments()
    }

    /// Returns the interface identifier (low 64 bits).
    pub fn iid(&self) -> InterfaceIdentifier {
        let octets = self.octets();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&octets[8..]);
        InterfaceIdentifier::new(bytes)
    }

    pub fn is_unspecified(&self) -> bool {
        self.0.is_unspecified()
    }

    pub fn is_multicast(&self) -> bool {
        self.0.octets()[0] == 0xff
    }

    /// Returns the scope of a multicast address.
    pub fn multicast_scope(&self) -> Option<MulticastScope> {
        self.is_multicast()
            .then(|| MulticastScope(self.0.octets()[1] & 0x0f))
    }

    /// Returns true if this is a link-local unicast address (fe80::/10).
    pub fn is_link_local(&self) -> bool {
        let segments = self.segments();
        (segments[0] & 0xffc0) == 0xfe80
    }

    pub fn is_link_local_multicast(&self) -> bool {
        self.multicast_scope() == Some(MulticastScope::LINK_LOCAL)
    }

    pub fn is_realm_local_multicast(&self) -> bool {
        self.multicast_scope() == Some(MulticastScope::REALM_LOCAL)
    }

    /// Returns true for multicast groups that reach beyond the mesh realm.
    pub fn is_multicast_larger_than_realm_local(&self) -> bool {
        self.multicast_scope()
            .map(|scope| scope > MulticastScope::REALM_LOCAL)
            .unwrap_or(false)
    }

    /// Number of leading bits this address shares with `other`.
    pub fn matching_prefix_len(&self, other: &Ip6Address) -> u8 {
        let diff = u128::from(self.0) ^ u128::from(other.0);
        diff.leading_zeros() as u8
    }
}

impl fmt::Display for Ip6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ip6Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv6Addr>()
            .map(Ip6Address)
            .map_err(|_| ParseError::InvalidIp6Address(s.to_string()))
    }
}

impl From<Ipv6Addr> for Ip6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Ip6Address(addr)
    }
}

impl From<Ip6Address> for Ipv6Addr {
    fn from(addr: Ip6Address) -> Self {
        addr.0
    }
}

/// An IPv6 prefix in CIDR notation (e.g., fd00:db8::/64).
///
/// Host bits beyond the prefix length are cleared on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ip6Prefix {
    address: Ip6Address,
    length: u8,
}

impl Ip6Prefix {
    /// Creates a new prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 128.
    pub fn new(address: Ip6Address, length: u8) -> Result<Self, ParseError> {
        if length > 128 {
            return Err(ParseError::InvalidIp6Prefix(format!(
                "prefix length {} exceeds maximum 128",
                length
            )));
        }

        let bits = u128::from(address.inner());
        let mask = if length == 0 {
            0
        } else {
            u128::MAX << (128 - u32::from(length))
        };

        Ok(Ip6Prefix {
            address: Ip6Address(Ipv6Addr::from(bits & mask)),
            length,
        })
    }

    /// Builds the /64 prefix covering `address`.
    pub fn from_64(address: &Ip6Address) -> Self {
        let mut octets = address.octets();
        octets[8..].fill(0);
        Ip6Prefix {
            address: Ip6Address(Ipv6Addr::from(octets)),
            length: 64,
        }
    }

    pub const fn address(&self) -> &Ip6Address {
        &self.address
    }

    pub const fn length(&self) -> u8 {
        self.length
    }

    /// Returns true if this is the default route (::/0).
    pub const fn is_default(&self) -> bool {
        self.length == 0
    }

    /// Returns true if `address` falls within this prefix.
    pub fn contains(&self, address: &Ip6Address) -> bool {
        self.address.matching_prefix_len(address) >= self.length
    }
}

impl fmt::Display for Ip6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}

impl FromStr for Ip6Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIp6Prefix(s.to_string()))?;

        let address: Ip6Address = addr_str.parse()?;
        let length: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIp6Prefix(s.to_string()))?;

        Ip6Prefix::new(address, length)
    }
}

impl TryFrom<String> for Ip6Prefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ip6Prefix> for String {
    fn from(prefix: Ip6Prefix) -> String {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShortAddress;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_link_local() {
        let link_local: Ip6Address = "fe80::1".parse().unwrap();
        assert!(link_local.is_link_local());
        assert!(!link_local.is_multicast());

        let mesh_local: Ip6Address = "fd00:db8::1".parse().unwrap();
        assert!(!mesh_local.is_link_local());
    }

    #[test]
    fn test_multicast_scopes() {
        assert!(Ip6Address::LINK_LOCAL_ALL_NODES.is_link_local_multicast());
        assert!(Ip6Address::REALM_LOCAL_ALL_NODES.is_realm_local_multicast());
        assert!(!Ip6Address::REALM_LOCAL_ALL_NODES.is_multicast_larger_than_realm_local());

        let admin: Ip6Address = "ff04::1234".parse().unwrap();
        assert_eq!(admin.multicast_scope(), Some(MulticastScope::ADMIN_LOCAL));
        assert!(admin.is_multicast_larger_than_realm_local());

        let unicast: Ip6Address = "2001:db8::1".parse().unwrap();
        assert_eq!(unicast.multicast_scope(), None);
        assert!(!unicast.is_multicast_larger_than_realm_local());
    }

    #[test]
    fn test_iid_and_compose() {
        let prefix: Ip6Prefix = "fd00:db8::/64".parse().unwrap();
        let iid = InterfaceIdentifier::from_locator(ShortAddress::new(0x0400));
        let rloc = Ip6Address::from_prefix_and_iid(&prefix, &iid);

        assert_eq!(rloc.to_string(), "fd00:db8::ff:fe00:400");
        assert_eq!(rloc.iid(), iid);
        assert!(prefix.contains(&rloc));
    }

    #[test]
    fn test_prefix_masks_host_bits() {
        let prefix: Ip6Prefix = "fd00:db8::1234/64".parse().unwrap();
        assert_eq!(prefix.to_string(), "fd00:db8::/64");
        assert_eq!(prefix.length(), 64);
    }

    #[test]
    fn test_prefix_contains() {
        let prefix: Ip6Prefix = "2001:db8:1::/48".parse().unwrap();
        assert!(prefix.contains(&"2001:db8:1:ffff::1".parse().unwrap()));
        assert!(!prefix.contains(&"2001:db8:2::1".parse().unwrap()));

        let default: Ip6Prefix = "::/0".parse().unwrap();
        assert!(default.is_default());
        assert!(default.contains(&"fe80::1".parse().unwrap()));
    }

    #[test]
    fn test_matching_prefix_len() {
        let a: Ip6Address = "2001:db8::1".parse().unwrap();
        let b: Ip6Address = "2001:db8::2".parse().unwrap();
        assert_eq!(a.matching_prefix_len(&b), 126);
        assert_eq!(a.matching_prefix_len(&a), 128);
    }

    #[test]
    fn test_invalid_prefix() {
        assert!("fd00::/129".parse::<Ip6Prefix>().is_err());
        assert!("fd00::".parse::<Ip6Prefix>().is_err());
        assert!("not-an-address/64".parse::<Ip6Prefix>().is_err());
    }
}
