//! Short (16-bit) mesh address with router/child locator split.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CHILD_ID_MASK: u16 = 0x01ff;
const ROUTER_ID_SHIFT: u16 = 10;

/// A 16-bit short address, also used as the routing locator (RLOC16).
///
/// The upper six bits carry the router id; the low nine bits carry the child
/// id, zero for the router itself.
///
/// # Examples
///
/// ```
/// use mesh_types::ShortAddress;
///
/// let rloc: ShortAddress = "0x1c01".parse().unwrap();
/// assert_eq!(rloc.router_id(), 7);
/// assert_eq!(rloc.child_id(), 1);
/// assert_eq!(rloc.to_string(), "0x1c01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortAddress(u16);

impl ShortAddress {
    /// The broadcast short address (0xffff).
    pub const BROADCAST: ShortAddress = ShortAddress(0xffff);

    /// The invalid/unassigned short address (0xfffe).
    pub const INVALID: ShortAddress = ShortAddress(0xfffe);

    pub const fn new(value: u16) -> Self {
        ShortAddress(value)
    }

    /// Returns the RLOC16 of the router with the given id.
    pub const fn from_router_id(router_id: u8) -> Self {
        ShortAddress((router_id as u16) << ROUTER_ID_SHIFT)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    pub const fn router_id(&self) -> u8 {
        (self.0 >> ROUTER_ID_SHIFT) as u8
    }

    pub const fn child_id(&self) -> u16 {
        self.0 & CHILD_ID_MASK
    }

    /// Returns true if this locator addresses a router (child id zero).
    pub const fn is_router(&self) -> bool {
        self.child_id() == 0
    }

    /// Returns true if this locator addresses a child of some router.
    pub const fn is_child(&self) -> bool {
        !self.is_router()
    }

    /// Returns the RLOC16 of the router that owns this locator.
    pub const fn parent_router(&self) -> Self {
        ShortAddress(self.0 & !CHILD_ID_MASK)
    }

    pub const fn is_broadcast(&self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    pub const fn is_invalid(&self) -> bool {
        self.0 == Self::INVALID.0
    }

    /// Returns true unless this is one of the two sentinel values.
    pub const fn is_unicast(&self) -> bool {
        !self.is_broadcast() && !self.is_invalid()
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl FromStr for ShortAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.is_empty() || digits.len() > 4 {
            return Err(ParseError::InvalidShortAddress(s.to_string()));
        }

        u16::from_str_radix(digits, 16)
            .map(ShortAddress)
            .map_err(|_| ParseError::InvalidShortAddress(s.to_string()))
    }
}

impl From<u16> for ShortAddress {
    fn from(value: u16) -> Self {
        ShortAddress(value)
    }
}

impl From<ShortAddress> for u16 {
    fn from(addr: ShortAddress) -> u16 {
        addr.0
    }
}
