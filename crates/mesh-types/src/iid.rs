//! IPv6 interface identifiers and their link-address encodings.

use crate::{ExtAddress, LinkAddress, ParseError, ShortAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of a locator-format IID: `0000:00ff:fe00:xxxx`.
const LOCATOR_PREFIX: [u8; 6] = [0x00, 0x00, 0x00, 0xff, 0xfe, 0x00];

/// Anycast locators occupy `0xfc00..=0xfcff`.
const ANYCAST_LOCATOR_MIN: u16 = 0xfc00;
const ANYCAST_LOCATOR_MAX: u16 = 0xfcff;

/// The low 64 bits of an IPv6 address.
///
/// Mesh addresses derive their IID either from the node's extended address
/// (universal/local bit flipped) or from its 16-bit locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceIdentifier([u8; 8]);

impl InterfaceIdentifier {
    pub const UNSPECIFIED: InterfaceIdentifier = InterfaceIdentifier([0; 8]);

    pub const fn new(bytes: [u8; 8]) -> Self {
        InterfaceIdentifier(bytes)
    }

    /// Builds the IID that embeds an extended address.
    pub const fn from_ext_address(ext: &ExtAddress) -> Self {
        InterfaceIdentifier(*ext.with_local_bit_toggled().as_bytes())
    }

    /// Builds the locator-format IID for a short address.
    pub const fn from_locator(locator: ShortAddress) -> Self {
        let value = locator.value();
        InterfaceIdentifier([
            LOCATOR_PREFIX[0],
            LOCATOR_PREFIX[1],
            LOCATOR_PREFIX[2],
            LOCATOR_PREFIX[3],
            LOCATOR_PREFIX[4],
            LOCATOR_PREFIX[5],
            (value >> 8) as u8,
            value as u8,
        ])
    }

    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 8]
    }

    /// Returns true if the IID has the `0000:00ff:fe00:xxxx` locator form.
    pub fn is_locator(&self) -> bool {
        self.0[..6] == LOCATOR_PREFIX
    }

    /// Returns the embedded locator, if the IID is in locator form.
    pub fn locator(&self) -> Option<ShortAddress> {
        self.is_locator()
            .then(|| ShortAddress::new(u16::from_be_bytes([self.0[6], self.0[7]])))
    }

    /// Returns true if the IID carries an anycast locator (ALOC16).
    pub fn is_anycast_locator(&self) -> bool {
        self.locator()
            .map(|loc| (ANYCAST_LOCATOR_MIN..=ANYCAST_LOCATOR_MAX).contains(&loc.value()))
            .unwrap_or(false)
    }

    /// Returns true if the IID carries a routing locator (RLOC16).
    pub fn is_routing_locator(&self) -> bool {
        self.is_locator() && !self.is_anycast_locator()
    }

    /// Returns the extended address this IID was derived from.
    pub const fn to_ext_address(&self) -> ExtAddress {
        ExtAddress::new(self.0).with_local_bit_toggled()
    }

    /// Converts the IID to the link address it encodes.
    ///
    /// Locator-format IIDs map to the short address; every other IID maps to
    /// an extended address.
    pub fn to_link_address(&self) -> LinkAddress {
        match self.locator() {
            Some(locator) => LinkAddress::Short(locator),
            None => LinkAddress::Extended(self.to_ext_address()),
        }
    }
}

impl fmt::Display for InterfaceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for InterfaceIdentifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Same textual forms as an extended address.
        s.parse::<ExtAddress>()
            .map(|ext| InterfaceIdentifier(*ext.as_bytes()))
            .map_err(|_| ParseError::InvalidExtAddress(s.to_string()))
    }
}

impl TryFrom<String> for InterfaceIdentifier {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InterfaceIdentifier> for String {
    fn from(iid: InterfaceIdentifier) -> String {
        iid.to_string()
    }
}

impl From<[u8; 8]> for InterfaceIdentifier {
    fn from(bytes: [u8; 8]) -> Self {
        InterfaceIdentifier(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ext_address_round_trip() {
        let ext: ExtAddress = "1022334455667788".parse().unwrap();
        let iid = InterfaceIdentifier::from_ext_address(&ext);

        assert_eq!(iid.as_bytes()[0], 0x12);
        assert_eq!(iid.to_ext_address(), ext);
        assert_eq!(iid.to_link_address(), LinkAddress::Extended(ext));
    }

    #[test]
    fn test_locator_extraction() {
        let iid = InterfaceIdentifier::from_locator(ShortAddress::new(0x2c01));
        assert!(iid.is_locator());
        assert!(iid.is_routing_locator());
        assert_eq!(iid.locator(), Some(ShortAddress::new(0x2c01)));
        assert_eq!(
            iid.to_link_address(),
            LinkAddress::Short(ShortAddress::new(0x2c01))
        );
    }

    #[test]
    fn test_anycast_locator() {
        let aloc = InterfaceIdentifier::from_locator(ShortAddress::new(0xfc00));
        assert!(aloc.is_locator());
        assert!(aloc.is_anycast_locator());
        assert!(!aloc.is_routing_locator());
    }

    #[test]
    fn test_non_locator() {
        let iid: InterfaceIdentifier = "0000000000000001".parse().unwrap();
        assert!(!iid.is_locator());
        assert_eq!(iid.locator(), None);
        assert!(InterfaceIdentifier::UNSPECIFIED.is_unspecified());
    }
}
