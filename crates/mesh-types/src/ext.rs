//! Extended (64-bit) hardware address and the generic link address.

use crate::{ParseError, ShortAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit IEEE 802.15.4 extended address.
///
/// # Examples
///
/// ```
/// use mesh_types::ExtAddress;
///
/// let ext: ExtAddress = "1122334455667788".parse().unwrap();
/// assert_eq!(ext.to_string(), "1122334455667788");
///
/// // Also supports colon-separated format
/// let ext2: ExtAddress = "11:22:33:44:55:66:77:88".parse().unwrap();
/// assert_eq!(ext, ext2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtAddress([u8; 8]);

impl ExtAddress {
    /// Universal/local bit of the first octet.
    const LOCAL_BIT: u8 = 0x02;

    pub const ZERO: ExtAddress = ExtAddress([0; 8]);

    pub const fn new(bytes: [u8; 8]) -> Self {
        ExtAddress(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Returns true if this is a locally administered address.
    pub const fn is_local(&self) -> bool {
        self.0[0] & Self::LOCAL_BIT != 0
    }

    /// Returns a copy with the universal/local bit flipped.
    ///
    /// Interface identifiers and extended addresses differ exactly in this bit.
    pub const fn with_local_bit_toggled(&self) -> Self {
        let mut bytes = self.0;
        bytes[0] ^= Self::LOCAL_BIT;
        ExtAddress(bytes)
    }
}

impl fmt::Display for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for ExtAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidExtAddress(s.to_string());
        let mut bytes = [0u8; 8];

        if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != 8 {
                return Err(invalid());
            }
            for (i, part) in parts.iter().enumerate() {
                if part.len() != 2 {
                    return Err(invalid());
                }
                bytes[i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            }
        } else {
            if s.len() != 16 || !s.is_ascii() {
                return Err(invalid());
            }
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
            }
        }

        Ok(ExtAddress(bytes))
    }
}

impl TryFrom<String> for ExtAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ExtAddress> for String {
    fn from(ext: ExtAddress) -> String {
        ext.to_string()
    }
}

impl From<[u8; 8]> for ExtAddress {
    fn from(bytes: [u8; 8]) -> Self {
        ExtAddress(bytes)
    }
}

/// A link-layer address: short, extended, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkAddress {
    #[default]
    None,
    Short(ShortAddress),
    Extended(ExtAddress),
}

impl LinkAddress {
    pub const fn is_none(&self) -> bool {
        matches!(self, LinkAddress::None)
    }

    pub const fn as_short(&self) -> Option<ShortAddress> {
        match self {
            LinkAddress::Short(short) => Some(*short),
            _ => None,
        }
    }

    pub const fn as_extended(&self) -> Option<&ExtAddress> {
        match self {
            LinkAddress::Extended(ext) => Some(ext),
            _ => None,
        }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddress::None => f.write_str("none"),
            LinkAddress::Short(short) => short.fmt(f),
            LinkAddress::Extended(ext) => ext.fmt(f),
        }
    }
}

impl From<ShortAddress> for LinkAddress {
    fn from(short: ShortAddress) -> Self {
        LinkAddress::Short(short)
    }
}

impl From<ExtAddress> for LinkAddress {
    fn from(ext: ExtAddress) -> Self {
        LinkAddress::Extended(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_compact_format() {
        let ext: ExtAddress = "0011223344556677".parse().unwrap();
        assert_eq!(
            ext.as_bytes(),
            &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]
        );
    }

    #[test]
    fn test_parse_colon_format() {
        let ext: ExtAddress = "aa:bb:cc:dd:ee:ff:00:11".parse().unwrap();
        assert_eq!(ext.to_string(), "aabbccddeeff0011");
    }

    #[test]
    fn test_local_bit() {
        let universal = ExtAddress::new([0x00, 1, 2, 3, 4, 5, 6, 7]);
        assert!(!universal.is_local());

        let toggled = universal.with_local_bit_toggled();
        assert!(toggled.is_local());
        assert_eq!(toggled.as_bytes()[0], 0x02);
        assert_eq!(toggled.with_local_bit_toggled(), universal);
    }

    #[test]
    fn test_invalid_format() {
        assert!("invalid".parse::<ExtAddress>().is_err());
        assert!("00112233445566".parse::<ExtAddress>().is_err());
        assert!("001122334455667788".parse::<ExtAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<ExtAddress>().is_err());
        assert!("gg11223344556677".parse::<ExtAddress>().is_err());
    }

    #[test]
    fn test_link_address_accessors() {
        let short = LinkAddress::from(ShortAddress::new(0x0401));
        assert_eq!(short.as_short(), Some(ShortAddress::new(0x0401)));
        assert!(short.as_extended().is_none());

        assert!(LinkAddress::default().is_none());
        assert_eq!(LinkAddress::None.to_string(), "none");
    }
}
