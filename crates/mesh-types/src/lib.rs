//! Address types shared by every layer of the mesh control plane.
//!
//! This crate provides type-safe representations of the addressing forms a
//! 6LoWPAN mesh node deals with:
//!
//! - [`ShortAddress`]: 16-bit mesh locator (RLOC16)
//! - [`ExtAddress`]: 64-bit globally unique hardware address
//! - [`LinkAddress`]: either of the above, or none
//! - [`InterfaceIdentifier`]: the low 64 bits of an IPv6 address
//! - [`Ip6Address`]: IPv6 address with scope classification
//! - [`Ip6Prefix`]: IPv6 network prefix (CIDR notation)

mod ext;
mod iid;
mod ip6;
mod short;

pub use ext::{ExtAddress, LinkAddress};
pub use iid::InterfaceIdentifier;
pub use ip6::{Ip6Address, Ip6Prefix, MulticastScope};
pub use short::ShortAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid short address: {0}")]
    InvalidShortAddress(String),

    #[error("invalid extended address: {0}")]
    InvalidExtAddress(String),

    #[error("invalid IPv6 address: {0}")]
    InvalidIp6Address(String),

    #[error("invalid IPv6 prefix: {0}")]
    InvalidIp6Prefix(String),
}
