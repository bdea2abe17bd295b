//! Neighbor records and address matching.

use crate::error::{MeshError, Result};
use mesh_types::{ExtAddress, Ip6Address, LinkAddress, ShortAddress};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Maximum number of IPv6 addresses a child may register.
pub const MAX_CHILD_IP6_ADDRESSES: usize = 4;

/// Next-hop value meaning "no next hop".
pub const INVALID_ROUTER_ID: u8 = 63;

/// Lifecycle state of a neighbor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborState {
    /// Free slot.
    #[default]
    Invalid,
    /// Restored from non-volatile storage, not yet re-confirmed.
    Restored,
    ParentRequest,
    ParentResponse,
    ChildIdRequest,
    LinkRequest,
    ChildUpdateRequest,
    Valid,
}

impl NeighborState {
    pub fn is_restoring(&self) -> bool {
        matches!(self, NeighborState::Restored | NeighborState::ChildUpdateRequest)
    }

    pub fn is_attaching(&self) -> bool {
        matches!(
            self,
            NeighborState::ParentResponse | NeighborState::ChildIdRequest
        )
    }

    pub fn is_valid_or_restoring(&self) -> bool {
        *self == NeighborState::Valid || self.is_restoring()
    }
}

impl fmt::Display for NeighborState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NeighborState::Invalid => "invalid",
            NeighborState::Restored => "restored",
            NeighborState::ParentRequest => "parent-request",
            NeighborState::ParentResponse => "parent-response",
            NeighborState::ChildIdRequest => "child-id-request",
            NeighborState::LinkRequest => "link-request",
            NeighborState::ChildUpdateRequest => "child-update-request",
            NeighborState::Valid => "valid",
        };
        write!(f, "{}", s)
    }
}

/// Set of neighbor states a lookup accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFilter {
    Valid,
    ValidOrRestoring,
    ChildIdRequest,
    ValidOrAttaching,
    AnyExceptInvalid,
    AnyExceptValidOrRestoring,
    Any,
}

impl StateFilter {
    pub fn matches(&self, state: NeighborState) -> bool {
        match self {
            StateFilter::Valid => state == NeighborState::Valid,
            StateFilter::ValidOrRestoring => state.is_valid_or_restoring(),
            StateFilter::ChildIdRequest => state == NeighborState::ChildIdRequest,
            StateFilter::ValidOrAttaching => {
                state == NeighborState::Valid || state.is_attaching()
            }
            StateFilter::AnyExceptInvalid => state != NeighborState::Invalid,
            StateFilter::AnyExceptValidOrRestoring => !state.is_valid_or_restoring(),
            StateFilter::Any => true,
        }
    }
}

/// Lookup criterion: an optional link address plus a required state filter.
///
/// Rebuilt for every lookup; it carries no identity beyond its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMatcher {
    address: LinkAddress,
    filter: StateFilter,
}

impl AddressMatcher {
    /// Matches on state alone.
    pub fn new(filter: StateFilter) -> Self {
        Self {
            address: LinkAddress::None,
            filter,
        }
    }

    pub fn short(address: ShortAddress, filter: StateFilter) -> Self {
        Self {
            address: LinkAddress::Short(address),
            filter,
        }
    }

    pub fn extended(address: ExtAddress, filter: StateFilter) -> Self {
        Self {
            address: LinkAddress::Extended(address),
            filter,
        }
    }

    pub fn link(address: LinkAddress, filter: StateFilter) -> Self {
        Self { address, filter }
    }

    pub fn address(&self) -> &LinkAddress {
        &self.address
    }

    pub fn filter(&self) -> StateFilter {
        self.filter
    }

    pub fn matches(&self, neighbor: &Neighbor) -> bool {
        if !self.filter.matches(neighbor.state) {
            return false;
        }

        match &self.address {
            LinkAddress::None => true,
            LinkAddress::Short(short) => *short == neighbor.rloc16,
            LinkAddress::Extended(ext) => *ext == neighbor.ext_address,
        }
    }
}

/// Fields common to every neighbor role.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub ext_address: ExtAddress,
    pub rloc16: ShortAddress,
    pub state: NeighborState,
    pub rx_on_when_idle: bool,
    pub full_thread_device: bool,
    pub full_network_data: bool,
    /// Link quality of received frames, 0-3.
    pub link_quality_in: u8,
    pub average_rssi: i8,
    pub last_rssi: i8,
    pub last_heard: Instant,
}

impl Default for Neighbor {
    fn default() -> Self {
        Self {
            ext_address: ExtAddress::ZERO,
            rloc16: ShortAddress::INVALID,
            state: NeighborState::Invalid,
            rx_on_when_idle: false,
            full_thread_device: false,
            full_network_data: false,
            link_quality_in: 0,
            average_rssi: 0,
            last_rssi: 0,
            last_heard: Instant::now(),
        }
    }
}

impl Neighbor {
    pub fn new(ext_address: ExtAddress, rloc16: ShortAddress) -> Self {
        Self {
            ext_address,
            rloc16,
            ..Default::default()
        }
    }

    pub fn is_state_valid(&self) -> bool {
        self.state == NeighborState::Valid
    }

    pub fn is_state_invalid(&self) -> bool {
        self.state == NeighborState::Invalid
    }

    pub fn is_state_valid_or_restoring(&self) -> bool {
        self.state.is_valid_or_restoring()
    }

    pub fn matches(&self, matcher: &AddressMatcher) -> bool {
        matcher.matches(self)
    }

    /// Returns true if this neighbor answers to the given link address.
    pub fn has_link_address(&self, address: &LinkAddress) -> bool {
        match address {
            LinkAddress::None => false,
            LinkAddress::Short(short) => *short == self.rloc16,
            LinkAddress::Extended(ext) => *ext == self.ext_address,
        }
    }

    /// Resets the record to a free slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A child attached to this node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Child {
    pub neighbor: Neighbor,
    ip6_addresses: Vec<Ip6Address>,
}

impl Child {
    pub fn new(neighbor: Neighbor) -> Self {
        Self {
            neighbor,
            ip6_addresses: Vec::with_capacity(MAX_CHILD_IP6_ADDRESSES),
        }
    }

    pub fn ip6_addresses(&self) -> &[Ip6Address] {
        &self.ip6_addresses
    }

    /// Registers an IPv6 address for the child.
    pub fn add_ip6_address(&mut self, address: Ip6Address) -> Result<()> {
        if address.is_unspecified() {
            return Err(MeshError::invalid_args("unspecified address"));
        }

        if self.ip6_addresses.contains(&address) {
            return Err(MeshError::Duplicated);
        }

        if self.ip6_addresses.len() >= MAX_CHILD_IP6_ADDRESSES {
            return Err(MeshError::NoBufs);
        }

        self.ip6_addresses.push(address);
        Ok(())
    }

    pub fn remove_ip6_address(&mut self, address: &Ip6Address) -> Result<()> {
        let pos = self
            .ip6_addresses
            .iter()
            .position(|a| a == address)
            .ok_or(MeshError::NotFound)?;
        self.ip6_addresses.remove(pos);
        Ok(())
    }

    pub fn clear_ip6_addresses(&mut self) {
        self.ip6_addresses.clear();
    }

    pub fn has_ip6_address(&self, address: &Ip6Address) -> bool {
        !address.is_unspecified() && self.ip6_addresses.contains(address)
    }

    pub fn clear(&mut self) {
        self.neighbor.clear();
        self.ip6_addresses.clear();
    }
}

/// A router neighbor. Also used for the parent and parent-candidate slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Router {
    pub neighbor: Neighbor,
    pub next_hop: u8,
    pub cost: u8,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            neighbor: Neighbor::default(),
            next_hop: INVALID_ROUTER_ID,
            cost: 0,
        }
    }
}

impl Router {
    pub fn new(neighbor: Neighbor) -> Self {
        Self {
            neighbor,
            ..Default::default()
        }
    }

    pub fn router_id(&self) -> u8 {
        self.neighbor.rloc16.router_id()
    }
}

/// Where a resolved neighbor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeighborRole {
    Parent,
    ParentCandidate,
    Child,
    Router,
}

impl fmt::Display for NeighborRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NeighborRole::Parent => "parent",
            NeighborRole::ParentCandidate => "parent-candidate",
            NeighborRole::Child => "child",
            NeighborRole::Router => "router",
        };
        write!(f, "{}", s)
    }
}

/// A borrowed neighbor record, tagged with the table that owns it.
#[derive(Debug, Clone, Copy)]
pub enum NeighborRef<'a> {
    Parent(&'a Router),
    ParentCandidate(&'a Router),
    Child(&'a Child),
    Router(&'a Router),
}

impl<'a> NeighborRef<'a> {
    pub fn neighbor(&self) -> &'a Neighbor {
        match self {
            NeighborRef::Parent(r) | NeighborRef::ParentCandidate(r) | NeighborRef::Router(r) => {
                &r.neighbor
            }
            NeighborRef::Child(c) => &c.neighbor,
        }
    }

    pub fn role(&self) -> NeighborRole {
        match self {
            NeighborRef::Parent(_) => NeighborRole::Parent,
            NeighborRef::ParentCandidate(_) => NeighborRole::ParentCandidate,
            NeighborRef::Child(_) => NeighborRole::Child,
            NeighborRef::Router(_) => NeighborRole::Router,
        }
    }

    pub fn as_child(&self) -> Option<&'a Child> {
        match self {
            NeighborRef::Child(c) => Some(c),
            _ => None,
        }
    }

    pub fn rloc16(&self) -> ShortAddress {
        self.neighbor().rloc16
    }

    pub fn ext_address(&self) -> ExtAddress {
        self.neighbor().ext_address
    }
}

/// Diagnostic snapshot of a neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborInfo {
    pub ext_address: ExtAddress,
    pub rloc16: ShortAddress,
    /// Seconds since the neighbor was last heard.
    pub age_secs: u32,
    pub link_quality_in: u8,
    pub average_rssi: i8,
    pub last_rssi: i8,
    pub rx_on_when_idle: bool,
    pub full_thread_device: bool,
    pub full_network_data: bool,
    pub is_child: bool,
}

impl NeighborInfo {
    pub fn from_neighbor(neighbor: &Neighbor, is_child: bool, now: Instant) -> Self {
        let age = now.saturating_duration_since(neighbor.last_heard).as_secs();

        Self {
            ext_address: neighbor.ext_address,
            rloc16: neighbor.rloc16,
            age_secs: u32::try_from(age).unwrap_or(u32::MAX),
            link_quality_in: neighbor.link_quality_in,
            average_rssi: neighbor.average_rssi,
            last_rssi: neighbor.last_rssi,
            rx_on_when_idle: neighbor.rx_on_when_idle,
            full_thread_device: neighbor.full_thread_device,
            full_network_data: neighbor.full_network_data,
            is_child,
        }
    }
}
