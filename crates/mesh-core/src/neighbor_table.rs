//! Neighbor resolution across the parent slots, child table and router table.
//!
//! [`NeighborTable`] owns nothing. It is a borrowed view over the tables held
//! by the [`Instance`](crate::Instance) and resolves any address form to the
//! single record that answers for it.
//!
//! Precedence:
//! - on a router-capable node acting as router or leader, children are
//!   searched before routers, and both before the parent slots;
//! - otherwise only the parent slots are searched, parent before candidate.

use crate::child_table::ChildTable;
use crate::config::DeviceType;
use crate::error::{MeshError, Result};
use crate::mle::Mle;
use crate::neighbor::{AddressMatcher, NeighborInfo, NeighborRef, StateFilter};
use crate::router_table::{RouterTable, MAX_ROUTER_ID};
use mesh_types::{ExtAddress, Ip6Address, LinkAddress, ShortAddress};
use std::time::Instant;
use tracing::debug;

/// Position of a neighbor enumeration.
///
/// The enumeration walks the child table by slot index, then the router id
/// space. It is restartable: a fresh [`NeighborInfoIterator::INIT`] always
/// replays the same sequence for unchanged tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborInfoIterator {
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Next child slot to inspect.
    Children(u16),
    /// Next router id to inspect. Past `MAX_ROUTER_ID` means exhausted.
    Routers(u8),
}

impl Default for NeighborInfoIterator {
    fn default() -> Self {
        Self::INIT
    }
}

impl NeighborInfoIterator {
    pub const INIT: NeighborInfoIterator = NeighborInfoIterator {
        phase: Phase::Children(0),
    };

    /// Decodes the signed-integer form used by diagnostics interfaces.
    ///
    /// Non-negative values index the child table; negative values are the
    /// negated next router id.
    pub fn from_raw(raw: i16) -> Self {
        let phase = if raw >= 0 {
            Phase::Children(raw.unsigned_abs())
        } else {
            let id = raw.unsigned_abs().min(u16::from(MAX_ROUTER_ID) + 1);
            // Clamped to the router id space above.
            Phase::Routers(id as u8)
        };
        Self { phase }
    }

    /// Encodes the position as a signed integer.
    pub fn as_raw(&self) -> i16 {
        match self.phase {
            // Child slots are bounded well below i16::MAX.
            Phase::Children(index) => index as i16,
            Phase::Routers(id) => -i16::from(id),
        }
    }

    /// Returns true once both the child and router spaces are exhausted.
    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Routers(id) if id > MAX_ROUTER_ID)
    }

    pub fn reset(&mut self) {
        *self = Self::INIT;
    }
}

/// Borrowed resolver over the neighbor tables.
#[derive(Debug, Clone, Copy)]
pub struct NeighborTable<'a> {
    device_type: DeviceType,
    mle: &'a Mle,
    child_table: &'a ChildTable,
    router_table: &'a RouterTable,
}

impl<'a> NeighborTable<'a> {
    pub fn new(
        device_type: DeviceType,
        mle: &'a Mle,
        child_table: &'a ChildTable,
        router_table: &'a RouterTable,
    ) -> Self {
        Self {
            device_type,
            mle,
            child_table,
            router_table,
        }
    }

    /// Returns the parent, or else the parent candidate, if it matches.
    pub fn find_parent(&self, matcher: &AddressMatcher) -> Option<NeighborRef<'a>> {
        let parent = self.mle.parent();
        if matcher.matches(&parent.neighbor) {
            return Some(NeighborRef::Parent(parent));
        }

        let candidate = self.mle.parent_candidate();
        if matcher.matches(&candidate.neighbor) {
            return Some(NeighborRef::ParentCandidate(candidate));
        }

        None
    }

    pub fn find_parent_by_short(&self, address: ShortAddress) -> Option<NeighborRef<'a>> {
        self.find_parent(&AddressMatcher::short(address, StateFilter::ValidOrRestoring))
    }

    pub fn find_parent_by_ext(&self, address: &ExtAddress) -> Option<NeighborRef<'a>> {
        self.find_parent(&AddressMatcher::extended(*address, StateFilter::ValidOrRestoring))
    }

    pub fn find_parent_by_link(&self, address: &LinkAddress) -> Option<NeighborRef<'a>> {
        self.find_parent(&AddressMatcher::link(*address, StateFilter::ValidOrRestoring))
    }

    /// Resolves a matcher against every table in precedence order.
    pub fn find_neighbor(&self, matcher: &AddressMatcher) -> Option<NeighborRef<'a>> {
        if self.device_type.is_router_capable() && self.mle.is_router_or_leader() {
            if let Some(found) = self.find_child_or_router(matcher) {
                return Some(found);
            }
        }

        self.find_parent(matcher)
    }

    /// Resolves a short address in state valid or restoring.
    ///
    /// The broadcast and invalid sentinels never resolve.
    pub fn find_neighbor_by_short(&self, address: ShortAddress) -> Option<NeighborRef<'a>> {
        if address.is_broadcast() || address.is_invalid() {
            return None;
        }

        self.find_neighbor(&AddressMatcher::short(address, StateFilter::ValidOrRestoring))
    }

    pub fn find_neighbor_by_ext(&self, address: &ExtAddress) -> Option<NeighborRef<'a>> {
        self.find_neighbor(&AddressMatcher::extended(*address, StateFilter::ValidOrRestoring))
    }

    pub fn find_neighbor_by_link(&self, address: &LinkAddress) -> Option<NeighborRef<'a>> {
        match address {
            LinkAddress::None => None,
            LinkAddress::Short(short) => self.find_neighbor_by_short(*short),
            LinkAddress::Extended(ext) => self.find_neighbor_by_ext(ext),
        }
    }

    /// Searches the child table, then the router table.
    pub fn find_child_or_router(&self, matcher: &AddressMatcher) -> Option<NeighborRef<'a>> {
        if let Some(child) = self.child_table.find_child(matcher) {
            return Some(NeighborRef::Child(child));
        }

        self.router_table
            .find_router(matcher)
            .map(NeighborRef::Router)
    }

    /// Resolves the neighbor owning an IPv6 address.
    ///
    /// Link-local and routing-locator addresses carry their owner's link
    /// address in the IID and resolve directly; anything else falls back to a
    /// scan of the children's registered addresses. Router-capable nodes only.
    pub fn find_neighbor_by_ip6(&self, address: &Ip6Address) -> Option<NeighborRef<'a>> {
        if !self.device_type.is_router_capable() {
            return None;
        }

        let mut link = LinkAddress::None;

        if address.is_link_local() {
            link = address.iid().to_link_address();
        }

        if self.mle.is_routing_locator(address) {
            if let Some(locator) = address.iid().locator() {
                link = LinkAddress::Short(locator);
            }
        }

        if !link.is_none() {
            debug!(address = %address, link = %link, "Resolving neighbor by embedded link address");
            return self.find_child_or_router(&AddressMatcher::link(
                link,
                StateFilter::ValidOrRestoring,
            ));
        }

        self.child_table
            .iter(StateFilter::ValidOrRestoring)
            .find(|child| child.has_ip6_address(address))
            .map(NeighborRef::Child)
    }

    /// Resolves a neighboring router that is not our parent.
    ///
    /// Only meaningful while attached as a child.
    pub fn find_rx_only_neighbor_router(&self, address: &LinkAddress) -> Option<NeighborRef<'a>> {
        if !self.mle.is_child() {
            return None;
        }

        self.router_table.neighbor(address).map(NeighborRef::Router)
    }

    /// Advances `iterator` to the next valid neighbor and returns its info.
    ///
    /// Returns [`MeshError::NotFound`] once the enumeration is exhausted.
    pub fn get_next_neighbor_info(&self, iterator: &mut NeighborInfoIterator) -> Result<NeighborInfo> {
        let now = Instant::now();

        if self.device_type.is_router_capable() {
            self.next_ftd_neighbor_info(iterator, now)
        } else {
            self.next_mtd_neighbor_info(iterator, now)
        }
    }

    fn next_ftd_neighbor_info(
        &self,
        iterator: &mut NeighborInfoIterator,
        now: Instant,
    ) -> Result<NeighborInfo> {
        let mut next_router = match iterator.phase {
            Phase::Children(start) => {
                let mut index = start;
                while let Some(child) = self.child_table.child_at_index(index) {
                    index += 1;
                    if child.neighbor.is_state_valid() {
                        iterator.phase = Phase::Children(index);
                        return Ok(NeighborInfo::from_neighbor(&child.neighbor, true, now));
                    }
                }
                0
            }
            Phase::Routers(id) => id,
        };

        while next_router <= MAX_ROUTER_ID {
            let id = next_router;
            next_router += 1;

            if let Some(router) = self.router_table.router(id) {
                if router.neighbor.is_state_valid() {
                    iterator.phase = Phase::Routers(next_router);
                    return Ok(NeighborInfo::from_neighbor(&router.neighbor, false, now));
                }
            }
        }

        iterator.phase = Phase::Routers(next_router);
        Err(MeshError::NotFound)
    }

    fn next_mtd_neighbor_info(
        &self,
        iterator: &mut NeighborInfoIterator,
        now: Instant,
    ) -> Result<NeighborInfo> {
        if *iterator != NeighborInfoIterator::INIT {
            return Err(MeshError::NotFound);
        }

        iterator.phase = Phase::Children(1);

        let parent = self.mle.parent();
        if !parent.neighbor.is_state_valid() {
            return Err(MeshError::NotFound);
        }

        Ok(NeighborInfo::from_neighbor(&parent.neighbor, false, now))
    }

    /// Lazily enumerates every valid neighbor from the initial position.
    pub fn neighbor_infos(&self) -> NeighborInfos<'a> {
        NeighborInfos {
            table: *self,
            iterator: NeighborInfoIterator::INIT,
        }
    }
}

/// Iterator adapter over [`NeighborTable::get_next_neighbor_info`].
#[derive(Debug, Clone)]
pub struct NeighborInfos<'a> {
    table: NeighborTable<'a>,
    iterator: NeighborInfoIterator,
}

impl Iterator for NeighborInfos<'_> {
    type Item = NeighborInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.table.get_next_neighbor_info(&mut self.iterator).ok()
    }
}
