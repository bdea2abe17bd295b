//! Router table indexed by router id.

use crate::error::{MeshError, Result};
use crate::neighbor::{AddressMatcher, Router, StateFilter};
use mesh_types::LinkAddress;
use tracing::debug;

/// Highest router id in the mesh.
pub const MAX_ROUTER_ID: u8 = 62;

#[derive(Debug, Clone)]
pub struct RouterTable {
    routers: Vec<Option<Router>>,
}

impl Default for RouterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterTable {
    pub fn new() -> Self {
        Self {
            routers: vec![None; usize::from(MAX_ROUTER_ID) + 1],
        }
    }

    /// Returns the allocated entry for `router_id`.
    pub fn router(&self, router_id: u8) -> Option<&Router> {
        self.routers.get(usize::from(router_id))?.as_ref()
    }

    pub fn router_mut(&mut self, router_id: u8) -> Option<&mut Router> {
        self.routers.get_mut(usize::from(router_id))?.as_mut()
    }

    pub fn find_router(&self, matcher: &AddressMatcher) -> Option<&Router> {
        self.routers
            .iter()
            .flatten()
            .find(|r| matcher.matches(&r.neighbor))
    }

    /// Returns the valid neighbor router answering to `address`.
    pub fn neighbor(&self, address: &LinkAddress) -> Option<&Router> {
        if address.is_none() {
            return None;
        }

        self.find_router(&AddressMatcher::link(*address, StateFilter::Valid))
    }

    /// Allocates the entry for the router id encoded in the router's RLOC16.
    ///
    /// A valid router may not share its extended address with a valid router
    /// at another id.
    pub fn insert(&mut self, router: Router) -> Result<u8> {
        let rloc16 = router.neighbor.rloc16;
        if !rloc16.is_router() || rloc16.router_id() > MAX_ROUTER_ID {
            return Err(MeshError::invalid_args(format!(
                "{} is not a router locator",
                rloc16
            )));
        }

        let id = rloc16.router_id();
        if router.neighbor.is_state_valid() {
            let conflict = self.routers.iter().flatten().any(|r| {
                r.router_id() != id
                    && r.neighbor.is_state_valid()
                    && r.neighbor.ext_address == router.neighbor.ext_address
            });
            if conflict {
                return Err(MeshError::Duplicated);
            }
        }

        debug!(router_id = id, rloc16 = %rloc16, "Router entry allocated");
        self.routers[usize::from(id)] = Some(router);
        Ok(id)
    }

    pub fn remove(&mut self, router_id: u8) -> Option<Router> {
        let removed = self.routers.get_mut(usize::from(router_id))?.take();
        if removed.is_some() {
            debug!(router_id, "Router entry released");
        }
        removed
    }

    pub fn iter(&self, filter: StateFilter) -> impl Iterator<Item = &Router> + '_ {
        self.routers
            .iter()
            .flatten()
            .filter(move |r| filter.matches(r.neighbor.state))
    }

    pub fn num_routers(&self) -> usize {
        self.routers.iter().flatten().count()
    }
}
