//! Mesh Link Establishment view.
//!
//! Holds the attachment state the core consults: device role, own locator,
//! mesh-local prefix and the parent slots. Route convergence itself lives in
//! the routing layer that drives this state.

use crate::neighbor::Router;
use mesh_types::{ExtAddress, InterfaceIdentifier, Ip6Address, Ip6Prefix, ShortAddress};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Mesh-local prefix used until the leader distributes one.
pub const DEFAULT_MESH_LOCAL_PREFIX: Ip6Address =
    Ip6Address::new(0xfdde, 0xad00, 0xbeef, 0, 0, 0, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    #[default]
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl DeviceRole {
    pub fn is_attached(&self) -> bool {
        matches!(self, DeviceRole::Child | DeviceRole::Router | DeviceRole::Leader)
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceRole::Disabled => "disabled",
            DeviceRole::Detached => "detached",
            DeviceRole::Child => "child",
            DeviceRole::Router => "router",
            DeviceRole::Leader => "leader",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct Mle {
    enabled: bool,
    role: DeviceRole,
    rloc16: ShortAddress,
    ext_address: ExtAddress,
    mesh_local_prefix: Ip6Prefix,
    parent: Router,
    parent_candidate: Router,
}

impl Mle {
    pub fn new(ext_address: ExtAddress) -> Self {
        Self {
            enabled: false,
            role: DeviceRole::Disabled,
            rloc16: ShortAddress::INVALID,
            ext_address,
            mesh_local_prefix: Ip6Prefix::from_64(&DEFAULT_MESH_LOCAL_PREFIX),
            parent: Router::default(),
            parent_candidate: Router::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Opens the protocol for business; the role stays as-is until the
    /// routing layer attaches.
    pub fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            info!("MLE enabled");
        }
    }

    /// Closes the protocol and drops back to the disabled role.
    pub fn disable(&mut self) {
        if self.enabled {
            self.enabled = false;
            self.role = DeviceRole::Disabled;
            info!("MLE disabled");
        }
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    /// Sets the device role. Returns true if the role changed.
    pub fn set_role(&mut self, role: DeviceRole) -> bool {
        if self.role == role {
            return false;
        }

        info!(from = %self.role, to = %role, "Device role changed");
        self.role = role;
        true
    }

    pub fn is_disabled(&self) -> bool {
        self.role == DeviceRole::Disabled
    }

    pub fn is_detached(&self) -> bool {
        self.role == DeviceRole::Detached
    }

    pub fn is_attached(&self) -> bool {
        self.role.is_attached()
    }

    pub fn is_child(&self) -> bool {
        self.role == DeviceRole::Child
    }

    pub fn is_router_or_leader(&self) -> bool {
        matches!(self.role, DeviceRole::Router | DeviceRole::Leader)
    }

    pub fn rloc16(&self) -> ShortAddress {
        self.rloc16
    }

    pub fn set_rloc16(&mut self, rloc16: ShortAddress) {
        self.rloc16 = rloc16;
    }

    pub fn ext_address(&self) -> ExtAddress {
        self.ext_address
    }

    pub fn set_ext_address(&mut self, ext_address: ExtAddress) {
        self.ext_address = ext_address;
    }

    pub fn mesh_local_prefix(&self) -> &Ip6Prefix {
        &self.mesh_local_prefix
    }

    pub fn set_mesh_local_prefix(&mut self, prefix: Ip6Prefix) {
        self.mesh_local_prefix = prefix;
    }

    /// Mesh-local routing locator address of this node.
    pub fn mesh_local_rloc(&self) -> Ip6Address {
        Ip6Address::from_prefix_and_iid(
            &self.mesh_local_prefix,
            &InterfaceIdentifier::from_locator(self.rloc16),
        )
    }

    pub fn is_mesh_local_address(&self, address: &Ip6Address) -> bool {
        self.mesh_local_prefix.contains(address)
    }

    /// Mesh-local address whose IID carries a routing locator.
    pub fn is_routing_locator(&self, address: &Ip6Address) -> bool {
        self.is_mesh_local_address(address) && address.iid().is_routing_locator()
    }

    /// Mesh-local address whose IID carries an anycast locator.
    pub fn is_anycast_locator(&self, address: &Ip6Address) -> bool {
        self.is_mesh_local_address(address) && address.iid().is_anycast_locator()
    }

    pub fn parent(&self) -> &Router {
        &self.parent
    }

    pub fn parent_mut(&mut self) -> &mut Router {
        &mut self.parent
    }

    pub fn parent_candidate(&self) -> &Router {
        &self.parent_candidate
    }

    pub fn parent_candidate_mut(&mut self) -> &mut Router {
        &mut self.parent_candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mle() -> Mle {
        let mut mle = Mle::new(ExtAddress::new([1, 2, 3, 4, 5, 6, 7, 8]));
        mle.set_rloc16(ShortAddress::new(0x0400));
        mle
    }

    #[test]
    fn test_enable_disable() {
        let mut mle = mle();
        assert!(!mle.is_enabled());
        mle.enable();
        mle.set_role(DeviceRole::Router);
        assert!(mle.is_router_or_leader());

        mle.disable();
        assert!(!mle.is_enabled());
        assert!(mle.is_disabled());
    }

    #[test]
    fn test_set_role_reports_change() {
        let mut mle = mle();
        assert!(mle.set_role(DeviceRole::Child));
        assert!(!mle.set_role(DeviceRole::Child));
        assert!(mle.is_child());
        assert!(mle.is_attached());
        assert!(!mle.is_router_or_leader());
    }

    #[test]
    fn test_mesh_local_classification() {
        let mle = mle();
        let rloc: Ip6Address = "fdde:ad00:beef:0:0:ff:fe00:400".parse().unwrap();
        let aloc: Ip6Address = "fdde:ad00:beef:0:0:ff:fe00:fc01".parse().unwrap();
        let ml_eid: Ip6Address = "fdde:ad00:beef:0:1122:3344:5566:7788".parse().unwrap();
        let global: Ip6Address = "2001:db8::ff:fe00:400".parse().unwrap();

        assert!(mle.is_routing_locator(&rloc));
        assert!(!mle.is_routing_locator(&aloc));
        assert!(mle.is_anycast_locator(&aloc));
        assert!(mle.is_mesh_local_address(&ml_eid));
        assert!(!mle.is_routing_locator(&ml_eid));
        assert!(!mle.is_mesh_local_address(&global));
        assert!(!mle.is_routing_locator(&global));
    }

    #[test]
    fn test_mesh_local_rloc() {
        let mle = mle();
        assert_eq!(
            mle.mesh_local_rloc().to_string(),
            "fdde:ad00:beef::ff:fe00:400"
        );
    }
}
