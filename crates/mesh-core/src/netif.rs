//! Mesh network interface lifecycle and addresses.
//!
//! `up` and `down` sequence the dependent subsystems:
//!
//! - up: link layer, channel monitor, forwarder, all-nodes groups, MLE, TMF
//!   agent (with backbone resources), DNS and SNTP clients, notification
//! - down: DNS and SNTP clients, secure and plain TMF agents, MLE, external
//!   addresses and groups, forwarder, channel monitor, notification
//!
//! Both are no-ops when the interface is already in the requested state.

use crate::bbr::BackboneRouterManager;
use crate::error::{MeshError, Result};
use crate::mle::Mle;
use crate::network_data::{NetworkData, RouteMatch};
use crate::notifier::{Events, Notifier};
use crate::tmf::TmfAgent;
use mesh_types::Ip6Address;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info};

/// Groups every node joins while the interface is up.
pub const ALL_NODES_MULTICAST: [Ip6Address; 3] = [
    Ip6Address::LINK_LOCAL_ALL_NODES,
    Ip6Address::REALM_LOCAL_ALL_NODES,
    Ip6Address::REALM_LOCAL_ALL_MPL_FORWARDERS,
];

/// Groups joined by routers.
pub const ALL_ROUTERS_MULTICAST: [Ip6Address; 2] = [
    Ip6Address::LINK_LOCAL_ALL_ROUTERS,
    Ip6Address::REALM_LOCAL_ALL_ROUTERS,
];

/// A collaborator the interface starts and stops.
pub trait Subsystem {
    fn name(&self) -> &str;
    fn start(&mut self);
    fn stop(&mut self);
}

/// The radio MAC.
pub trait LinkLayer {
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// External collaborators owned by the interface. Optional ones exist only
/// when their feature is configured.
pub struct NetifSubsystems {
    pub mac: Box<dyn LinkLayer>,
    pub mesh_forwarder: Box<dyn Subsystem>,
    pub channel_monitor: Option<Box<dyn Subsystem>>,
    pub dns_client: Option<Box<dyn Subsystem>>,
    pub sntp_client: Option<Box<dyn Subsystem>>,
    pub secure_tmf: Option<Box<dyn Subsystem>>,
}

impl NetifSubsystems {
    pub fn new(mac: Box<dyn LinkLayer>, mesh_forwarder: Box<dyn Subsystem>) -> Self {
        Self {
            mac,
            mesh_forwarder,
            channel_monitor: None,
            dns_client: None,
            sntp_client: None,
            secure_tmf: None,
        }
    }
}

impl fmt::Debug for NetifSubsystems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |s: &Option<Box<dyn Subsystem>>| s.as_ref().map(|s| s.name().to_string());
        f.debug_struct("NetifSubsystems")
            .field("mac_enabled", &self.mac.is_enabled())
            .field("mesh_forwarder", &self.mesh_forwarder.name())
            .field("channel_monitor", &name(&self.channel_monitor))
            .field("dns_client", &name(&self.dns_client))
            .field("sntp_client", &name(&self.sntp_client))
            .field("secure_tmf", &name(&self.secure_tmf))
            .finish()
    }
}

fn start_optional(subsystem: &mut Option<Box<dyn Subsystem>>) {
    if let Some(s) = subsystem.as_mut() {
        debug!(subsystem = s.name(), "Starting");
        s.start();
    }
}

fn stop_optional(subsystem: &mut Option<Box<dyn Subsystem>>) {
    if let Some(s) = subsystem.as_mut() {
        debug!(subsystem = s.name(), "Stopping");
        s.stop();
    }
}

#[derive(Debug)]
pub struct ThreadNetif {
    is_up: bool,
    tmf_port: u16,
    subsystems: NetifSubsystems,
    tmf: TmfAgent,
    backbone: Option<Rc<RefCell<BackboneRouterManager>>>,
    multicast: BTreeSet<Ip6Address>,
    external_multicast: BTreeSet<Ip6Address>,
    external_unicast: BTreeSet<Ip6Address>,
}

impl ThreadNetif {
    pub fn new(
        tmf_port: u16,
        subsystems: NetifSubsystems,
        tmf: TmfAgent,
        backbone: Option<Rc<RefCell<BackboneRouterManager>>>,
    ) -> Self {
        Self {
            is_up: false,
            tmf_port,
            subsystems,
            tmf,
            backbone,
            multicast: BTreeSet::new(),
            external_multicast: BTreeSet::new(),
            external_unicast: BTreeSet::new(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.is_up
    }

    pub fn up(&mut self, mle: &mut Mle, notifier: &mut Notifier) {
        if self.is_up {
            debug!("Interface already up");
            return;
        }

        // The MAC may have been disabled while the interface was down.
        self.subsystems.mac.set_enabled(true);
        start_optional(&mut self.subsystems.channel_monitor);
        self.subsystems.mesh_forwarder.start();

        self.is_up = true;

        self.subscribe_all_nodes_multicast();
        mle.enable();
        self.tmf.start(self.tmf_port);
        if let Some(bbr) = &self.backbone {
            BackboneRouterManager::attach(bbr, &mut self.tmf);
        }
        start_optional(&mut self.subsystems.dns_client);
        start_optional(&mut self.subsystems.sntp_client);

        notifier.signal(Events::THREAD_NETIF_STATE);
        info!(tmf_port = self.tmf_port, "Network interface up");
    }

    pub fn down(&mut self, mle: &mut Mle, notifier: &mut Notifier) {
        if !self.is_up {
            debug!("Interface already down");
            return;
        }

        stop_optional(&mut self.subsystems.dns_client);
        stop_optional(&mut self.subsystems.sntp_client);
        stop_optional(&mut self.subsystems.secure_tmf);
        if self.backbone.is_some() {
            BackboneRouterManager::detach(&mut self.tmf);
        }
        self.tmf.stop();
        let role = mle.role();
        mle.disable();
        if mle.role() != role {
            notifier.signal(Events::ROLE);
        }
        self.remove_all_external_unicast_addresses();
        self.unsubscribe_all_external_multicast_addresses();
        self.unsubscribe_all_routers_multicast();
        self.unsubscribe_all_nodes_multicast();

        self.is_up = false;
        self.subsystems.mesh_forwarder.stop();
        stop_optional(&mut self.subsystems.channel_monitor);

        notifier.signal(Events::THREAD_NETIF_STATE);
        info!("Network interface down");
    }

    /// Looks up the border router for `destination`.
    ///
    /// Returns [`MeshError::NoRoute`] when this node is itself the best owner.
    pub fn route_lookup(
        &self,
        network_data: &NetworkData,
        mle: &Mle,
        source: &Ip6Address,
        destination: &Ip6Address,
    ) -> Result<RouteMatch> {
        let route = network_data.route_lookup(source, destination)?;

        if route.rloc16 == mle.rloc16() {
            debug!(destination = %destination, "Best route owner is this node");
            return Err(MeshError::NoRoute);
        }

        Ok(route)
    }

    pub fn tmf(&self) -> &TmfAgent {
        &self.tmf
    }

    pub fn tmf_mut(&mut self) -> &mut TmfAgent {
        &mut self.tmf
    }

    pub fn subsystems(&self) -> &NetifSubsystems {
        &self.subsystems
    }

    fn subscribe_all_nodes_multicast(&mut self) {
        self.multicast.extend(ALL_NODES_MULTICAST);
    }

    fn unsubscribe_all_nodes_multicast(&mut self) {
        for group in &ALL_NODES_MULTICAST {
            self.multicast.remove(group);
        }
    }

    pub fn subscribe_all_routers_multicast(&mut self) {
        self.multicast.extend(ALL_ROUTERS_MULTICAST);
    }

    pub fn unsubscribe_all_routers_multicast(&mut self) {
        for group in &ALL_ROUTERS_MULTICAST {
            self.multicast.remove(group);
        }
    }

    pub fn is_multicast_subscribed(&self, group: &Ip6Address) -> bool {
        self.multicast.contains(group) || self.external_multicast.contains(group)
    }

    /// Every subscribed group, fixed and external.
    pub fn multicast_addresses(&self) -> impl Iterator<Item = &Ip6Address> + '_ {
        self.multicast.iter().chain(self.external_multicast.iter())
    }

    pub fn subscribe_external_multicast(&mut self, group: Ip6Address) -> Result<()> {
        if !group.is_multicast() {
            return Err(MeshError::invalid_args(format!("{} is not multicast", group)));
        }

        if self.is_multicast_subscribed(&group) {
            return Err(MeshError::Duplicated);
        }

        debug!(group = %group, "External multicast subscribed");
        self.external_multicast.insert(group);
        Ok(())
    }

    pub fn unsubscribe_external_multicast(&mut self, group: &Ip6Address) -> Result<()> {
        if !self.external_multicast.remove(group) {
            return Err(MeshError::NotFound);
        }
        Ok(())
    }

    pub fn unsubscribe_all_external_multicast_addresses(&mut self) {
        self.external_multicast.clear();
    }

    pub fn external_unicast_addresses(&self) -> impl Iterator<Item = &Ip6Address> + '_ {
        self.external_unicast.iter()
    }

    pub fn add_external_unicast_address(&mut self, address: Ip6Address) -> Result<()> {
        if address.is_multicast() || address.is_unspecified() {
            return Err(MeshError::invalid_args(format!("{} is not unicast", address)));
        }

        if !self.external_unicast.insert(address) {
            return Err(MeshError::Duplicated);
        }

        debug!(address = %address, "External unicast address added");
        Ok(())
    }

    pub fn remove_external_unicast_address(&mut self, address: &Ip6Address) -> Result<()> {
        if !self.external_unicast.remove(address) {
            return Err(MeshError::NotFound);
        }
        Ok(())
    }

    pub fn remove_all_external_unicast_addresses(&mut self) {
        self.external_unicast.clear();
    }
}
