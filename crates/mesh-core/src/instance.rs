//! The node instance: owns every table and subsystem and wires them together.

use crate::bbr::{BackboneRouterManager, BackboneRouterState, DuaStatus};
use crate::child_table::ChildTable;
use crate::config::NodeConfig;
use crate::error::{MeshError, Result};
use crate::mle::{DeviceRole, Mle};
use crate::neighbor_table::NeighborTable;
use crate::netif::{NetifSubsystems, ThreadNetif};
use crate::network_data::{NetworkData, RouteMatch};
use crate::notifier::{Events, Notifier};
use crate::router_table::RouterTable;
use crate::tmf::{MessageInfo, TmfAgent, TmfFilter, TmfMessage, TmfTransport};
use mesh_types::{ExtAddress, InterfaceIdentifier, Ip6Address};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

/// A mesh node.
///
/// Everything runs on the caller's thread; the embedder's event loop feeds
/// messages in and drives table updates through the accessors.
#[derive(Debug)]
pub struct Instance {
    config: NodeConfig,
    mle: Mle,
    child_table: ChildTable,
    router_table: RouterTable,
    network_data: NetworkData,
    notifier: Notifier,
    netif: ThreadNetif,
    backbone: Option<Rc<RefCell<BackboneRouterManager>>>,
}

fn check_collaborator(enabled: bool, present: bool, field: &str) -> Result<()> {
    match (enabled, present) {
        (true, false) => Err(MeshError::config(field, "enabled but no implementation was supplied")),
        (false, true) => Err(MeshError::config(field, "implementation supplied but feature is disabled")),
        _ => Ok(()),
    }
}

impl Instance {
    pub fn new(
        config: NodeConfig,
        subsystems: NetifSubsystems,
        transport: Box<dyn TmfTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let features = &config.features;
        check_collaborator(
            features.channel_monitor,
            subsystems.channel_monitor.is_some(),
            "features.channel_monitor",
        )?;
        check_collaborator(features.dns_client, subsystems.dns_client.is_some(), "features.dns_client")?;
        check_collaborator(features.sntp_client, subsystems.sntp_client.is_some(), "features.sntp_client")?;
        check_collaborator(features.secure_tmf, subsystems.secure_tmf.is_some(), "features.secure_tmf")?;

        let backbone = features
            .backbone_router
            .then(|| Rc::new(RefCell::new(BackboneRouterManager::new(&config))));

        let max_children = if config.device_type.is_router_capable() {
            config.max_children
        } else {
            0
        };

        let netif = ThreadNetif::new(
            config.tmf_port,
            subsystems,
            TmfAgent::new(transport),
            backbone.clone(),
        );

        info!(
            device_type = ?config.device_type,
            max_children,
            backbone_router = backbone.is_some(),
            "Instance created"
        );

        Ok(Self {
            mle: Mle::new(ExtAddress::ZERO),
            child_table: ChildTable::new(max_children),
            router_table: RouterTable::new(),
            network_data: NetworkData::new(),
            notifier: Notifier::new(),
            netif,
            backbone,
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Resolver view over the current tables.
    pub fn neighbor_table(&self) -> NeighborTable<'_> {
        NeighborTable::new(
            self.config.device_type,
            &self.mle,
            &self.child_table,
            &self.router_table,
        )
    }

    pub fn up(&mut self) {
        self.netif.up(&mut self.mle, &mut self.notifier);
    }

    pub fn down(&mut self) {
        self.netif.down(&mut self.mle, &mut self.notifier);
    }

    pub fn is_up(&self) -> bool {
        self.netif.is_up()
    }

    pub fn route_lookup(&self, source: &Ip6Address, destination: &Ip6Address) -> Result<RouteMatch> {
        self.netif
            .route_lookup(&self.network_data, &self.mle, source, destination)
    }

    /// Admits and dispatches an inbound management message.
    pub fn handle_tmf_message(&mut self, message: &TmfMessage, info: &MessageInfo) -> Result<()> {
        let filter = TmfFilter::new(&self.mle);
        self.netif.tmf_mut().handle_message(message, info, &filter)
    }

    /// Updates the device role and notifies subscribers. Routers and leaders
    /// join the all-routers groups.
    pub fn set_role(&mut self, role: DeviceRole) {
        if !self.mle.set_role(role) {
            return;
        }

        if self.mle.is_router_or_leader() {
            self.netif.subscribe_all_routers_multicast();
        } else {
            self.netif.unsubscribe_all_routers_multicast();
        }
        self.notifier.signal(Events::ROLE);
    }

    pub fn set_backbone_router_state(&mut self, state: BackboneRouterState) -> Result<()> {
        let bbr = self.backbone.as_ref().ok_or(MeshError::Disabled("backbone router"))?;
        if bbr.borrow_mut().set_state(state) {
            self.notifier.signal(Events::BACKBONE_ROUTER_STATE);
        }
        Ok(())
    }

    pub fn config_next_dua_registration_response(
        &mut self,
        ml_iid: Option<InterfaceIdentifier>,
        status: DuaStatus,
    ) -> Result<()> {
        self.backbone
            .as_ref()
            .ok_or(MeshError::Disabled("backbone router"))?
            .borrow_mut()
            .config_next_dua_registration_response(ml_iid, status)
    }

    pub fn clear_next_dua_registration_response(&mut self) -> Result<()> {
        self.backbone
            .as_ref()
            .ok_or(MeshError::Disabled("backbone router"))?
            .borrow_mut()
            .clear_next_dua_registration_response()
    }

    pub fn mle(&self) -> &Mle {
        &self.mle
    }

    pub fn mle_mut(&mut self) -> &mut Mle {
        &mut self.mle
    }

    pub fn child_table(&self) -> &ChildTable {
        &self.child_table
    }

    pub fn child_table_mut(&mut self) -> &mut ChildTable {
        &mut self.child_table
    }

    pub fn router_table(&self) -> &RouterTable {
        &self.router_table
    }

    pub fn router_table_mut(&mut self) -> &mut RouterTable {
        &mut self.router_table
    }

    pub fn network_data(&self) -> &NetworkData {
        &self.network_data
    }

    pub fn network_data_mut(&mut self) -> &mut NetworkData {
        &mut self.network_data
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn netif(&self) -> &ThreadNetif {
        &self.netif
    }

    pub fn netif_mut(&mut self) -> &mut ThreadNetif {
        &mut self.netif
    }

    pub fn backbone(&self) -> Option<&Rc<RefCell<BackboneRouterManager>>> {
        self.backbone.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceType;
    use crate::netif::{LinkLayer, Subsystem};
    use crate::tmf::TmfResponse;
    use pretty_assertions::assert_eq;

    struct Noop;

    impl Subsystem for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        fn start(&mut self) {}
        fn stop(&mut self) {}
    }

    impl LinkLayer for Noop {
        fn set_enabled(&mut self, _: bool) {}
        fn is_enabled(&self) -> bool {
            true
        }
    }

    impl TmfTransport for Noop {
        fn send_response(&mut self, _: TmfResponse, _: &MessageInfo) -> Result<()> {
            Ok(())
        }
    }

    fn subsystems() -> NetifSubsystems {
        NetifSubsystems::new(Box::new(Noop), Box::new(Noop))
    }

    fn bbr_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.features.backbone_router = true;
        config.backbone_router.domain_prefix = Some("fd00:7d03:7d03:7d03::/64".parse().unwrap());
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = bbr_config();
        config.device_type = DeviceType::Mtd;
        assert!(matches!(
            Instance::new(config, subsystems(), Box::new(Noop)),
            Err(MeshError::Config { .. })
        ));
    }

    #[test]
    fn test_feature_requires_collaborator() {
        let mut config = NodeConfig::default();
        config.features.dns_client = true;
        let err = Instance::new(config, subsystems(), Box::new(Noop)).unwrap_err();
        assert!(matches!(err, MeshError::Config { ref field, .. } if field == "features.dns_client"));

        let mut subs = subsystems();
        subs.sntp_client = Some(Box::new(Noop));
        assert!(Instance::new(NodeConfig::default(), subs, Box::new(Noop)).is_err());
    }

    #[test]
    fn test_mtd_has_no_child_slots() {
        let mut config = NodeConfig::default();
        config.device_type = DeviceType::Mtd;
        let instance = Instance::new(config, subsystems(), Box::new(Noop)).unwrap();
        assert_eq!(instance.child_table().max_children(), 0);
        assert!(instance.backbone().is_none());
    }

    #[test]
    fn test_up_down_attaches_backbone_resources() {
        let mut instance = Instance::new(bbr_config(), subsystems(), Box::new(Noop)).unwrap();

        instance.up();
        assert!(instance.is_up());
        assert!(instance.netif().tmf().has_resource(crate::tmf::URI_MLR));
        assert!(instance.netif().tmf().has_resource(crate::tmf::URI_DUA_REGISTRATION));

        instance.down();
        assert!(!instance.is_up());
        assert!(!instance.netif().tmf().has_resource(crate::tmf::URI_MLR));
        assert_eq!(instance.notifier().signal_count(Events::THREAD_NETIF_STATE), 2);
    }

    #[test]
    fn test_set_role_signals_and_joins_router_groups() {
        let mut instance = Instance::new(NodeConfig::default(), subsystems(), Box::new(Noop)).unwrap();

        instance.set_role(DeviceRole::Router);
        instance.set_role(DeviceRole::Router);
        assert_eq!(instance.notifier().signal_count(Events::ROLE), 1);
        assert!(instance
            .netif()
            .is_multicast_subscribed(&Ip6Address::REALM_LOCAL_ALL_ROUTERS));

        instance.set_role(DeviceRole::Child);
        assert!(!instance
            .netif()
            .is_multicast_subscribed(&Ip6Address::LINK_LOCAL_ALL_ROUTERS));
    }

    #[test]
    fn test_down_signals_role_reset() {
        let mut instance = Instance::new(NodeConfig::default(), subsystems(), Box::new(Noop)).unwrap();

        instance.up();
        instance.set_role(DeviceRole::Router);
        assert_eq!(instance.notifier().signal_count(Events::ROLE), 1);

        instance.down();
        assert_eq!(instance.mle().role(), DeviceRole::Disabled);
        assert_eq!(instance.notifier().signal_count(Events::ROLE), 2);

        // Already disabled: the next cycle leaves the role untouched
        instance.up();
        instance.down();
        assert_eq!(instance.notifier().signal_count(Events::ROLE), 2);
    }

    #[test]
    fn test_backbone_calls_without_backbone_router() {
        let mut instance = Instance::new(NodeConfig::default(), subsystems(), Box::new(Noop)).unwrap();
        assert!(matches!(
            instance.set_backbone_router_state(BackboneRouterState::Primary),
            Err(MeshError::Disabled(_))
        ));
        assert!(matches!(
            instance.config_next_dua_registration_response(None, DuaStatus::Duplicate),
            Err(MeshError::Disabled(_))
        ));
    }

    #[test]
    fn test_backbone_state_change_signals() {
        let mut instance = Instance::new(bbr_config(), subsystems(), Box::new(Noop)).unwrap();
        instance
            .set_backbone_router_state(BackboneRouterState::Primary)
            .unwrap();
        instance
            .set_backbone_router_state(BackboneRouterState::Primary)
            .unwrap();
        assert_eq!(
            instance.notifier().signal_count(Events::BACKBONE_ROUTER_STATE),
            1
        );
        assert!(instance.backbone().unwrap().borrow().is_primary());
    }
}
