//! Test fixtures for common mesh scenarios
//!
//! Provides reusable neighbors, node configurations and management messages

use mesh_core::config::DEFAULT_TMF_PORT;
use mesh_core::mle::DEFAULT_MESH_LOCAL_PREFIX;
use mesh_core::tmf::{URI_DUA_REGISTRATION, URI_MLR};
use mesh_core::{
    Child, MessageInfo, Neighbor, NeighborState, NodeConfig, Router, TmfField, TmfMessage,
};
use mesh_types::{ExtAddress, InterfaceIdentifier, Ip6Address, Ip6Prefix, ShortAddress};

/// Token carried by every fixture request.
pub const REQUEST_TOKEN: [u8; 2] = [0xa1, 0xb2];

/// Domain prefix used by backbone router fixtures.
pub const DOMAIN_PREFIX: Ip6Address = Ip6Address::new(0xfd00, 0x7d03, 0x7d03, 0x7d03, 0, 0, 0, 0);

/// Extended address `0a00:0000:0000:00nn`.
pub fn ext_address(n: u8) -> ExtAddress {
    ExtAddress::new([0x0a, 0, 0, 0, 0, 0, 0, n])
}

pub fn domain_prefix() -> Ip6Prefix {
    Ip6Prefix::from_64(&DOMAIN_PREFIX)
}

/// Address inside the fixture domain prefix.
pub fn domain_address(host: u16) -> Ip6Address {
    Ip6Address::new(0xfd00, 0x7d03, 0x7d03, 0x7d03, 0, 0, 0, host)
}

/// Mesh-local routing locator address for `rloc16` under the default prefix.
pub fn mesh_local_rloc(rloc16: u16) -> Ip6Address {
    Ip6Address::from_prefix_and_iid(
        &Ip6Prefix::from_64(&DEFAULT_MESH_LOCAL_PREFIX),
        &InterfaceIdentifier::from_locator(ShortAddress::new(rloc16)),
    )
}

/// Link-local address derived from an extended address.
pub fn link_local_of(ext: &ExtAddress) -> Ip6Address {
    Ip6Address::from_prefix_and_iid(
        &Ip6Prefix::from_64(&Ip6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 0)),
        &InterfaceIdentifier::from_ext_address(ext),
    )
}

/// Node configuration fixtures
pub mod config_fixtures {
    use super::*;

    /// Router-capable node with the backbone router enabled.
    pub fn backbone_router() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.features.backbone_router = true;
        config.backbone_router.domain_prefix = Some(domain_prefix());
        config
    }

    /// Backbone router that also accepts forced DUA responses.
    pub fn reference_backbone_router() -> NodeConfig {
        let mut config = backbone_router();
        config.features.reference_device = true;
        config
    }
}

/// Neighbor record fixtures
pub mod neighbor_fixtures {
    use super::*;

    /// Neighbor in state valid.
    pub fn valid_neighbor(n: u8, rloc16: u16) -> Neighbor {
        let mut neighbor = Neighbor::new(ext_address(n), ShortAddress::new(rloc16));
        neighbor.state = NeighborState::Valid;
        neighbor.rx_on_when_idle = true;
        neighbor.link_quality_in = 3;
        neighbor.average_rssi = -40;
        neighbor.last_rssi = -42;
        neighbor
    }

    pub fn child(n: u8, rloc16: u16) -> Child {
        Child::new(valid_neighbor(n, rloc16))
    }

    /// Router with its locator taken from `router_id`.
    pub fn router(n: u8, router_id: u8) -> Router {
        let mut router = Router::new(valid_neighbor(
            n,
            ShortAddress::from_router_id(router_id).value(),
        ));
        router.neighbor.full_thread_device = true;
        router.neighbor.full_network_data = true;
        router
    }
}

/// Management message fixtures
pub mod message_fixtures {
    use super::*;

    /// Confirmable multicast listener registration for `groups`.
    pub fn mlr_request(groups: &[Ip6Address]) -> TmfMessage {
        TmfMessage::post(URI_MLR)
            .with_token(REQUEST_TOKEN)
            .with_field(TmfField::Ip6Addresses(groups.to_vec()))
    }

    /// Commissioner-issued registration carrying an explicit timeout.
    pub fn commissioner_mlr_request(
        groups: &[Ip6Address],
        session_id: u16,
        timeout_secs: u32,
    ) -> TmfMessage {
        mlr_request(groups)
            .with_field(TmfField::CommissionerSessionId(session_id))
            .with_field(TmfField::Timeout(timeout_secs))
    }

    /// Confirmable DUA registration of `target` by the owner of `ml_iid`.
    pub fn dua_request(target: Ip6Address, ml_iid: InterfaceIdentifier) -> TmfMessage {
        TmfMessage::post(URI_DUA_REGISTRATION)
            .with_token(REQUEST_TOKEN)
            .with_field(TmfField::TargetEid(target))
            .with_field(TmfField::MlEid(ml_iid))
    }

    /// Mesh-local unicast between two routing locators.
    pub fn mesh_local_info(src_rloc16: u16, dst_rloc16: u16) -> MessageInfo {
        MessageInfo::new(
            mesh_local_rloc(src_rloc16),
            mesh_local_rloc(dst_rloc16),
            DEFAULT_TMF_PORT,
        )
    }

    /// Link-local unicast from the owner of `src` to the owner of `dst`.
    pub fn link_local_info(src: &ExtAddress, dst: &ExtAddress) -> MessageInfo {
        MessageInfo::new(link_local_of(src), link_local_of(dst), DEFAULT_TMF_PORT)
    }

    /// Global-scope source addressing a mesh-local destination.
    pub fn off_mesh_info(dst_rloc16: u16) -> MessageInfo {
        MessageInfo::new(
            Ip6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
            mesh_local_rloc(dst_rloc16),
            DEFAULT_TMF_PORT,
        )
    }
}
