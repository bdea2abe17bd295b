//! Control-plane core of a 6LoWPAN mesh node.
//!
//! This crate provides the addressing and admission layer of the stack:
//!
//! - [`NeighborTable`]: resolves short, extended, link and IPv6 addresses to
//!   the single neighbor record that owns them
//! - [`ThreadNetif`]: the network interface up/down lifecycle
//! - [`TmfFilter`]: the gate deciding which messages count as mesh-management
//!   traffic
//! - [`BackboneRouterManager`]: multicast listener and domain unicast address
//!   registration server
//! - [`Instance`]: owns all of the above and wires them together
//!
//! # Architecture
//!
//! Everything runs on one execution context:
//!
//! 1. The embedder's event loop hands an inbound management message to
//!    [`Instance::handle_tmf_message`]
//! 2. The TMF filter admits or rejects it by source/destination scope
//! 3. The agent dispatches it by URI to a registered resource
//! 4. The resource consults its tables and returns at most one response,
//!    which the [`TmfTransport`] sends
//!
//! Resources exist only while the interface is up.
//!
//! # Example
//!
//! ```ignore
//! use mesh_core::{Instance, NodeConfig, NetifSubsystems};
//!
//! let config = NodeConfig::load_or_default("/etc/mesh/node.toml")?;
//! let mut instance = Instance::new(config, NetifSubsystems::new(mac, forwarder), transport)?;
//! instance.up();
//!
//! if let Some(n) = instance.neighbor_table().find_neighbor_by_short(rloc16) {
//!     println!("{} is a {}", n.ext_address(), n.role());
//! }
//! ```

pub mod bbr;
pub mod child_table;
pub mod config;
pub mod error;
pub mod instance;
pub mod mle;
pub mod neighbor;
pub mod neighbor_table;
pub mod netif;
pub mod network_data;
pub mod notifier;
pub mod router_table;
pub mod tmf;

pub use bbr::{
    BackboneRouterManager, BackboneRouterState, DuaResponseOverride, DuaStatus, MlrStatus,
};
pub use child_table::ChildTable;
pub use config::{BackboneRouterConfig, DeviceType, FeatureConfig, NodeConfig};
pub use error::{MeshError, Result};
pub use instance::Instance;
pub use mle::{DeviceRole, Mle};
pub use neighbor::{
    AddressMatcher, Child, Neighbor, NeighborInfo, NeighborRef, NeighborRole, NeighborState,
    Router, StateFilter,
};
pub use neighbor_table::{NeighborInfoIterator, NeighborTable};
pub use netif::{LinkLayer, NetifSubsystems, Subsystem, ThreadNetif};
pub use network_data::{ExternalRoute, NetworkData, RouteMatch, RoutePreference};
pub use notifier::{Events, Notifier};
pub use router_table::{RouterTable, MAX_ROUTER_ID};
pub use tmf::{
    MessageInfo, MessageInterceptor, TmfAgent, TmfField, TmfFields, TmfFilter, TmfMessage,
    TmfResponse, TmfTransport,
};
