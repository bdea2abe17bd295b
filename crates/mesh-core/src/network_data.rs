//! Network data: on-mesh prefixes and external routes.

use crate::error::{MeshError, Result};
use mesh_types::{Ip6Address, Ip6Prefix, ShortAddress};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

/// Route preference advertised with an external route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePreference {
    Low,
    #[default]
    Medium,
    High,
}

/// A route to an off-mesh prefix through a border router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRoute {
    pub prefix: Ip6Prefix,
    pub rloc16: ShortAddress,
    #[serde(default)]
    pub preference: RoutePreference,
}

/// Best external route for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMatch {
    /// Length of the matched route prefix.
    pub prefix_match: u8,
    /// Border router owning the route.
    pub rloc16: ShortAddress,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkData {
    on_mesh_prefixes: Vec<Ip6Prefix>,
    external_routes: Vec<ExternalRoute>,
}

impl NetworkData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_on_mesh_prefix(&mut self, prefix: Ip6Prefix) -> Result<()> {
        if self.on_mesh_prefixes.contains(&prefix) {
            return Err(MeshError::Duplicated);
        }
        self.on_mesh_prefixes.push(prefix);
        Ok(())
    }

    pub fn remove_on_mesh_prefix(&mut self, prefix: &Ip6Prefix) -> Result<()> {
        let before = self.on_mesh_prefixes.len();
        self.on_mesh_prefixes.retain(|p| p != prefix);
        if self.on_mesh_prefixes.len() == before {
            return Err(MeshError::NotFound);
        }
        Ok(())
    }

    /// Adds an external route. A route for the same prefix and owner is
    /// replaced.
    pub fn add_external_route(&mut self, route: ExternalRoute) {
        self.external_routes
            .retain(|r| !(r.prefix == route.prefix && r.rloc16 == route.rloc16));
        self.external_routes.push(route);
    }

    pub fn remove_external_route(&mut self, prefix: &Ip6Prefix, rloc16: ShortAddress) -> Result<()> {
        let before = self.external_routes.len();
        self.external_routes
            .retain(|r| !(r.prefix == *prefix && r.rloc16 == rloc16));
        if self.external_routes.len() == before {
            return Err(MeshError::NotFound);
        }
        Ok(())
    }

    pub fn on_mesh_prefixes(&self) -> &[Ip6Prefix] {
        &self.on_mesh_prefixes
    }

    pub fn external_routes(&self) -> &[ExternalRoute] {
        &self.external_routes
    }

    pub fn clear(&mut self) {
        self.on_mesh_prefixes.clear();
        self.external_routes.clear();
    }

    /// Finds the border router best suited to forward `destination`.
    ///
    /// The source must lie within an on-mesh prefix. Among the external
    /// routes covering the destination the longest prefix wins, then the
    /// highest preference, then the lowest RLOC16.
    pub fn route_lookup(&self, source: &Ip6Address, destination: &Ip6Address) -> Result<RouteMatch> {
        if !self.on_mesh_prefixes.iter().any(|p| p.contains(source)) {
            debug!(source = %source, "Route lookup source is not on-mesh");
            return Err(MeshError::NotFound);
        }

        self.external_routes
            .iter()
            .filter(|r| r.prefix.contains(destination))
            .min_by_key(|r| (Reverse(r.prefix.length()), Reverse(r.preference), r.rloc16))
            .map(|r| RouteMatch {
                prefix_match: r.prefix.length(),
                rloc16: r.rloc16,
            })
            .ok_or(MeshError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(prefix: &str, rloc16: u16, preference: RoutePreference) -> ExternalRoute {
        ExternalRoute {
            prefix: prefix.parse().unwrap(),
            rloc16: ShortAddress::new(rloc16),
            preference,
        }
    }

    fn network_data() -> NetworkData {
        let mut nd = NetworkData::new();
        nd.add_on_mesh_prefix("2001:db8:1::/64".parse().unwrap()).unwrap();
        nd
    }

    fn src() -> Ip6Address {
        "2001:db8:1::10".parse().unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut nd = network_data();
        nd.add_external_route(route("::/0", 0x0400, RoutePreference::High));
        nd.add_external_route(route("2001:db8:2::/48", 0x0800, RoutePreference::Low));

        let m = nd.route_lookup(&src(), &"2001:db8:2::1".parse().unwrap()).unwrap();
        assert_eq!(m, RouteMatch { prefix_match: 48, rloc16: ShortAddress::new(0x0800) });

        let m = nd.route_lookup(&src(), &"2600::1".parse().unwrap()).unwrap();
        assert_eq!(m.rloc16, ShortAddress::new(0x0400));
        assert_eq!(m.prefix_match, 0);
    }

    #[test]
    fn test_preference_then_rloc_break_ties() {
        let mut nd = network_data();
        nd.add_external_route(route("::/0", 0x0c00, RoutePreference::Medium));
        nd.add_external_route(route("::/0", 0x0800, RoutePreference::High));
        nd.add_external_route(route("::/0", 0x0400, RoutePreference::High));

        let m = nd.route_lookup(&src(), &"2600::1".parse().unwrap()).unwrap();
        assert_eq!(m.rloc16, ShortAddress::new(0x0400));
    }

    #[test]
    fn test_source_must_be_on_mesh() {
        let mut nd = network_data();
        nd.add_external_route(route("::/0", 0x0400, RoutePreference::Medium));

        let off_mesh: Ip6Address = "2001:db8:9::1".parse().unwrap();
        assert!(matches!(
            nd.route_lookup(&off_mesh, &"2600::1".parse().unwrap()),
            Err(MeshError::NotFound)
        ));
    }

    #[test]
    fn test_no_covering_route() {
        let mut nd = network_data();
        nd.add_external_route(route("2001:db8:2::/48", 0x0800, RoutePreference::Low));
        assert!(nd.route_lookup(&src(), &"2600::1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_route_replace_and_remove() {
        let mut nd = network_data();
        nd.add_external_route(route("::/0", 0x0400, RoutePreference::Low));
        nd.add_external_route(route("::/0", 0x0400, RoutePreference::High));
        assert_eq!(nd.external_routes().len(), 1);
        assert_eq!(nd.external_routes()[0].preference, RoutePreference::High);

        let default: Ip6Prefix = "::/0".parse().unwrap();
        nd.remove_external_route(&default, ShortAddress::new(0x0400)).unwrap();
        assert!(nd.remove_external_route(&default, ShortAddress::new(0x0400)).is_err());
    }

    #[test]
    fn test_on_mesh_prefix_duplicates() {
        let mut nd = network_data();
        assert!(matches!(
            nd.add_on_mesh_prefix("2001:db8:1::/64".parse().unwrap()),
            Err(MeshError::Duplicated)
        ));
        nd.remove_on_mesh_prefix(&"2001:db8:1::/64".parse().unwrap()).unwrap();
        assert!(nd.on_mesh_prefixes().is_empty());
    }
}
