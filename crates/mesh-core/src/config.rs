//! Node configuration.
//!
//! Loads and validates the capability set of a mesh node from TOML. The
//! configuration is resolved once when an [`Instance`](crate::Instance) is
//! built; optional subsystems exist only when their feature flag is set.

use crate::error::{MeshError, Result};
use mesh_types::Ip6Prefix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Well-known UDP port of the mesh-management (TMF) dispatcher.
pub const DEFAULT_TMF_PORT: u16 = 61631;

/// Highest child id a router can hand out.
pub const MAX_CHILD_ID: u16 = 511;

/// Device capability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Full Thread Device: router capable, owns child and router tables.
    #[default]
    Ftd,
    /// Minimal Thread Device: only ever attaches to a parent.
    Mtd,
}

impl DeviceType {
    pub fn is_router_capable(&self) -> bool {
        matches!(self, DeviceType::Ftd)
    }
}

/// Optional subsystems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub channel_monitor: bool,

    #[serde(default)]
    pub dns_client: bool,

    #[serde(default)]
    pub sntp_client: bool,

    /// Secure (DTLS) management dispatcher.
    #[serde(default)]
    pub secure_tmf: bool,

    #[serde(default)]
    pub backbone_router: bool,

    /// Certification hooks such as the forced DUA registration response.
    #[serde(default)]
    pub reference_device: bool,
}

/// Backbone registration server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackboneRouterConfig {
    /// Registration lifetime granted to multicast listeners
    #[serde(default = "default_mlr_timeout")]
    pub mlr_timeout_secs: u32,

    /// Multicast listener table capacity
    #[serde(default = "default_mlr_table_size")]
    pub mlr_table_size: usize,

    /// Domain unicast address registry capacity
    #[serde(default = "default_dua_table_size")]
    pub dua_table_size: usize,

    /// Domain prefix DUAs must fall within
    #[serde(default)]
    pub domain_prefix: Option<Ip6Prefix>,
}

/// Complete node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub device_type: DeviceType,

    #[serde(default = "default_tmf_port")]
    pub tmf_port: u16,

    #[serde(default = "default_max_children")]
    pub max_children: u16,

    #[serde(default)]
    pub features: FeatureConfig,

    #[serde(default)]
    pub backbone_router: BackboneRouterConfig,
}

fn default_tmf_port() -> u16 {
    DEFAULT_TMF_PORT
}

fn default_max_children() -> u16 {
    10
}

fn default_mlr_timeout() -> u32 {
    3600
}

fn default_mlr_table_size() -> usize {
    75
}

fn default_dua_table_size() -> usize {
    16
}

impl Default for BackboneRouterConfig {
    fn default() -> Self {
        Self {
            mlr_timeout_secs: default_mlr_timeout(),
            mlr_table_size: default_mlr_table_size(),
            dua_table_size: default_dua_table_size(),
            domain_prefix: None,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::default(),
            tmf_port: default_tmf_port(),
            max_children: default_max_children(),
            features: FeatureConfig::default(),
            backbone_router: BackboneRouterConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(MeshError::Io(e)),
        }
    }

    /// Get the multicast listener registration lifetime as Duration
    pub fn mlr_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.backbone_router.mlr_timeout_secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tmf_port == 0 {
            return Err(MeshError::config("tmf_port", "must be > 0"));
        }

        if self.max_children > MAX_CHILD_ID {
            return Err(MeshError::config(
                "max_children",
                format!("must be at most {}", MAX_CHILD_ID),
            ));
        }

        if self.features.backbone_router {
            if !self.device_type.is_router_capable() {
                return Err(MeshError::config(
                    "features.backbone_router",
                    "requires a router-capable (ftd) device",
                ));
            }

            if self.backbone_router.mlr_timeout_secs == 0 {
                return Err(MeshError::config(
                    "backbone_router.mlr_timeout_secs",
                    "must be > 0",
                ));
            }

            if self.backbone_router.mlr_table_size == 0 || self.backbone_router.dua_table_size == 0
            {
                return Err(MeshError::config(
                    "backbone_router",
                    "registration tables must hold at least one entry",
                ));
            }

            if let Some(prefix) = &self.backbone_router.domain_prefix {
                if prefix.length() != 64 {
                    return Err(MeshError::config(
                        "backbone_router.domain_prefix",
                        format!("{} is not a /64", prefix),
                    ));
                }
            }
        }

        Ok(())
    }
}
