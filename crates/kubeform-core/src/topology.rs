//! Cluster topology
//!
//! The topology file lists every cluster to build:
//!
//! ```yaml
//! clusters:
//!   prod:
//!     kubernetes_version: "1.29.2"
//!     cni: calico
//!     cri: containerd
//!     control_plane:
//!       node_count: 3
//!     worker:
//!       node_count: 2
//!     load_balancer:
//!       create: true
//!       port_mappings:
//!         http: { source: 80, target: 30080 }
//! ```

use crate::error::{KubeformError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    /// Clusters by name
    #[serde(default)]
    pub clusters: BTreeMap<String, Cluster>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cluster {
    pub kubernetes_version: String,

    #[serde(default)]
    pub private_registry: String,

    #[serde(default)]
    pub insecure_registries: Vec<String>,

    #[serde(default)]
    pub load_balancer: LoadBalancerDef,

    #[serde(default)]
    pub ntp: Ntp,

    pub control_plane: NodeGroup,

    #[serde(default)]
    pub worker: NodeGroup,

    pub cni: String,

    pub cri: String,
}

impl Cluster {
    /// A load balancer node is built for HA control planes or on request
    pub fn needs_load_balancer(&self) -> bool {
        self.control_plane.node_count > 1 || self.load_balancer.create
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerDef {
    #[serde(default)]
    pub create: bool,

    #[serde(default)]
    pub port_mappings: BTreeMap<String, PortMapping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub source: u32,
    pub target: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ntp {
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub secondary: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroup {
    #[serde(default)]
    pub node_count: usize,
}

/// Read and validate a topology file
pub fn read_topology(path: &Path) -> Result<Topology> {
    let content = std::fs::read_to_string(path).map_err(|source| KubeformError::TopologyRead {
        path: path.to_path_buf(),
        source,
    })?;

    let topology: Topology =
        serde_yaml::from_str(&content).map_err(|source| KubeformError::TopologyParse {
            path: path.to_path_buf(),
            source,
        })?;

    topology.validate()?;
    tracing::debug!(
        path = %path.display(),
        clusters = topology.clusters.len(),
        "Loaded topology"
    );
    Ok(topology)
}

impl Topology {
    pub fn validate(&self) -> Result<()> {
        if self.clusters.is_empty() {
            return Err(KubeformError::InvalidTopology(
                "no clusters defined".to_string(),
            ));
        }

        for (name, cluster) in &self.clusters {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                return Err(KubeformError::InvalidTopology(format!(
                    "cluster name '{}' may only contain letters, digits and '-'",
                    name
                )));
            }

            if cluster.control_plane.node_count == 0 {
                return Err(KubeformError::InvalidTopology(format!(
                    "cluster '{}' needs at least one control plane node",
                    name
                )));
            }

            for (mapping_name, mapping) in &cluster.load_balancer.port_mappings {
                for port in [mapping.source, mapping.target] {
                    if !(1..=65535).contains(&port) {
                        return Err(KubeformError::InvalidTopology(format!(
                            "cluster '{}': port mapping '{}' has invalid port {}",
                            name, mapping_name, port
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn cluster_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }
}
