//! Node layout and naming
//!
//! Turns a cluster definition into the concrete list of nodes to boot and
//! the names of every file generated for it.

use crate::error::{KubeformError, Result};
use crate::topology::{Cluster, Topology};
use kubeform_cloud::InstanceSpec;
use kubeform_config::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PRIVATE_KEY_FILE: &str = "id_rsa";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    LoadBalancer,
    ControlPlane,
    Worker,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::LoadBalancer => write!(f, "load balancer"),
            NodeRole::ControlPlane => write!(f, "control plane"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

/// One node to boot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub cluster: String,
    pub role: NodeRole,
    pub instance: InstanceSpec,
    /// Floating IP name, when floating IPs are enabled
    pub floating_ip: Option<String>,
}

impl NodeSpec {
    pub fn name(&self) -> &str {
        &self.instance.name
    }
}

/// Every node of one cluster
#[derive(Debug, Clone)]
pub struct ClusterLayout {
    pub name: String,
    pub load_balancer: Option<NodeSpec>,
    pub masters: Vec<NodeSpec>,
    pub workers: Vec<NodeSpec>,
}

impl ClusterLayout {
    pub fn build(name: &str, cluster: &Cluster, settings: &Settings) -> Self {
        let os = &settings.openstack;
        let node = |node_name: String, role: NodeRole, flavor: &str| NodeSpec {
            cluster: name.to_string(),
            role,
            floating_ip: os
                .assign_floating_ips
                .then(|| floating_ip_name(&node_name)),
            instance: InstanceSpec {
                name: node_name,
                flavor: flavor.to_string(),
                image: os.image.clone(),
                keypair: settings.keypair_name.clone(),
                network: os.network.clone(),
            },
        };

        let load_balancer = cluster.needs_load_balancer().then(|| {
            node(
                format!("{}-loadbal", name),
                NodeRole::LoadBalancer,
                &os.flavors.load_balancer,
            )
        });

        // Without workers the control plane also runs workloads, so it gets
        // the worker flavor
        let master_count = cluster.control_plane.node_count;
        let masters = (0..master_count)
            .map(|i| {
                if cluster.worker.node_count == 0 {
                    let node_name = if master_count == 1 {
                        format!("{}-master-worker", name)
                    } else {
                        format!("{}-master-worker-{}", name, i)
                    };
                    node(node_name, NodeRole::ControlPlane, &os.flavors.worker)
                } else {
                    node(
                        format!("{}-master-{}", name, i),
                        NodeRole::ControlPlane,
                        &os.flavors.master,
                    )
                }
            })
            .collect();

        let workers = (0..cluster.worker.node_count)
            .map(|i| {
                node(
                    format!("{}-worker-{}", name, i),
                    NodeRole::Worker,
                    &os.flavors.worker,
                )
            })
            .collect();

        Self {
            name: name.to_string(),
            load_balancer,
            masters,
            workers,
        }
    }

    /// All nodes, load balancer first
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.load_balancer
            .iter()
            .chain(self.masters.iter())
            .chain(self.workers.iter())
    }
}

/// Layouts for every cluster, in name order
///
/// Node names share one namespace across clusters: `x` with three control
/// plane nodes and no workers boots `x-master-worker-0`, and so does
/// `x-master` with one control plane node and one worker.
pub fn build_layouts(topology: &Topology, settings: &Settings) -> Result<Vec<ClusterLayout>> {
    let layouts: Vec<ClusterLayout> = topology
        .clusters
        .iter()
        .map(|(name, cluster)| ClusterLayout::build(name, cluster, settings))
        .collect();

    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for layout in &layouts {
        for node in layout.nodes() {
            if let Some(other) = owners.insert(node.name(), &layout.name) {
                return Err(KubeformError::InvalidTopology(format!(
                    "node name '{}' is used by clusters '{}' and '{}'",
                    node.name(),
                    other,
                    layout.name
                )));
            }
        }
    }

    Ok(layouts)
}

pub fn floating_ip_name(node_name: &str) -> String {
    format!("fip-{}", node_name)
}

pub fn inventory_command_name(cluster: &str) -> String {
    format!("gen-inventory-{}", cluster)
}

pub fn install_command_name(cluster: &str) -> String {
    format!("ansible-installk8s-{}", cluster)
}

/// Files generated for one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterFiles {
    pub inventory: PathBuf,
    pub variables: PathBuf,
    pub kubeconfig: PathBuf,
    pub ansible_log: PathBuf,
}

impl ClusterFiles {
    pub fn new(output_dir: &Path, cluster: &str) -> Self {
        Self {
            inventory: output_dir.join(format!("inventory-{}.ini", cluster)),
            variables: output_dir.join(format!("variables-{}.yaml", cluster)),
            kubeconfig: output_dir.join(format!("cluster-{}.kubeconfig", cluster)),
            ansible_log: output_dir.join(format!("ansible-{}.log", cluster)),
        }
    }
}
