//! kubeform core
//!
//! Reads the cluster topology, lays out the nodes each cluster needs,
//! provisions them through a [`kubeform_cloud::CloudProvider`], renders the
//! Ansible inventory and runs the install playbook.

pub mod ansible;
pub mod deployer;
pub mod error;
pub mod files;
pub mod inventory;
pub mod layout;
pub mod outputs;
pub mod plan;
pub mod topology;

pub use ansible::AnsibleRunner;
pub use deployer::{ClusterReport, Deployer, UpOptions, UpReport};
pub use error::{KubeformError, Result};
pub use inventory::{ClusterAddresses, Inventory, InventoryHost};
pub use layout::{ClusterFiles, ClusterLayout, NodeRole, NodeSpec, build_layouts};
pub use outputs::{CLUSTERS_OUTPUT, ClusterOutput, EndpointType, Endpoints, redact};
pub use plan::{LOCAL_PROVIDER, desired_resources, diff};
pub use topology::{Cluster, Topology, read_topology};
