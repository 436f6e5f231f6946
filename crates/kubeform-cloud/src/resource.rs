//! Desired resources
//!
//! A [`ResourceSet`] is the full set of resources a topology asks for. It is
//! compared against the recorded state to build a [`Plan`](crate::Plan).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of resource managed by kubeform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    /// SSH key pair shared by all nodes
    Keypair,
    /// Compute instance
    Instance,
    /// Floating IP allocated from a pool
    FloatingIp,
    /// Binding of a floating IP to an instance
    FloatingIpAssociate,
    /// Local command with files to clean up on destroy
    Command,
}

impl ResourceType {
    /// Position in destroy order; lower values are destroyed first
    pub fn destroy_rank(self) -> u8 {
        match self {
            ResourceType::Command => 0,
            ResourceType::FloatingIpAssociate => 1,
            ResourceType::FloatingIp => 2,
            ResourceType::Instance => 3,
            ResourceType::Keypair => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Keypair => "keypair",
            ResourceType::Instance => "instance",
            ResourceType::FloatingIp => "floating-ip",
            ResourceType::FloatingIpAssociate => "floating-ip-associate",
            ResourceType::Command => "command",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the state key for a resource (`provider:type:name`)
pub fn resource_key(provider: &str, resource_type: ResourceType, name: &str) -> String {
    format!("{}:{}:{}", provider, resource_type, name)
}

/// Set of resources to be managed, ordered by key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        self.resources.insert(resource.key(), resource);
    }

    pub fn get(&self, key: &str) -> Option<&ResourceConfig> {
        self.resources.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_type(&self, resource_type: ResourceType) -> Vec<&ResourceConfig> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }
}

/// Configuration for a single desired resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub resource_type: ResourceType,

    /// Logical name (e.g. "prod-master-0", "fip-prod-master-0")
    pub name: String,

    /// Provider name ("openstack", "local")
    pub provider: String,

    /// Cluster the resource belongs to; None for shared resources
    pub cluster: Option<String>,

    /// Resource-specific configuration
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: ResourceType,
        name: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type,
            name: name.into(),
            provider: provider.into(),
            cluster: None,
            config,
        }
    }

    pub fn in_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn key(&self) -> String {
        resource_key(&self.provider, self.resource_type, &self.name)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_key_format() {
        let resource = ResourceConfig::new(
            ResourceType::FloatingIp,
            "fip-prod-master-0",
            "openstack",
            json!({ "pool": "public" }),
        )
        .in_cluster("prod");

        assert_eq!(resource.key(), "openstack:floating-ip:fip-prod-master-0");
        assert_eq!(resource.get_config::<String>("pool").as_deref(), Some("public"));
        assert_eq!(resource.cluster.as_deref(), Some("prod"));
    }

    #[test]
    fn test_destroy_rank_follows_dependencies() {
        let order = [
            ResourceType::Command,
            ResourceType::FloatingIpAssociate,
            ResourceType::FloatingIp,
            ResourceType::Instance,
            ResourceType::Keypair,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].destroy_rank() < pair[1].destroy_rank());
        }
    }

    #[test]
    fn test_resource_set_by_type() {
        let mut set = ResourceSet::new();
        set.add(ResourceConfig::new(ResourceType::Instance, "a-master-0", "openstack", json!({})));
        set.add(ResourceConfig::new(ResourceType::Instance, "a-worker-0", "openstack", json!({})));
        set.add(ResourceConfig::new(
            ResourceType::Keypair,
            "kubeadm-keypair",
            "openstack",
            json!({}),
        ));

        assert_eq!(set.len(), 3);
        assert_eq!(set.by_type(ResourceType::Instance).len(), 2);
        assert!(set.contains("openstack:keypair:kubeadm-keypair"));
    }
}
