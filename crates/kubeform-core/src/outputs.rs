//! Per-cluster connection info exported after a run

use crate::files;
use crate::inventory::ClusterAddresses;
use crate::layout::ClusterFiles;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the exported output
pub const CLUSTERS_OUTPUT: &str = "clusters";

const MASK: &str = "[secret]";
const SECRET_FIELDS: [&str; 3] = ["kubeconfig", "inventory", "privateKey"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointType {
    LoadBalancer,
    NodePort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Where applications are reached
    pub app: String,

    #[serde(rename = "cluster-api")]
    pub cluster_api: String,

    #[serde(rename = "type")]
    pub endpoint_type: EndpointType,
}

impl Endpoints {
    /// Load balancer when present; otherwise the first worker (or the first
    /// control plane node) for apps and the first control plane node for the API
    pub fn from_addresses(addresses: &ClusterAddresses) -> Option<Self> {
        if let Some(lb) = &addresses.load_balancer {
            return Some(Self {
                app: lb.address.clone(),
                cluster_api: lb.address.clone(),
                endpoint_type: EndpointType::LoadBalancer,
            });
        }

        let master = addresses.masters.first()?;
        let app = addresses.workers.first().unwrap_or(master);
        Some(Self {
            app: app.address.clone(),
            cluster_api: master.address.clone(),
            endpoint_type: EndpointType::NodePort,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOutput {
    pub endpoints: Endpoints,
    pub kubeconfig: String,
    pub inventory: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl ClusterOutput {
    /// None when any of the generated files cannot be read
    pub async fn collect(
        addresses: &ClusterAddresses,
        files: &ClusterFiles,
        private_key_path: &Path,
    ) -> Option<Self> {
        let endpoints = Endpoints::from_addresses(addresses)?;
        let kubeconfig = files::read_optional(&files.kubeconfig).await?;
        let inventory = files::read_optional(&files.inventory).await?;
        let private_key = files::read_optional(private_key_path).await?;

        Some(Self {
            endpoints,
            kubeconfig,
            inventory,
            private_key,
        })
    }
}

/// `[{name: output-or-null}, ...]`
pub fn clusters_value<'a>(
    outputs: impl IntoIterator<Item = (&'a str, Option<ClusterOutput>)>,
) -> serde_json::Value {
    serde_json::Value::Array(
        outputs
            .into_iter()
            .map(|(name, output)| {
                let mut entry = serde_json::Map::new();
                entry.insert(
                    name.to_string(),
                    serde_json::to_value(output).unwrap_or(serde_json::Value::Null),
                );
                serde_json::Value::Object(entry)
            })
            .collect(),
    )
}

/// Replace kubeconfigs, inventories and private keys with a placeholder
pub fn redact(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if SECRET_FIELDS.contains(&key.as_str()) && !v.is_null() {
                        serde_json::Value::String(MASK.to_string())
                    } else {
                        redact(v)
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryHost;
    use serde_json::json;

    fn addresses(lb: bool, workers: usize) -> ClusterAddresses {
        ClusterAddresses {
            load_balancer: lb.then(|| InventoryHost::new("a-loadbal", "10.0.0.1")),
            masters: vec![InventoryHost::new("a-master-0", "10.0.0.2")],
            workers: (0..workers)
                .map(|i| InventoryHost::new(format!("a-worker-{}", i), format!("10.0.1.{}", i)))
                .collect(),
        }
    }

    #[test]
    fn test_load_balancer_endpoints() {
        let endpoints = Endpoints::from_addresses(&addresses(true, 2)).unwrap();
        assert_eq!(endpoints.app, "10.0.0.1");
        assert_eq!(endpoints.cluster_api, "10.0.0.1");
        assert_eq!(endpoints.endpoint_type, EndpointType::LoadBalancer);
    }

    #[test]
    fn test_node_port_endpoints_prefer_workers() {
        let endpoints = Endpoints::from_addresses(&addresses(false, 2)).unwrap();
        assert_eq!(endpoints.app, "10.0.1.0");
        assert_eq!(endpoints.cluster_api, "10.0.0.2");
        assert_eq!(endpoints.endpoint_type, EndpointType::NodePort);

        let single = Endpoints::from_addresses(&addresses(false, 0)).unwrap();
        assert_eq!(single.app, "10.0.0.2");
    }

    #[test]
    fn test_endpoint_serialization() {
        let value = serde_json::to_value(Endpoints::from_addresses(&addresses(false, 0))).unwrap();
        assert_eq!(
            value,
            json!({"app": "10.0.0.2", "cluster-api": "10.0.0.2", "type": "NodePort"})
        );
    }

    #[tokio::test]
    async fn test_collect_requires_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = ClusterFiles::new(dir.path(), "a");
        let key = dir.path().join("id_rsa");

        std::fs::write(&files.inventory, "[masters]").unwrap();
        std::fs::write(&key, "KEY").unwrap();
        assert!(ClusterOutput::collect(&addresses(false, 0), &files, &key).await.is_none());

        std::fs::write(&files.kubeconfig, "apiVersion: v1").unwrap();
        let output = ClusterOutput::collect(&addresses(false, 0), &files, &key)
            .await
            .unwrap();
        assert_eq!(output.kubeconfig, "apiVersion: v1");
        assert_eq!(output.private_key, "KEY");
    }

    #[test]
    fn test_clusters_value_and_redact() {
        let output = ClusterOutput {
            endpoints: Endpoints::from_addresses(&addresses(true, 0)).unwrap(),
            kubeconfig: "apiVersion: v1".to_string(),
            inventory: "[masters]".to_string(),
            private_key: "KEY".to_string(),
        };
        let value = clusters_value(vec![("a", Some(output)), ("b", None)]);

        assert_eq!(value[0]["a"]["privateKey"], "KEY");
        assert!(value[1]["b"].is_null());

        let redacted = redact(&value);
        assert_eq!(redacted[0]["a"]["privateKey"], MASK);
        assert_eq!(redacted[0]["a"]["kubeconfig"], MASK);
        assert_eq!(redacted[0]["a"]["endpoints"]["app"], "10.0.0.1");
        assert!(redacted[1]["b"].is_null());
    }
}
