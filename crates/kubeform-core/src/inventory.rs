//! Ansible inventory and variables rendering

use crate::error::{KubeformError, Result};
use crate::files;
use crate::layout::{ClusterFiles, PRIVATE_KEY_FILE};
use crate::topology::{Cluster, LoadBalancerDef, Ntp};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

const INVENTORY_TEMPLATE: &str = include_str!("templates/inventory.ini.tera");
const VARIABLES_TEMPLATE: &str = include_str!("templates/variables.yaml.tera");

/// A provisioned node and the address Ansible reaches it on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryHost {
    pub name: String,
    pub address: String,
}

impl InventoryHost {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Addresses of every node in a cluster, once all of them exist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAddresses {
    pub load_balancer: Option<InventoryHost>,
    pub masters: Vec<InventoryHost>,
    pub workers: Vec<InventoryHost>,
}

impl ClusterAddresses {
    /// Stable `name=address` list, used to detect host changes
    pub fn host_list(&self) -> Vec<String> {
        self.load_balancer
            .iter()
            .chain(&self.masters)
            .chain(&self.workers)
            .map(|h| format!("{}={}", h.name, h.address))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub cluster_name: String,
    pub user: String,
    pub load_balancer_ip: Option<String>,
    pub load_balancer: Option<InventoryHost>,
    pub port_mappings: LoadBalancerDef,
    pub masters: Vec<InventoryHost>,
    pub workers: Vec<InventoryHost>,
    pub cni: String,
    pub cri: String,
    pub k8s_version: String,
    pub private_registry: String,
    pub insecure_registries: Vec<String>,
    pub ntp: Ntp,
}

impl Inventory {
    pub fn new(name: &str, cluster: &Cluster, user: &str, addresses: &ClusterAddresses) -> Self {
        Self {
            cluster_name: name.to_string(),
            user: user.to_string(),
            load_balancer_ip: addresses.load_balancer.as_ref().map(|h| h.address.clone()),
            load_balancer: addresses.load_balancer.clone(),
            port_mappings: cluster.load_balancer.clone(),
            masters: addresses.masters.clone(),
            workers: addresses.workers.clone(),
            cni: cluster.cni.clone(),
            cri: cluster.cri.clone(),
            k8s_version: cluster.kubernetes_version.clone(),
            private_registry: cluster.private_registry.clone(),
            insecure_registries: cluster.insecure_registries.clone(),
            ntp: cluster.ntp.clone(),
        }
    }

    /// The API server address: the load balancer if there is one
    pub fn control_plane_endpoint(&self) -> Option<&str> {
        self.load_balancer_ip
            .as_deref()
            .or_else(|| self.masters.first().map(|h| h.address.as_str()))
    }

    fn context(&self) -> Result<Context> {
        let mut context = Context::from_serialize(self).map_err(|e| KubeformError::Template {
            template: "context".to_string(),
            message: e.to_string(),
        })?;
        context.insert("private_key_file", &format!("./{}", PRIVATE_KEY_FILE));
        context.insert(
            "kubeconfig_file",
            &format!("cluster-{}.kubeconfig", self.cluster_name),
        );
        context.insert("control_plane_endpoint", &self.control_plane_endpoint());
        context.insert("load_balancer_enabled", &self.load_balancer.is_some());
        context.insert(
            "has_port_mappings",
            &!self.port_mappings.port_mappings.is_empty(),
        );
        // Templates iterate the mappings directly
        context.insert("port_mappings", &self.port_mappings.port_mappings);
        Ok(context)
    }

    /// Render (inventory.ini, variables.yaml)
    pub fn render(&self) -> Result<(String, String)> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("inventory.ini", INVENTORY_TEMPLATE),
            ("variables.yaml", VARIABLES_TEMPLATE),
        ])
        .map_err(|e| template_error("templates", e))?;

        let context = self.context()?;
        let inventory = tera
            .render("inventory.ini", &context)
            .map_err(|e| template_error("inventory.ini", e))?;
        let variables = tera
            .render("variables.yaml", &context)
            .map_err(|e| template_error("variables.yaml", e))?;

        Ok((inventory, variables))
    }

    /// Render and write both files for this cluster
    pub async fn write(&self, files: &ClusterFiles) -> Result<()> {
        let (inventory, variables) = self.render()?;
        files::write_atomic(&files.inventory, inventory.as_bytes(), None).await?;
        files::write_atomic(&files.variables, variables.as_bytes(), None).await?;
        tracing::info!(
            cluster = %self.cluster_name,
            inventory = %files.inventory.display(),
            "Generated inventory"
        );
        Ok(())
    }
}

/// Tera hides the useful part of the message in the error source chain
fn template_error(template: &str, e: tera::Error) -> KubeformError {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    KubeformError::Template {
        template: template.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::cluster;
    use crate::topology::PortMapping;

    fn ha_addresses() -> ClusterAddresses {
        ClusterAddresses {
            load_balancer: Some(InventoryHost::new("prod-loadbal", "203.0.113.1")),
            masters: vec![
                InventoryHost::new("prod-master-0", "203.0.113.2"),
                InventoryHost::new("prod-master-1", "203.0.113.3"),
                InventoryHost::new("prod-master-2", "203.0.113.4"),
            ],
            workers: vec![InventoryHost::new("prod-worker-0", "203.0.113.5")],
        }
    }

    #[test]
    fn test_render_ha_inventory() {
        let mut def = cluster(3, 1);
        def.load_balancer.port_mappings.insert(
            "http".to_string(),
            PortMapping {
                source: 80,
                target: 30080,
            },
        );
        def.insecure_registries = vec!["registry.local:5000".to_string()];

        let inventory = Inventory::new("prod", &def, "ubuntu", &ha_addresses());
        let (ini, vars) = inventory.render().unwrap();

        assert!(ini.contains("ansible_user=ubuntu"));
        assert!(ini.contains("ansible_ssh_private_key_file=./id_rsa"));
        assert!(ini.contains("[loadbalancer]\nprod-loadbal ansible_host=203.0.113.1\n"));
        assert!(ini.contains(
            "[masters]\nprod-master-0 ansible_host=203.0.113.2\nprod-master-1 ansible_host=203.0.113.3\nprod-master-2 ansible_host=203.0.113.4\n"
        ));
        assert!(ini.contains("[workers]\nprod-worker-0 ansible_host=203.0.113.5\n"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&vars).unwrap();
        assert_eq!(parsed["cluster_name"], "prod");
        assert_eq!(parsed["kubernetes_version"], "1.29.2");
        assert_eq!(parsed["control_plane_endpoint"], "203.0.113.1");
        assert_eq!(parsed["kubeconfig_dest"], "cluster-prod.kubeconfig");
        assert_eq!(parsed["insecure_registries"][0], "registry.local:5000");
        assert_eq!(parsed["load_balancer"]["enabled"], true);
        assert_eq!(parsed["load_balancer"]["address"], "203.0.113.1");
        assert_eq!(parsed["load_balancer"]["port_mappings"]["http"]["target"], 30080);
    }

    #[test]
    fn test_render_single_node_inventory() {
        let addresses = ClusterAddresses {
            load_balancer: None,
            masters: vec![InventoryHost::new("dev-master-worker", "198.51.100.9")],
            workers: Vec::new(),
        };
        let inventory = Inventory::new("dev", &cluster(1, 0), "centos", &addresses);
        let (ini, vars) = inventory.render().unwrap();

        assert!(ini.contains("[loadbalancer]\n\n[masters]"));
        assert!(ini.contains("[workers]\n\n[k8s_cluster:children]"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&vars).unwrap();
        assert_eq!(parsed["control_plane_endpoint"], "198.51.100.9");
        assert_eq!(parsed["load_balancer"]["enabled"], false);
        assert!(parsed["load_balancer"]["address"].is_null());
        assert!(
            parsed["load_balancer"]["port_mappings"]
                .as_mapping()
                .unwrap()
                .is_empty()
        );
        assert_eq!(parsed["private_registry"], "");
    }

    #[test]
    fn test_yaml_special_characters_are_quoted() {
        let mut def = cluster(1, 0);
        def.private_registry = "reg: with # specials".to_string();
        let addresses = ClusterAddresses {
            masters: vec![InventoryHost::new("dev-master-worker", "198.51.100.9")],
            ..Default::default()
        };
        let (_, vars) = Inventory::new("dev", &def, "ubuntu", &addresses).render().unwrap();

        let parsed: serde_yaml::Value = serde_yaml::from_str(&vars).unwrap();
        assert_eq!(parsed["private_registry"], "reg: with # specials");
    }

    #[test]
    fn test_host_list() {
        assert_eq!(
            ha_addresses().host_list()[..2],
            ["prod-loadbal=203.0.113.1", "prod-master-0=203.0.113.2"]
        );
    }

    #[tokio::test]
    async fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = ClusterFiles::new(dir.path(), "prod");
        let inventory = Inventory::new("prod", &cluster(3, 1), "ubuntu", &ha_addresses());

        inventory.write(&files).await.unwrap();

        assert!(files.inventory.exists());
        assert!(files.variables.exists());
    }
}
