//! OpenStack provider implementation

use crate::cli::{CreateServerConfig, OpenStackCli, ServerInfo};
use crate::error::OpenStackError;
use async_trait::async_trait;
use kubeform_cloud::{
    AuthStatus, CloudProvider, FloatingIpInfo, InstanceInfo, InstanceSpec, KeypairInfo,
};

/// OpenStack provider backed by the `openstack` CLI
pub struct OpenStackProvider {
    cli: OpenStackCli,
    display_name: String,
}

impl OpenStackProvider {
    pub fn new(cloud: Option<String>) -> Self {
        let display_name = match &cloud {
            Some(cloud) => format!("OpenStack ({})", cloud),
            None => "OpenStack".to_string(),
        };
        Self {
            cli: OpenStackCli::new(cloud),
            display_name,
        }
    }

    pub fn with_cli(cli: OpenStackCli) -> Self {
        Self {
            cli,
            display_name: "OpenStack".to_string(),
        }
    }

    fn to_instance(server: ServerInfo, network: Option<&str>) -> InstanceInfo {
        InstanceInfo {
            fixed_ip: server.ipv4_address(network),
            id: server.id,
            name: server.name,
            status: server.status,
        }
    }
}

/// Deleting something that is already gone counts as success
fn ignore_missing(result: crate::Result<()>, what: &str) -> kubeform_cloud::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(OpenStackError::NotFound(_)) => {
            tracing::info!("{} already deleted", what);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CloudProvider for OpenStackProvider {
    fn name(&self) -> &str {
        "openstack"
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn check_auth(&self) -> kubeform_cloud::Result<AuthStatus> {
        match self.cli.check_auth().await {
            Ok(token) => {
                let account_info = match (token.project_id, token.user_id) {
                    (Some(project), Some(user)) => format!("project {} (user {})", project, user),
                    (Some(project), None) => format!("project {}", project),
                    _ => "Unknown".to_string(),
                };
                Ok(AuthStatus::ok(account_info))
            }
            Err(OpenStackError::CliNotFound) => {
                Ok(AuthStatus::failed("openstack CLI is not installed"))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn create_keypair(&self, name: &str) -> kubeform_cloud::Result<KeypairInfo> {
        tracing::info!("Creating key pair: {}", name);
        let private_key = self.cli.create_keypair(name).await?;
        Ok(KeypairInfo {
            name: name.to_string(),
            private_key,
        })
    }

    async fn delete_keypair(&self, name: &str) -> kubeform_cloud::Result<()> {
        tracing::info!("Deleting key pair: {}", name);
        ignore_missing(self.cli.delete_keypair(name).await, name)
    }

    async fn create_instance(&self, spec: &InstanceSpec) -> kubeform_cloud::Result<InstanceInfo> {
        tracing::info!(
            flavor = %spec.flavor,
            image = %spec.image,
            "Creating instance: {}",
            spec.name
        );

        let config = CreateServerConfig {
            name: spec.name.clone(),
            flavor: spec.flavor.clone(),
            image: spec.image.clone(),
            key_name: spec.keypair.clone(),
            network: spec.network.clone(),
        };

        let server = self.cli.create_server(&config).await?;
        if !server.is_active() {
            return Err(kubeform_cloud::CloudError::ApiError(format!(
                "instance {} ended in status {}",
                spec.name,
                server.status.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(Self::to_instance(server, Some(&spec.network)))
    }

    async fn get_instance(&self, id: &str) -> kubeform_cloud::Result<Option<InstanceInfo>> {
        let server = self.cli.show_server(id).await?;
        Ok(server.map(|s| Self::to_instance(s, None)))
    }

    async fn delete_instance(&self, id: &str) -> kubeform_cloud::Result<()> {
        tracing::info!("Deleting instance: {}", id);
        ignore_missing(self.cli.delete_server(id).await, id)
    }

    async fn create_floating_ip(&self, pool: &str) -> kubeform_cloud::Result<FloatingIpInfo> {
        let record = self.cli.create_floating_ip(pool).await?;
        tracing::info!("Allocated floating IP {} from {}", record.floating_ip_address, pool);
        Ok(FloatingIpInfo {
            id: record.id,
            address: record.floating_ip_address,
        })
    }

    async fn delete_floating_ip(&self, id: &str) -> kubeform_cloud::Result<()> {
        tracing::info!("Releasing floating IP: {}", id);
        ignore_missing(self.cli.delete_floating_ip(id).await, id)
    }

    async fn associate_floating_ip(
        &self,
        address: &str,
        instance_id: &str,
    ) -> kubeform_cloud::Result<()> {
        tracing::info!("Associating {} with instance {}", address, instance_id);
        self.cli.add_floating_ip(instance_id, address).await?;
        Ok(())
    }

    async fn disassociate_floating_ip(
        &self,
        address: &str,
        instance_id: &str,
    ) -> kubeform_cloud::Result<()> {
        ignore_missing(
            self.cli.remove_floating_ip(instance_id, address).await,
            address,
        )
    }
}
