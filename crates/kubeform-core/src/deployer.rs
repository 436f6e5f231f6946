//! Deployment orchestration
//!
//! `up` walks every cluster concurrently. Inside a cluster the load balancer,
//! control plane and worker nodes are created concurrently; the inventory is
//! rendered only once all of their addresses are known. Every resource is
//! written to the state file as soon as it exists, so an aborted run can be
//! resumed with another `up` or cleaned up with `destroy`.

use crate::ansible::AnsibleRunner;
use crate::error::{KubeformError, Result};
use crate::files;
use crate::inventory::{ClusterAddresses, Inventory, InventoryHost};
use crate::layout::{
    ClusterFiles, ClusterLayout, NodeSpec, PRIVATE_KEY_FILE, build_layouts, install_command_name,
    inventory_command_name,
};
use crate::outputs::{CLUSTERS_OUTPUT, ClusterOutput, clusters_value};
use crate::plan::{self, LOCAL_PROVIDER};
use crate::topology::Topology;
use futures_util::future::{join_all, try_join_all};
use kubeform_cloud::{
    ActionType, ApplyResult, CloudError, CloudProvider, FloatingIpInfo, GlobalState, InstanceInfo,
    OutputValue, Plan, PlanSummary, ResourceSet, ResourceState, ResourceStatus, ResourceType,
    StateLock, StateManager, resource_key,
};
use kubeform_config::Settings;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// Run the playbook even when the hosts have not changed
    pub reinstall: bool,

    /// Provision and render inventories only
    pub skip_install: bool,
}

#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub name: String,
    pub addresses: ClusterAddresses,
    pub installed: bool,
}

#[derive(Debug, Clone)]
pub struct UpReport {
    pub summary: PlanSummary,
    pub clusters: Vec<ClusterReport>,
    pub outputs: serde_json::Value,
}

pub struct Deployer {
    provider: Arc<dyn CloudProvider>,
    settings: Settings,
    topology: Topology,
    state_manager: StateManager,
    ansible: AnsibleRunner,
}

/// Shared by every concurrent task of one run
struct RunContext<'a> {
    plan: &'a Plan,
    state: Mutex<GlobalState>,
    state_manager: &'a StateManager,
    output_dir: PathBuf,
    /// Clusters with at least one instance booted during this run
    rebuilt: Mutex<BTreeSet<String>>,
}

impl RunContext<'_> {
    async fn resource(&self, key: &str) -> Option<ResourceState> {
        self.state.lock().await.get_resource(key).cloned()
    }

    /// Record a resource and persist the state right away
    async fn record(&self, key: String, resource: ResourceState) -> Result<()> {
        let mut state = self.state.lock().await;
        tracing::debug!(key = %key, id = %resource.id, "Recording resource");
        state.set_resource(key, resource);
        self.state_manager.save(&state).await?;
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.remove_resource(key).is_some() {
            self.state_manager.save(&state).await?;
        }
        Ok(())
    }

    fn planned(&self, key: &str) -> Option<ActionType> {
        self.plan
            .actions
            .iter()
            .find(|a| a.resource_key == key)
            .map(|a| a.action_type)
    }
}

impl Deployer {
    pub fn new(provider: Arc<dyn CloudProvider>, settings: Settings, topology: Topology) -> Self {
        let state_manager = StateManager::new(settings.project_root());
        let ansible = AnsibleRunner::from_settings(&settings);
        Self {
            provider,
            settings,
            topology,
            state_manager,
            ansible,
        }
    }

    pub fn with_ansible(mut self, ansible: AnsibleRunner) -> Self {
        self.ansible = ansible;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn layouts(&self) -> Result<Vec<ClusterLayout>> {
        build_layouts(&self.topology, &self.settings)
    }

    fn desired(&self, layouts: &[ClusterLayout]) -> ResourceSet {
        plan::desired_resources(layouts, &self.settings, self.provider.name())
    }

    fn private_key_path(&self) -> PathBuf {
        self.settings.output_path().join(PRIVATE_KEY_FILE)
    }

    /// Diff the topology against recorded state without touching anything
    pub async fn preview(&self) -> Result<Plan> {
        let state = self.state_manager.load().await?;
        Ok(plan::diff(&self.desired(&self.layouts()?), &state))
    }

    /// Recorded outputs, if a run has produced any
    pub async fn outputs(&self) -> Result<Option<OutputValue>> {
        let state = self.state_manager.load().await?;
        Ok(state.get_output(CLUSTERS_OUTPUT).cloned())
    }

    pub async fn up(&self, options: &UpOptions) -> Result<UpReport> {
        self.topology.validate()?;
        let layouts = self.layouts()?;

        let auth = self.provider.check_auth().await?;
        if !auth.authenticated {
            return Err(CloudError::AuthenticationFailed(auth.error.unwrap_or_default()).into());
        }

        let lock = self.state_manager.acquire_lock().await?;
        let result = self.run_up(layouts, options).await;
        release(lock).await;
        result
    }

    async fn run_up(&self, layouts: Vec<ClusterLayout>, options: &UpOptions) -> Result<UpReport> {
        let state = self.state_manager.load().await?;
        let plan = plan::diff(&self.desired(&layouts), &state);
        let summary = plan.summary();
        tracing::info!("Plan: {}", summary);

        let output_dir = self.settings.output_path();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| KubeformError::IoError {
                path: output_dir.clone(),
                source,
            })?;

        let ctx = RunContext {
            plan: &plan,
            state: Mutex::new(state),
            state_manager: &self.state_manager,
            output_dir,
            rebuilt: Mutex::new(BTreeSet::new()),
        };

        self.ensure_keypair(&ctx).await?;

        let addresses = try_join_all(
            layouts
                .iter()
                .map(|layout| self.provision_cluster(&ctx, layout)),
        )
        .await?;

        self.delete_stale(&ctx).await?;

        let installed = try_join_all(
            layouts
                .iter()
                .zip(&addresses)
                .map(|(layout, addresses)| self.install(&ctx, layout, addresses, options)),
        )
        .await?;

        let private_key = self.private_key_path();
        let mut collected = Vec::with_capacity(layouts.len());
        for (layout, addresses) in layouts.iter().zip(&addresses) {
            let files = ClusterFiles::new(&ctx.output_dir, &layout.name);
            let output = ClusterOutput::collect(addresses, &files, &private_key).await;
            if output.is_none() {
                tracing::warn!(cluster = %layout.name, "Cluster files incomplete, exporting null");
            }
            collected.push((layout.name.as_str(), output));
        }
        let outputs = clusters_value(collected);

        let mut state = ctx.state.into_inner();
        state.set_output(CLUSTERS_OUTPUT, OutputValue::secret(outputs.clone()));
        self.state_manager.save(&state).await?;

        let clusters = layouts
            .into_iter()
            .zip(addresses)
            .zip(installed)
            .map(|((layout, addresses), installed)| ClusterReport {
                name: layout.name,
                addresses,
                installed,
            })
            .collect();

        Ok(UpReport {
            summary,
            clusters,
            outputs,
        })
    }

    async fn ensure_keypair(&self, ctx: &RunContext<'_>) -> Result<()> {
        let name = &self.settings.keypair_name;
        let key = resource_key(self.provider.name(), ResourceType::Keypair, name);
        let path = self.private_key_path();

        if let Some(recorded) = ctx.resource(&key).await {
            if !path.exists() {
                match recorded.get_attribute::<String>("private_key") {
                    Some(private_key) => files::write_private_key(&path, &private_key).await?,
                    None => tracing::warn!(
                        path = %path.display(),
                        "Private key missing and not recorded; nodes may be unreachable"
                    ),
                }
            }
            return Ok(());
        }

        tracing::info!(keypair = %name, "Creating key pair");
        let keypair = self.provider.create_keypair(name).await?;
        ctx.record(
            key,
            ResourceState::new(&keypair.name, ResourceType::Keypair)
                .with_status(ResourceStatus::Ready)
                .with_attribute("private_key", json!(keypair.private_key))
                .with_attribute("path", json!(path)),
        )
        .await?;
        files::write_private_key(&path, &keypair.private_key).await
    }

    async fn provision_cluster(
        &self,
        ctx: &RunContext<'_>,
        layout: &ClusterLayout,
    ) -> Result<ClusterAddresses> {
        let cluster = self.topology.clusters.get(&layout.name).ok_or_else(|| {
            KubeformError::InvalidTopology(format!("unknown cluster '{}'", layout.name))
        })?;
        tracing::info!(
            cluster = %layout.name,
            nodes = layout.nodes().count(),
            "Provisioning cluster"
        );

        let load_balancer = async {
            match &layout.load_balancer {
                Some(node) => self.ensure_node(ctx, node).await.map(Some),
                None => Ok(None),
            }
        };
        let masters = try_join_all(layout.masters.iter().map(|n| self.ensure_node(ctx, n)));
        let workers = try_join_all(layout.workers.iter().map(|n| self.ensure_node(ctx, n)));

        let (load_balancer, masters, workers) = tokio::try_join!(load_balancer, masters, workers)?;
        let addresses = ClusterAddresses {
            load_balancer,
            masters,
            workers,
        };

        let files = ClusterFiles::new(&ctx.output_dir, &layout.name);
        Inventory::new(&layout.name, cluster, &self.settings.ssh_user, &addresses)
            .write(&files)
            .await?;

        let command = inventory_command_name(&layout.name);
        ctx.record(
            resource_key(LOCAL_PROVIDER, ResourceType::Command, &command),
            ResourceState::new(&command, ResourceType::Command)
                .with_status(ResourceStatus::Ready)
                .with_cluster(Some(layout.name.clone()))
                .with_attribute("cleanup", json!([files.inventory, files.variables]))
                .with_attribute("hosts", json!(addresses.host_list())),
        )
        .await?;

        Ok(addresses)
    }

    /// Instance, then floating IP, then association; returns the address
    /// Ansible should use
    async fn ensure_node(&self, ctx: &RunContext<'_>, node: &NodeSpec) -> Result<InventoryHost> {
        let instance = self.ensure_instance(ctx, node).await?;

        let Some(fip_name) = &node.floating_ip else {
            let address = instance
                .fixed_ip
                .ok_or_else(|| KubeformError::MissingAddress(node.name().to_string()))?;
            return Ok(InventoryHost::new(node.name(), address));
        };

        let fip = self.ensure_floating_ip(ctx, node, fip_name).await?;

        let assoc_key = resource_key(
            self.provider.name(),
            ResourceType::FloatingIpAssociate,
            fip_name,
        );
        let bound = ctx.resource(&assoc_key).await.is_some_and(|r| {
            r.get_attribute::<String>("instance_id").as_deref() == Some(instance.id.as_str())
        });
        if !bound {
            tracing::info!(node = %node.name(), address = %fip.address, "Associating floating IP");
            self.provider
                .associate_floating_ip(&fip.address, &instance.id)
                .await?;
            ctx.record(
                assoc_key,
                ResourceState::new(
                    format!("{}/{}", fip.address, instance.id),
                    ResourceType::FloatingIpAssociate,
                )
                .with_status(ResourceStatus::Ready)
                .with_cluster(Some(node.cluster.clone()))
                .with_attribute("address", json!(fip.address))
                .with_attribute("instance_id", json!(instance.id)),
            )
            .await?;
        }

        Ok(InventoryHost::new(node.name(), fip.address))
    }

    async fn ensure_instance(&self, ctx: &RunContext<'_>, node: &NodeSpec) -> Result<InstanceInfo> {
        let key = resource_key(self.provider.name(), ResourceType::Instance, node.name());

        if let Some(recorded) = ctx.resource(&key).await {
            if ctx.planned(&key) == Some(ActionType::Update) {
                tracing::info!(node = %node.name(), "Replacing instance");
                self.unbind_floating_ip(ctx, node).await?;
                self.provider.delete_instance(&recorded.id).await?;
                ctx.forget(&key).await?;
            } else {
                match self.provider.get_instance(&recorded.id).await? {
                    Some(info) => {
                        tracing::debug!(node = %node.name(), id = %info.id, "Instance exists");
                        return Ok(info);
                    }
                    None => {
                        tracing::warn!(
                            node = %node.name(),
                            id = %recorded.id,
                            "Recorded instance is gone, recreating"
                        );
                        ctx.forget(&key).await?;
                    }
                }
            }
        }

        tracing::info!(
            node = %node.name(),
            role = %node.role,
            flavor = %node.instance.flavor,
            "Creating instance"
        );
        let info = self.provider.create_instance(&node.instance).await?;
        ctx.record(
            key,
            ResourceState::new(&info.id, ResourceType::Instance)
                .with_status(ResourceStatus::Ready)
                .with_cluster(Some(node.cluster.clone()))
                .with_attribute("name", json!(node.name()))
                .with_attribute("role", json!(node.role))
                .with_attribute("flavor", json!(node.instance.flavor))
                .with_attribute("image", json!(node.instance.image))
                .with_attribute("keypair", json!(node.instance.keypair))
                .with_attribute("fixed_ip", json!(info.fixed_ip)),
        )
        .await?;
        ctx.rebuilt.lock().await.insert(node.cluster.clone());
        Ok(info)
    }

    /// Detach the node's floating IP before its instance goes away
    async fn unbind_floating_ip(&self, ctx: &RunContext<'_>, node: &NodeSpec) -> Result<()> {
        let Some(fip_name) = &node.floating_ip else {
            return Ok(());
        };
        let key = resource_key(
            self.provider.name(),
            ResourceType::FloatingIpAssociate,
            fip_name,
        );
        if let Some(recorded) = ctx.resource(&key).await {
            self.delete_resource(&key, &recorded, ctx.state_manager, &ctx.state, None)
                .await?;
        }
        Ok(())
    }

    async fn ensure_floating_ip(
        &self,
        ctx: &RunContext<'_>,
        node: &NodeSpec,
        fip_name: &str,
    ) -> Result<FloatingIpInfo> {
        let key = resource_key(self.provider.name(), ResourceType::FloatingIp, fip_name);

        if let Some(recorded) = ctx.resource(&key).await {
            let address = recorded.get_attribute::<String>("address").ok_or_else(|| {
                CloudError::StateError(format!("floating IP {} has no recorded address", key))
            })?;
            return Ok(FloatingIpInfo {
                id: recorded.id,
                address,
            });
        }

        let pool = &self.settings.openstack.floating_ip_pool;
        tracing::info!(node = %node.name(), pool = %pool, "Allocating floating IP");
        let fip = self.provider.create_floating_ip(pool).await?;
        ctx.record(
            key,
            ResourceState::new(&fip.id, ResourceType::FloatingIp)
                .with_status(ResourceStatus::Ready)
                .with_cluster(Some(node.cluster.clone()))
                .with_attribute("address", json!(fip.address))
                .with_attribute("pool", json!(pool)),
        )
        .await?;
        Ok(fip)
    }

    /// Remove recorded resources the topology no longer asks for
    async fn delete_stale(&self, ctx: &RunContext<'_>) -> Result<()> {
        let stale: Vec<(String, ResourceState)> = {
            let state = ctx.state.lock().await;
            ctx.plan
                .actions_by_type(ActionType::Delete)
                .into_iter()
                .filter_map(|a| {
                    state
                        .get_resource(&a.resource_key)
                        .map(|r| (a.resource_key.clone(), r.clone()))
                })
                .collect()
        };
        if stale.is_empty() {
            return Ok(());
        }

        // A renamed key pair writes its key to the same file as the old one
        let private_key = self.private_key_path();
        for group in by_destroy_rank(stale).into_values() {
            try_join_all(group.iter().map(|(key, recorded)| {
                tracing::info!(key = %key, "Deleting stale resource");
                self.delete_resource(
                    key,
                    recorded,
                    ctx.state_manager,
                    &ctx.state,
                    Some(&private_key),
                )
            }))
            .await?;
        }
        Ok(())
    }

    async fn install(
        &self,
        ctx: &RunContext<'_>,
        layout: &ClusterLayout,
        addresses: &ClusterAddresses,
        options: &UpOptions,
    ) -> Result<bool> {
        let command = install_command_name(&layout.name);
        let key = resource_key(LOCAL_PROVIDER, ResourceType::Command, &command);
        let hosts = addresses.host_list();

        if options.skip_install {
            tracing::info!(cluster = %layout.name, "Skipping Kubernetes installation");
            return Ok(false);
        }

        let installed_hosts = ctx
            .resource(&key)
            .await
            .and_then(|r| r.get_attribute::<Vec<String>>("hosts"));
        let rebuilt = ctx.rebuilt.lock().await.contains(&layout.name);
        if !options.reinstall && !rebuilt && installed_hosts.as_ref() == Some(&hosts) {
            tracing::info!(cluster = %layout.name, "Kubernetes already installed on these hosts");
            return Ok(false);
        }

        let files = ClusterFiles::new(&ctx.output_dir, &layout.name);
        self.ansible
            .run(&layout.name, &files, &ctx.output_dir)
            .await?;

        ctx.record(
            key,
            ResourceState::new(&command, ResourceType::Command)
                .with_status(ResourceStatus::Ready)
                .with_cluster(Some(layout.name.clone()))
                .with_attribute("cleanup", json!([files.kubeconfig, files.ansible_log]))
                .with_attribute("hosts", json!(hosts)),
        )
        .await?;
        Ok(true)
    }

    /// Delete every recorded resource in reverse dependency order
    ///
    /// Failures are collected; whatever could not be deleted stays in state.
    pub async fn destroy(&self) -> Result<ApplyResult> {
        let lock = self.state_manager.acquire_lock().await?;
        let result = self.run_destroy().await;
        release(lock).await;
        result
    }

    async fn run_destroy(&self) -> Result<ApplyResult> {
        let started = Instant::now();
        let mut state = self.state_manager.load().await?;
        let resources: Vec<(String, ResourceState)> = state
            .resources
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();

        state.outputs.remove(CLUSTERS_OUTPUT);
        let state = Mutex::new(state);
        let shared = &state;
        let mut result = ApplyResult::new();

        for group in by_destroy_rank(resources).into_values() {
            let outcomes = join_all(group.iter().map(|(key, recorded)| async move {
                tracing::info!(key = %key, "Deleting");
                let outcome = self
                    .delete_resource(key, recorded, &self.state_manager, shared, None)
                    .await;
                (key, outcome)
            }))
            .await;

            for (key, outcome) in outcomes {
                let action_id = format!("{}-{}", ActionType::Delete, key);
                match outcome {
                    Ok(()) => result.add_success(action_id, format!("deleted {}", key)),
                    Err(e) => {
                        tracing::error!(key = %key, error = %e, "Delete failed");
                        result.add_failure(action_id, e.to_string());
                    }
                }
            }
        }

        let state = state.into_inner();
        self.state_manager.save(&state).await?;
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn delete_resource(
        &self,
        key: &str,
        recorded: &ResourceState,
        state_manager: &StateManager,
        state: &Mutex<GlobalState>,
        keep_file: Option<&Path>,
    ) -> Result<()> {
        match recorded.resource_type {
            ResourceType::Command => {
                let cleanup = recorded
                    .get_attribute::<Vec<PathBuf>>("cleanup")
                    .unwrap_or_default();
                for path in &cleanup {
                    files::remove_if_exists(path).await?;
                }
            }
            ResourceType::FloatingIpAssociate => {
                let address = recorded.get_attribute::<String>("address");
                let instance_id = recorded.get_attribute::<String>("instance_id");
                if let (Some(address), Some(instance_id)) = (address, instance_id) {
                    self.provider
                        .disassociate_floating_ip(&address, &instance_id)
                        .await?;
                }
            }
            ResourceType::FloatingIp => self.provider.delete_floating_ip(&recorded.id).await?,
            ResourceType::Instance => self.provider.delete_instance(&recorded.id).await?,
            ResourceType::Keypair => {
                self.provider.delete_keypair(&recorded.id).await?;
                let path = recorded.get_attribute::<PathBuf>("path");
                if let Some(path) = path.filter(|p| keep_file != Some(p.as_path())) {
                    files::remove_if_exists(&path).await?;
                }
            }
        }

        let mut state = state.lock().await;
        state.remove_resource(key);
        state_manager.save(&state).await?;
        Ok(())
    }
}

async fn release(lock: StateLock) {
    if let Err(e) = lock.release().await {
        tracing::warn!(error = %e, "Failed to release state lock");
    }
}

/// Group resources so that dependents are deleted before what they depend on
fn by_destroy_rank(
    resources: Vec<(String, ResourceState)>,
) -> BTreeMap<u8, Vec<(String, ResourceState)>> {
    let mut groups: BTreeMap<u8, Vec<_>> = BTreeMap::new();
    for (key, recorded) in resources {
        groups
            .entry(recorded.resource_type.destroy_rank())
            .or_default()
            .push((key, recorded));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroy_rank_grouping() {
        let resources = vec![
            (
                "openstack:keypair:k".to_string(),
                ResourceState::new("k", ResourceType::Keypair),
            ),
            (
                "openstack:instance:a-master-0".to_string(),
                ResourceState::new("i", ResourceType::Instance),
            ),
            (
                "local:command:gen-inventory-a".to_string(),
                ResourceState::new("c", ResourceType::Command),
            ),
            (
                "openstack:floating-ip-associate:fip-a-master-0".to_string(),
                ResourceState::new("x", ResourceType::FloatingIpAssociate),
            ),
            (
                "openstack:floating-ip:fip-a-master-0".to_string(),
                ResourceState::new("f", ResourceType::FloatingIp),
            ),
        ];

        let order: Vec<ResourceType> = by_destroy_rank(resources)
            .into_values()
            .flat_map(|group| group.into_iter().map(|(_, r)| r.resource_type))
            .collect();
        assert_eq!(
            order,
            vec![
                ResourceType::Command,
                ResourceType::FloatingIpAssociate,
                ResourceType::FloatingIp,
                ResourceType::Instance,
                ResourceType::Keypair,
            ]
        );
    }
}
