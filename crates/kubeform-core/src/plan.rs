//! Desired resources and the diff against recorded state

use crate::layout::{ClusterLayout, install_command_name, inventory_command_name};
use kubeform_cloud::{
    Action, ActionType, GlobalState, Plan, ResourceConfig, ResourceSet, ResourceType,
};
use kubeform_config::Settings;
use serde_json::json;
use std::collections::BTreeSet;

/// Provider name for resources that only exist on this machine
pub const LOCAL_PROVIDER: &str = "local";

/// Build every resource the layouts ask for
pub fn desired_resources(
    layouts: &[ClusterLayout],
    settings: &Settings,
    provider: &str,
) -> ResourceSet {
    let mut set = ResourceSet::new();

    set.add(ResourceConfig::new(
        ResourceType::Keypair,
        &settings.keypair_name,
        provider,
        json!({}),
    ));

    for layout in layouts {
        for node in layout.nodes() {
            set.add(
                ResourceConfig::new(
                    ResourceType::Instance,
                    node.name(),
                    provider,
                    json!({
                        "role": node.role,
                        "flavor": node.instance.flavor,
                        "image": node.instance.image,
                        "keypair": node.instance.keypair,
                        "network": node.instance.network,
                    }),
                )
                .in_cluster(&layout.name),
            );

            if let Some(fip) = &node.floating_ip {
                set.add(
                    ResourceConfig::new(
                        ResourceType::FloatingIp,
                        fip,
                        provider,
                        json!({ "pool": settings.openstack.floating_ip_pool }),
                    )
                    .in_cluster(&layout.name),
                );
                set.add(
                    ResourceConfig::new(
                        ResourceType::FloatingIpAssociate,
                        fip,
                        provider,
                        json!({ "instance": node.name() }),
                    )
                    .in_cluster(&layout.name),
                );
            }
        }

        set.add(
            ResourceConfig::new(
                ResourceType::Command,
                inventory_command_name(&layout.name),
                LOCAL_PROVIDER,
                json!({}),
            )
            .in_cluster(&layout.name),
        );
        set.add(
            ResourceConfig::new(
                ResourceType::Command,
                install_command_name(&layout.name),
                LOCAL_PROVIDER,
                json!({}),
            )
            .in_cluster(&layout.name),
        );
    }

    set
}

/// Instance fields that can only change by booting a new server
const REPLACE_FIELDS: [&str; 3] = ["flavor", "image", "keypair"];

/// Compare the desired set against recorded state
pub fn diff(desired: &ResourceSet, state: &GlobalState) -> Plan {
    let mut actions = Vec::new();
    let mut replaced_instances = BTreeSet::new();

    for resource in desired.iter() {
        let key = resource.key();
        let action = match state.get_resource(&key) {
            None => Action::new(
                ActionType::Create,
                resource.resource_type,
                &key,
                format!("create {} {}", resource.resource_type, resource.name),
            ),
            Some(recorded) if resource.resource_type == ResourceType::Instance => {
                let mut changes = Vec::new();
                for field in REPLACE_FIELDS {
                    let wanted = resource.get_config::<String>(field);
                    let current = recorded.get_attribute::<String>(field);
                    if wanted != current {
                        changes.push((field, current, wanted));
                    }
                }

                if changes.is_empty() {
                    noop(resource, &key)
                } else {
                    replaced_instances.insert(resource.name.clone());
                    changes.into_iter().fold(
                        Action::new(
                            ActionType::Update,
                            resource.resource_type,
                            &key,
                            format!("replace instance {}", resource.name),
                        ),
                        |action, (field, current, wanted)| {
                            action.with_detail(field, json!({ "from": current, "to": wanted }))
                        },
                    )
                }
            }
            Some(_) => noop(resource, &key),
        };
        actions.push(action.with_cluster(resource.cluster.clone()));
    }

    // A replaced instance needs its floating IP bound again
    for action in actions.iter_mut() {
        if action.resource_type != ResourceType::FloatingIpAssociate
            || action.action_type != ActionType::NoOp
        {
            continue;
        }
        let target = desired
            .get(&action.resource_key)
            .and_then(|r| r.get_config::<String>("instance"));
        if let Some(instance) = target.filter(|i| replaced_instances.contains(i)) {
            action.action_type = ActionType::Update;
            action.description = format!("re-associate floating IP with {}", instance);
        }
    }

    for (key, recorded) in &state.resources {
        if !desired.contains(key) {
            actions.push(
                Action::new(
                    ActionType::Delete,
                    recorded.resource_type,
                    key,
                    format!("delete {} {}", recorded.resource_type, recorded.id),
                )
                .with_cluster(recorded.cluster.clone()),
            );
        }
    }

    Plan::new(actions)
}

fn noop(resource: &ResourceConfig, key: &str) -> Action {
    Action::new(
        ActionType::NoOp,
        resource.resource_type,
        key,
        format!("{} {} is up to date", resource.resource_type, resource.name),
    )
}
