//! Cloud provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Compute-cloud abstraction
///
/// The deployer only needs a handful of primitives: a key pair, instances,
/// and floating IPs that can be bound to instances. Every call blocks until
/// the resource is usable; ordering between calls is the caller's job.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name used in state keys (e.g. "openstack")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Create a key pair and return its generated private key
    async fn create_keypair(&self, name: &str) -> Result<KeypairInfo>;

    async fn delete_keypair(&self, name: &str) -> Result<()>;

    /// Create an instance and wait until it is active
    async fn create_instance(&self, spec: &InstanceSpec) -> Result<InstanceInfo>;

    /// Look up an instance by id; None when it no longer exists
    async fn get_instance(&self, id: &str) -> Result<Option<InstanceInfo>>;

    async fn delete_instance(&self, id: &str) -> Result<()>;

    /// Allocate a floating IP from `pool`
    async fn create_floating_ip(&self, pool: &str) -> Result<FloatingIpInfo>;

    async fn delete_floating_ip(&self, id: &str) -> Result<()>;

    async fn associate_floating_ip(&self, address: &str, instance_id: &str) -> Result<()>;

    async fn disassociate_floating_ip(&self, address: &str, instance_id: &str) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,

    /// Project/user information if available
    pub account_info: Option<String>,

    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// A freshly created key pair
#[derive(Debug, Clone)]
pub struct KeypairInfo {
    pub name: String,
    pub private_key: String,
}

/// What to boot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub flavor: String,
    pub image: String,
    pub keypair: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub name: String,
    pub status: Option<String>,

    /// First IPv4 address on the instance's network
    pub fixed_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIpInfo {
    pub id: String,
    pub address: String,
}
