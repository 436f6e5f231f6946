//! OpenStack provider for kubeform
//!
//! Implements [`CloudProvider`](kubeform_cloud::CloudProvider) on top of the
//! `openstack` command line client: key pairs, servers and floating IPs.
//!
//! # Requirements
//!
//! - `openstack` (python-openstackclient) must be installed
//! - Credentials come from `clouds.yaml` (`--os-cloud`) or the `OS_*`
//!   environment variables
//!
//! # Example
//!
//! ```ignore
//! use kubeform_cloud::CloudProvider;
//! use kubeform_cloud_openstack::OpenStackProvider;
//!
//! let provider = OpenStackProvider::new(Some("lab".to_string()));
//!
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod cli;
pub mod error;
pub mod provider;

pub use cli::{CreateServerConfig, FloatingIpRecord, OpenStackCli, ServerInfo, TokenInfo};
pub use error::{OpenStackError, Result};
pub use provider::OpenStackProvider;
