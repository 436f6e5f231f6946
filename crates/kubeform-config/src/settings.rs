//! Project settings
//!
//! Everything that is not part of the cluster topology itself: which cloud,
//! image, network and flavors to use, how to reach the nodes and where the
//! generated files go.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_KEYPAIR_NAME: &str = "kubeadm-keypair";
const DEFAULT_ANSIBLE_PROGRAM: &str = "ansible-playbook";
const DEFAULT_PLAYBOOK: &str = "install.yaml";

/// Parsed settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub openstack: OpenStackSettings,

    /// User Ansible logs in as on every node
    pub ssh_user: String,

    /// Topology file, relative to the settings file
    pub topology_file: PathBuf,

    #[serde(default = "default_keypair_name")]
    pub keypair_name: String,

    /// Directory for id_rsa, inventories, variables and kubeconfigs
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub ansible: AnsibleSettings,

    /// Directory the settings were loaded from
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenStackSettings {
    /// Named cloud from clouds.yaml (`--os-cloud`)
    #[serde(default)]
    pub cloud: Option<String>,

    pub image: String,
    pub network: String,
    pub floating_ip_pool: String,
    pub flavors: Flavors,

    #[serde(default = "default_true")]
    pub assign_floating_ips: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flavors {
    pub master: String,
    pub worker: String,
    pub load_balancer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsibleSettings {
    #[serde(default = "default_ansible_program")]
    pub program: String,

    /// Playbook path, relative to the project root
    #[serde(default = "default_playbook")]
    pub playbook: PathBuf,
}

impl Default for AnsibleSettings {
    fn default() -> Self {
        Self {
            program: default_ansible_program(),
            playbook: default_playbook(),
        }
    }
}

fn default_keypair_name() -> String {
    DEFAULT_KEYPAIR_NAME.to_string()
}

fn default_ansible_program() -> String {
    DEFAULT_ANSIBLE_PROGRAM.to_string()
}

fn default_playbook() -> PathBuf {
    PathBuf::from(DEFAULT_PLAYBOOK)
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Load and validate a settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let settings = Self::from_yaml(&content, base_dir).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parse settings from YAML, resolving relative paths against `base_dir`
    pub fn from_yaml(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut settings: Settings =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        settings.base_dir = base_dir.into();
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("openstack.image", &self.openstack.image),
            ("openstack.network", &self.openstack.network),
            ("openstack.floating_ip_pool", &self.openstack.floating_ip_pool),
            ("openstack.flavors.master", &self.openstack.flavors.master),
            ("openstack.flavors.worker", &self.openstack.flavors.worker),
            (
                "openstack.flavors.load_balancer",
                &self.openstack.flavors.load_balancer,
            ),
            ("ssh_user", &self.ssh_user),
            ("keypair_name", &self.keypair_name),
            ("ansible.program", &self.ansible.program),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue(key));
            }
        }
        if self.topology_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue("topology_file"));
        }
        Ok(())
    }

    /// Directory the settings file lives in; state is kept under it
    pub fn project_root(&self) -> &Path {
        &self.base_dir
    }

    pub fn topology_path(&self) -> PathBuf {
        self.base_dir.join(&self.topology_file)
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        }
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.base_dir.join(&self.ansible.playbook)
    }
}
