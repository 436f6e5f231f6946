use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KubeformError {
    #[error(transparent)]
    Config(#[from] kubeform_config::ConfigError),

    #[error(transparent)]
    Cloud(#[from] kubeform_cloud::CloudError),

    #[error("Cannot open topology file {path}: {source}")]
    TopologyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse topology file {path}, is it in the correct format?\n{source}")]
    TopologyParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Template render error ({template}): {message}")]
    Template { template: String, message: String },

    #[error("IO error: {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Instance {0} has no usable IPv4 address")]
    MissingAddress(String),

    #[error("Failed to start {program}: {source}")]
    AnsibleSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ansible-playbook failed for cluster '{cluster}' ({status}), see {log}")]
    AnsibleFailed {
        cluster: String,
        status: String,
        log: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, KubeformError>;
