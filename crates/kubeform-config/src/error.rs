use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: kubeform.local.yaml, kubeform.yaml\n\
        - ./.kubeform/ directory\n\
        - ~/.config/kubeform/kubeform.yaml\n\
        Set KUBEFORM_CONFIG_PATH or pass --config to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse settings file {path}, is it in the correct format?\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Required setting '{0}' is empty")]
    MissingValue(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
