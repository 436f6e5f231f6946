pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{AnsibleSettings, Flavors, OpenStackSettings, Settings};

use std::path::PathBuf;

/// Environment variable pointing directly at a settings file
pub const CONFIG_PATH_ENV: &str = "KUBEFORM_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["kubeform.local.yaml", "kubeform.yaml"];

/// Find the project's settings file
///
/// Search order:
/// 1. `KUBEFORM_CONFIG_PATH` (direct path)
/// 2. current directory: kubeform.local.yaml, kubeform.yaml
/// 3. `./.kubeform/` directory, same order
/// 4. `~/.config/kubeform/kubeform.yaml` (global settings)
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            path = %path.display(),
            "{} points at a missing file, falling back to discovery",
            CONFIG_PATH_ENV
        );
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".kubeform");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("kubeform").join("kubeform.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}
