//! ansible-playbook runner

use crate::error::{KubeformError, Result};
use crate::layout::ClusterFiles;
use kubeform_config::Settings;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs the install playbook against a generated inventory
#[derive(Debug, Clone)]
pub struct AnsibleRunner {
    program: String,
    playbook: PathBuf,
}

impl AnsibleRunner {
    pub fn new(program: impl Into<String>, playbook: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            playbook: playbook.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.ansible.program, settings.playbook_path())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for one cluster, relative to the output directory:
    /// `-i ./inventory-<c>.ini -e @variables-<c>.yaml <playbook>`
    pub fn args(&self, files: &ClusterFiles) -> Result<Vec<String>> {
        let file_name = |path: &Path| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let playbook = std::path::absolute(&self.playbook).map_err(|source| {
            KubeformError::IoError {
                path: self.playbook.clone(),
                source,
            }
        })?;

        Ok(vec![
            "-i".to_string(),
            format!("./{}", file_name(&files.inventory)),
            "-e".to_string(),
            format!("@{}", file_name(&files.variables)),
            playbook.to_string_lossy().into_owned(),
        ])
    }

    /// Run the playbook from `output_dir`, logging to the cluster's log file
    pub async fn run(&self, cluster: &str, files: &ClusterFiles, output_dir: &Path) -> Result<()> {
        let args = self.args(files)?;
        let log = tokio::fs::File::create(&files.ansible_log)
            .await
            .map_err(|source| KubeformError::IoError {
                path: files.ansible_log.clone(),
                source,
            })?
            .into_std()
            .await;
        let log_err = log.try_clone().map_err(|source| KubeformError::IoError {
            path: files.ansible_log.clone(),
            source,
        })?;

        tracing::info!(
            cluster = %cluster,
            log = %files.ansible_log.display(),
            "Running: {} {}",
            self.program,
            args.join(" ")
        );

        let status = Command::new(&self.program)
            .args(&args)
            .current_dir(output_dir)
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .await
            .map_err(|source| KubeformError::AnsibleSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(KubeformError::AnsibleFailed {
                cluster: cluster.to_string(),
                status: status.to_string(),
                log: files.ansible_log.clone(),
            });
        }

        tracing::info!(cluster = %cluster, "Playbook finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_match_playbook_invocation() {
        let files = ClusterFiles::new(Path::new("/out"), "prod");
        let runner = AnsibleRunner::new("ansible-playbook", "/work/install.yaml");

        assert_eq!(
            runner.args(&files).unwrap(),
            vec![
                "-i",
                "./inventory-prod.ini",
                "-e",
                "@variables-prod.yaml",
                "/work/install.yaml"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_failure_points_at_log() {
        let dir = tempfile::tempdir().unwrap();
        let files = ClusterFiles::new(dir.path(), "prod");
        let runner = AnsibleRunner::new("false", dir.path().join("install.yaml"));

        let err = runner.run("prod", &files, dir.path()).await.unwrap_err();
        match err {
            KubeformError::AnsibleFailed { cluster, log, .. } => {
                assert_eq!(cluster, "prod");
                assert_eq!(log, files.ansible_log);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let files = ClusterFiles::new(dir.path(), "prod");
        let runner = AnsibleRunner::new("kubeform-no-such-ansible", "install.yaml");

        let err = runner.run("prod", &files, dir.path()).await.unwrap_err();
        assert!(matches!(err, KubeformError::AnsibleSpawn { .. }));
    }
}
