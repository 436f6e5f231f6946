//! openstack CLI wrapper
//!
//! Wraps the python-openstackclient commands kubeform needs. Everything that
//! returns data is run with `-f json`.

use crate::error::{OpenStackError, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

const DEFAULT_PROGRAM: &str = "openstack";

/// openstack CLI wrapper
#[derive(Debug, Clone)]
pub struct OpenStackCli {
    program: String,
    cloud: Option<String>,
}

impl OpenStackCli {
    /// `cloud` selects an entry from clouds.yaml; None uses the OS_* environment
    pub fn new(cloud: Option<String>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            cloud,
        }
    }

    /// Use a different executable (a wrapper script, a pinned venv, ...)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Check that the CLI is installed and can issue a token
    pub async fn check_auth(&self) -> Result<TokenInfo> {
        let which = Command::new("which")
            .arg(&self.program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !which.success() {
            return Err(OpenStackError::CliNotFound);
        }

        let output = self
            .run_command(&["token", "issue", "-f", "json"])
            .await
            .map_err(|e| match e {
                OpenStackError::CommandFailed(msg) => OpenStackError::AuthenticationFailed(msg),
                other => other,
            })?;

        Ok(serde_json::from_str(&output)?)
    }

    /// Run an openstack command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        if let Some(cloud) = &self.cloud {
            cmd.arg("--os-cloud").arg(cloud);
        }
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_not_found(&stderr) {
                return Err(OpenStackError::NotFound(stderr));
            }
            return Err(OpenStackError::CommandFailed(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Create a key pair; openstack generates it and prints the private key
    pub async fn create_keypair(&self, name: &str) -> Result<String> {
        let private_key = self.run_command(&["keypair", "create", name]).await?;
        if !private_key.contains("PRIVATE KEY") {
            return Err(OpenStackError::UnexpectedOutput(format!(
                "keypair create {} did not print a private key",
                name
            )));
        }
        Ok(private_key)
    }

    pub async fn delete_keypair(&self, name: &str) -> Result<()> {
        self.run_command(&["keypair", "delete", name]).await?;
        Ok(())
    }

    /// Boot a server and wait for it to become ACTIVE
    pub async fn create_server(&self, config: &CreateServerConfig) -> Result<ServerInfo> {
        let args = [
            "server",
            "create",
            "--flavor",
            config.flavor.as_str(),
            "--image",
            config.image.as_str(),
            "--key-name",
            config.key_name.as_str(),
            "--network",
            config.network.as_str(),
            "--wait",
            "-f",
            "json",
            config.name.as_str(),
        ];

        let output = self.run_command(&args).await?;
        Ok(serde_json::from_str(&output)?)
    }

    pub async fn show_server(&self, id: &str) -> Result<Option<ServerInfo>> {
        match self.run_command(&["server", "show", "-f", "json", id]).await {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(OpenStackError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_server(&self, id: &str) -> Result<()> {
        self.run_command(&["server", "delete", "--wait", id]).await?;
        Ok(())
    }

    pub async fn create_floating_ip(&self, pool: &str) -> Result<FloatingIpRecord> {
        let output = self
            .run_command(&["floating", "ip", "create", "-f", "json", pool])
            .await?;
        Ok(serde_json::from_str(&output)?)
    }

    pub async fn delete_floating_ip(&self, id: &str) -> Result<()> {
        self.run_command(&["floating", "ip", "delete", id]).await?;
        Ok(())
    }

    pub async fn add_floating_ip(&self, server_id: &str, address: &str) -> Result<()> {
        self.run_command(&["server", "add", "floating", "ip", server_id, address])
            .await?;
        Ok(())
    }

    pub async fn remove_floating_ip(&self, server_id: &str, address: &str) -> Result<()> {
        self.run_command(&["server", "remove", "floating", "ip", server_id, address])
            .await?;
        Ok(())
    }
}

/// openstackclient phrases "not found" differently per service
fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("with a name or id of")
        || lower.contains("could not be found")
        || lower.contains("not found")
        || lower.contains("no floatingip found")
}

/// `openstack token issue` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub expires: Option<String>,
}

/// `openstack server show/create` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub status: Option<String>,

    /// Either `{"net": ["10.0.0.5"]}` or the legacy `"net=10.0.0.5, fd00::5"`
    #[serde(default)]
    pub addresses: serde_json::Value,
}

impl ServerInfo {
    /// First IPv4 address, preferring `network` when given
    pub fn ipv4_address(&self, network: Option<&str>) -> Option<String> {
        parse_addresses(&self.addresses, network)
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("ACTIVE")
    }
}

/// `openstack floating ip create` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatingIpRecord {
    pub id: String,
    pub floating_ip_address: String,
}

/// Arguments for `openstack server create`
#[derive(Debug, Clone)]
pub struct CreateServerConfig {
    pub name: String,
    pub flavor: String,
    pub image: String,
    pub key_name: String,
    pub network: String,
}

fn parse_addresses(addresses: &serde_json::Value, network: Option<&str>) -> Option<String> {
    let per_network: Vec<(String, Vec<String>)> = match addresses {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(net, ips)| {
                let ips = match ips {
                    serde_json::Value::Array(items) => items
                        .iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(s) => Some(s.clone()),
                            // Older clients emit {"addr": "...", "version": 4}
                            serde_json::Value::Object(o) => {
                                o.get("addr").and_then(|a| a.as_str()).map(str::to_string)
                            }
                            _ => None,
                        })
                        .collect(),
                    serde_json::Value::String(s) => vec![s.clone()],
                    _ => Vec::new(),
                };
                (net.clone(), ips)
            })
            .collect(),
        serde_json::Value::String(s) => s
            .split(';')
            .filter_map(|entry| {
                let (net, ips) = entry.trim().split_once('=')?;
                Some((
                    net.trim().to_string(),
                    ips.split(',').map(|ip| ip.trim().to_string()).collect(),
                ))
            })
            .collect(),
        _ => Vec::new(),
    };

    let is_ipv4 = |ip: &String| ip.parse::<std::net::Ipv4Addr>().is_ok();

    if let Some(network) = network {
        if let Some((_, ips)) = per_network.iter().find(|(net, _)| net == network) {
            if let Some(ip) = ips.iter().find(|ip| is_ipv4(ip)) {
                return Some(ip.clone());
            }
        }
    }

    per_network
        .iter()
        .flat_map(|(_, ips)| ips.iter())
        .find(|ip| is_ipv4(ip))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server(addresses: serde_json::Value) -> ServerInfo {
        ServerInfo {
            id: "0c1f".to_string(),
            name: "prod-master-0".to_string(),
            status: Some("ACTIVE".to_string()),
            addresses,
        }
    }

    #[test]
    fn test_addresses_map_format() {
        let server = server(json!({
            "public": ["203.0.113.7"],
            "private": ["fd00::5", "10.0.0.5"]
        }));

        assert_eq!(server.ipv4_address(Some("private")).as_deref(), Some("10.0.0.5"));
        assert!(server.is_active());
    }

    #[test]
    fn test_addresses_legacy_string_format() {
        let server = server(json!("private=fd00::5, 10.0.0.9; other=192.168.0.4"));

        assert_eq!(server.ipv4_address(Some("private")).as_deref(), Some("10.0.0.9"));
        assert_eq!(server.ipv4_address(Some("missing")).as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_addresses_addr_objects() {
        let server = server(json!({
            "private": [{"addr": "10.1.0.3", "version": 4}]
        }));
        assert_eq!(server.ipv4_address(None).as_deref(), Some("10.1.0.3"));
    }

    #[test]
    fn test_addresses_empty() {
        assert_eq!(server(serde_json::Value::Null).ipv4_address(None), None);
        assert_eq!(server(json!("")).ipv4_address(None), None);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("No server with a name or ID of 'x' exists."));
        assert!(is_not_found("Floating IP 1.2.3.4 could not be found"));
        assert!(!is_not_found("Quota exceeded for instances"));
    }

    #[test]
    fn test_parse_server_create_output() {
        let output = r#"{
            "id": "9a3e",
            "name": "prod-worker-0",
            "status": "ACTIVE",
            "flavor": "m1.large",
            "addresses": {"private": ["10.0.0.12"]}
        }"#;
        let server: ServerInfo = serde_json::from_str(output).unwrap();
        assert_eq!(server.name, "prod-worker-0");
        assert_eq!(server.ipv4_address(None).as_deref(), Some("10.0.0.12"));
    }
}
