use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kubeform_cloud::{Action, ActionType, Plan};
use kubeform_cloud_openstack::OpenStackProvider;
use kubeform_config::Settings;
use kubeform_core::{Deployer, Topology};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Settings plus the topology they point at
pub struct Project {
    pub settings_path: PathBuf,
    pub settings: Settings,
    pub topology: Topology,
}

/// Resolve `--config` (or discover the settings file) and load it
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<(PathBuf, Settings)> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => kubeform_config::find_settings_file()?,
    };
    let settings = Settings::load(&path)?;
    Ok((path, settings))
}

pub fn load_project(config: Option<&Path>) -> anyhow::Result<Project> {
    let (settings_path, settings) = load_settings(config)?;
    let topology = kubeform_core::read_topology(&settings.topology_path())?;
    Ok(Project {
        settings_path,
        settings,
        topology,
    })
}

impl Project {
    pub fn deployer(self) -> Deployer {
        let provider = Arc::new(OpenStackProvider::new(
            self.settings.openstack.cloud.clone(),
        ));
        Deployer::new(provider, self.settings, self.topology)
    }
}

/// Print the files a command is working from
pub fn print_loaded_files(project: &Project) {
    println!("📄 Loaded:");
    println!(
        "  • {}",
        project.settings_path.display().to_string().cyan()
    );
    println!(
        "  • {} ({} cluster(s))",
        project.settings.topology_path().display().to_string().cyan(),
        project.topology.clusters.len()
    );
}

/// Ask a yes/no question; anything but "y" is a no
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Print the changes in a plan, grouped by cluster
pub fn print_plan(plan: &Plan) {
    let mut by_cluster: BTreeMap<Option<&str>, Vec<&Action>> = BTreeMap::new();
    for action in &plan.actions {
        if action.action_type != ActionType::NoOp {
            by_cluster
                .entry(action.cluster.as_deref())
                .or_default()
                .push(action);
        }
    }

    if by_cluster.is_empty() {
        println!("{}", "No infrastructure changes.".green());
        return;
    }

    for (cluster, actions) in by_cluster {
        println!();
        println!("{}", cluster.unwrap_or("shared").bold());
        for action in actions {
            let line = match action.action_type {
                ActionType::Create => format!("  + {}", action.description).green(),
                ActionType::Update => format!("  ~ {}", action.description).yellow(),
                _ => format!("  - {}", action.description).red(),
            };
            println!("{}", line);
            for (key, detail) in &action.details {
                println!("      {}: {}", key.dimmed(), detail);
            }
        }
    }
}
