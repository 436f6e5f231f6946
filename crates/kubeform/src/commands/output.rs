use crate::utils;
use colored::Colorize;
use kubeform_cloud::StateManager;
use kubeform_core::CLUSTERS_OUTPUT;
use std::path::Path;

pub async fn handle(config: Option<&Path>, show_secrets: bool, json: bool) -> anyhow::Result<()> {
    let (_, settings) = utils::load_settings(config)?;
    let state = StateManager::new(settings.project_root()).load().await?;

    let Some(output) = state.get_output(CLUSTERS_OUTPUT) else {
        anyhow::bail!("No outputs recorded yet; run `kubeform up` first");
    };

    let value = if output.secret && !show_secrets {
        kubeform_core::redact(&output.value)
    } else {
        output.value.clone()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let clusters = value.as_array().cloned().unwrap_or_default();
    for entry in clusters.iter().filter_map(|e| e.as_object()) {
        for (name, cluster) in entry {
            println!("{}", name.bold());
            if cluster.is_null() {
                println!("  {}", "(incomplete: generated files are missing)".yellow());
                continue;
            }

            let endpoints = &cluster["endpoints"];
            print_field("type", &endpoints["type"]);
            print_field("app", &endpoints["app"]);
            print_field("cluster-api", &endpoints["cluster-api"]);
            for field in ["kubeconfig", "inventory", "privateKey"] {
                print_field(field, &cluster[field]);
            }
            println!();
        }
    }

    if output.secret && !show_secrets {
        println!("{}", "Secrets are hidden; pass --show-secrets to reveal them.".dimmed());
    }
    Ok(())
}

fn print_field(label: &str, value: &serde_json::Value) {
    let text = value.as_str().unwrap_or_default();
    if text.contains('\n') {
        println!("  {}:", label.cyan());
        for line in text.lines() {
            println!("    {}", line);
        }
    } else {
        println!("  {:<12} {}", format!("{}:", label).cyan(), text);
    }
}
