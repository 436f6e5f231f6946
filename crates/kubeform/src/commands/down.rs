use crate::utils;
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    let project = utils::load_project(config)?;
    utils::print_loaded_files(&project);

    let deployer = project.deployer();
    let state = deployer.state_manager().load().await?;
    if state.resources.is_empty() {
        println!("{}", "Nothing to destroy.".green());
        return Ok(());
    }

    println!();
    println!(
        "{}",
        format!("Resources to destroy ({}):", state.resources.len()).bold()
    );
    for key in state.resources.keys() {
        println!("  - {}", key.red());
    }

    if !yes {
        println!();
        if !utils::confirm("Destroy all of these resources?")? {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    println!();
    let spinner = utils::spinner("Destroying resources...");
    let result = deployer.destroy().await;
    spinner.finish_and_clear();
    let result = result?;

    println!(
        "  ✓ {} deleted in {:.1}s",
        result.succeeded.len(),
        result.duration_ms as f64 / 1000.0
    );
    if !result.is_success() {
        for failure in &result.failed {
            eprintln!(
                "  ✗ {}: {}",
                failure.action_id,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
        anyhow::bail!(
            "{} resource(s) could not be deleted; they remain in the state file",
            result.failed.len()
        );
    }

    println!();
    println!("{}", "✓ Everything has been destroyed.".green().bold());
    Ok(())
}
