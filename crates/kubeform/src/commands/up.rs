use crate::utils;
use colored::Colorize;
use kubeform_core::UpOptions;
use std::path::Path;

pub async fn handle(config: Option<&Path>, options: UpOptions, yes: bool) -> anyhow::Result<()> {
    let project = utils::load_project(config)?;
    utils::print_loaded_files(&project);

    let deployer = project.deployer();
    let plan = deployer.preview().await?;
    utils::print_plan(&plan);
    println!();
    println!("{}", plan.summary().to_string().bold());

    if !yes {
        println!();
        if !utils::confirm("Provision these clusters?")? {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    println!();
    let spinner = utils::spinner("Provisioning clusters...");
    let report = match deployer.up(&options).await {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("{}", "✗ kubeform up failed".red().bold());
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    for cluster in &report.clusters {
        println!();
        println!("{}", format!("■ {}", cluster.name).bold());
        let addresses = &cluster.addresses;
        if let Some(lb) = &addresses.load_balancer {
            println!("  load balancer  {} {}", lb.name.cyan(), lb.address);
        }
        for host in &addresses.masters {
            println!("  control plane  {} {}", host.name.cyan(), host.address);
        }
        for host in &addresses.workers {
            println!("  worker         {} {}", host.name.cyan(), host.address);
        }
        if cluster.installed {
            println!("  {}", "✓ Kubernetes installed".green());
        } else if options.skip_install {
            println!("  {}", "ℹ installation skipped".dimmed());
        } else {
            println!("  {}", "✓ already installed on these hosts".green());
        }
    }

    println!();
    println!("{}", "✓ All clusters are up!".green().bold());
    println!(
        "{}",
        "  Connection info: kubeform output --show-secrets".dimmed()
    );

    Ok(())
}
