mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kubeform")]
#[command(about = "Kubernetes clusters on OpenStack, from one topology file.", long_about = None)]
struct Cli {
    /// Settings file (default: discovered from the current directory)
    #[arg(short, long, global = true, env = "KUBEFORM_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every cluster and install Kubernetes
    Up {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Run the install playbook even if the hosts did not change
        #[arg(long)]
        reinstall: bool,
        /// Provision nodes and write inventories without running Ansible
        #[arg(long, conflicts_with = "reinstall")]
        skip_install: bool,
    },
    /// Show what `up` would change
    Preview,
    /// Destroy every provisioned resource
    Down {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the connection info of every cluster
    Output {
        /// Show kubeconfigs, inventories and private keys
        #[arg(long)]
        show_secrets: bool,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the settings and topology files
    Validate,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("kubeform {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Up {
            yes,
            reinstall,
            skip_install,
        } => {
            let options = kubeform_core::UpOptions {
                reinstall,
                skip_install,
            };
            commands::up::handle(config, options, yes).await?;
        }
        Commands::Preview => {
            commands::preview::handle(config).await?;
        }
        Commands::Down { yes } => {
            commands::down::handle(config, yes).await?;
        }
        Commands::Output { show_secrets, json } => {
            commands::output::handle(config, show_secrets, json).await?;
        }
        Commands::Validate => {
            commands::validate::handle(config)?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
