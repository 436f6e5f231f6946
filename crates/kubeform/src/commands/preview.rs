use crate::utils;
use colored::Colorize;
use std::path::Path;

pub async fn handle(config: Option<&Path>) -> anyhow::Result<()> {
    let project = utils::load_project(config)?;
    utils::print_loaded_files(&project);

    let deployer = project.deployer();
    let plan = deployer.preview().await?;

    utils::print_plan(&plan);
    println!();
    println!("{}", plan.summary().to_string().bold());

    Ok(())
}
