use crate::utils;
use colored::Colorize;
use std::path::Path;

pub fn handle(config: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating configuration...".blue());

    let checked = utils::load_project(config).and_then(|project| {
        let layouts = kubeform_core::build_layouts(&project.topology, &project.settings)?;
        Ok((project, layouts))
    });
    let (project, layouts) = match checked {
        Ok(checked) => checked,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Configuration error".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    };

    utils::print_loaded_files(&project);
    println!("{}", "✓ Configuration is valid!".green().bold());
    println!();

    for layout in layouts {
        println!("{} ({} node(s))", layout.name.cyan(), layout.nodes().count());
        for node in layout.nodes() {
            println!(
                "  - {} ({}, {})",
                node.name(),
                node.role,
                node.instance.flavor.dimmed()
            );
        }
    }

    Ok(())
}
