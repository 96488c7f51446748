//! `init` subcommand

use anyhow::{Context, Result};
use console::style;
use journai_core::JournaiConfig;
use std::path::Path;

/// Handle the init command
pub fn handle_init_command(workspace: &Path, force: bool) -> Result<()> {
    println!("{}", style("Initialize journai configuration").blue().bold());
    println!("Workspace: {}", workspace.display());

    let created = JournaiConfig::bootstrap_project(workspace, force)
        .with_context(|| "failed to initialize configuration files")?;

    if created.is_empty() {
        println!("Configuration already exists; use --force to overwrite");
    } else {
        for file in created {
            println!("{} {file}", style("created").green());
        }
    }
    Ok(())
}
