//! journai - terminal client for the journai mentor chat

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{AppContext, Cli, Commands};
use journai_core::ConfigManager;
use journai_core::api::load_dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let workspace = match &args.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine current dir")?,
    };

    let command = args.command.clone().unwrap_or(Commands::Chat { session: None });
    if let Commands::Init { force } = command {
        return cli::init::handle_init_command(&workspace, force);
    }

    let manager = match &args.config {
        Some(path) => ConfigManager::load_from_file(path)?,
        None => ConfigManager::load_from_workspace(&workspace)?,
    };
    let config_path = manager.config_path().map(|p| p.display().to_string());
    let mut config = manager.into_config();
    args.apply_overrides(&mut config);

    logging::init_logging(&config.logging.level)?;
    if let Some(path) = config_path {
        tracing::debug!(path = %path, "using configuration file");
    }
    load_dotenv();

    let app = AppContext::build(config)?;

    match command {
        Commands::Chat { session } => cli::chat::handle_chat_command(&app, session).await,
        Commands::Start { scores } => cli::session::handle_start_command(&app, scores).await,
        Commands::End { session, scores } => {
            cli::session::handle_end_command(&app, session, scores).await
        }
        Commands::History { session_id } => {
            cli::history::handle_history_command(&app, &session_id).await
        }
        Commands::Init { .. } => Ok(()),
    }
}
