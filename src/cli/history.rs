//! `history` subcommand

use super::AppContext;
use super::transcript::render_turn;
use anyhow::{Context, Result};
use console::style;
use journai_core::StoredHistoryLoader;

/// Handle the history command
pub async fn handle_history_command(app: &AppContext, session_id: &str) -> Result<()> {
    let loader = StoredHistoryLoader::new(app.api.clone());
    let turns = loader
        .load(session_id)
        .await
        .with_context(|| format!("failed to load history for session {session_id}"))?;

    if turns.is_empty() {
        println!("{}", style("No stored messages").dim());
        return Ok(());
    }

    for turn in &turns {
        println!(
            "{}",
            style(turn.timestamp.format("%Y-%m-%d %H:%M").to_string()).dim()
        );
        print!("{}", render_turn(turn));
    }
    Ok(())
}
