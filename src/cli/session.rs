//! `start` and `end` subcommands

use super::AppContext;
use super::args::ScoreArgs;
use anyhow::{Context, Result, bail};
use console::style;
use journai_core::SessionLifecycleManager;

/// Handle the start command
pub async fn handle_start_command(app: &AppContext, scores: ScoreArgs) -> Result<()> {
    if app.context.read().user_id.is_empty() {
        bail!("No user id. Pass --user-id or set [context].user_id in journai.toml");
    }

    let sessions = SessionLifecycleManager::new(app.api.clone(), app.context.clone());
    let log = sessions
        .start_session(scores.into())
        .await
        .context("failed to start session")?;

    println!("{} {}", style("Session started:").green().bold(), log.id);
    println!("Continue with: journai chat --session {}", log.id);
    Ok(())
}

/// Handle the end command
pub async fn handle_end_command(
    app: &AppContext,
    session: Option<String>,
    scores: ScoreArgs,
) -> Result<()> {
    let sessions = SessionLifecycleManager::new(app.api.clone(), app.context.clone());
    let status = sessions
        .end_session(session.as_deref(), scores.into())
        .await
        .context("failed to end session")?;

    match status {
        Some(status) => println!("{} {status:?}", style("Session ended:").green().bold()),
        None => println!("{}", style("No session to end").yellow()),
    }
    Ok(())
}
