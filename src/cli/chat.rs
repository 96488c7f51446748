//! Interactive chat loop

use super::AppContext;
use super::transcript::{TranscriptView, render_turn};
use anyhow::{Result, bail};
use console::style;
use journai_core::{ChatError, ChatStore, EventStreamSource, StoredHistoryLoader};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Message(String),
    Retry,
    Cancel,
    History,
    Quit,
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "" => Input::Empty,
        "/retry" => Input::Retry,
        "/cancel" => Input::Cancel,
        "/history" => Input::History,
        "/quit" | "/exit" => Input::Quit,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd.to_string()),
        text => Input::Message(text.to_string()),
    }
}

/// Handle the chat command
pub async fn handle_chat_command(app: &AppContext, session: Option<String>) -> Result<()> {
    if let Some(id) = session {
        app.context.write().session_log_id = Some(id);
    }
    let Some(session_id) = app.context.read().session_id().map(str::to_string) else {
        bail!("No session. Run `journai start ...` and pass its id with --session");
    };

    let source = EventStreamSource::new(app.api.clone(), app.config.stream.idle_timeout());
    let store = ChatStore::spawn(Arc::new(source), app.context.clone(), &app.config.throttle);
    let loader = StoredHistoryLoader::new(app.api.clone());

    println!("{}", style("journai chat").blue().bold());
    println!("Session: {session_id}");
    println!("Commands: /retry /cancel /history /quit");
    println!();

    show_history(&store, &loader, &session_id).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = store.subscribe();
    let mut view = TranscriptView::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let outcome = match parse_input(&line) {
                    Input::Empty => Ok(()),
                    Input::Quit => break,
                    Input::Message(text) => store.send_message(text).await,
                    Input::Retry => store.retry_last().await,
                    Input::Cancel => store.cancel_stream().await.map(|canceled| {
                        if !canceled {
                            println!("{}", style("Nothing to cancel").dim());
                        }
                    }),
                    Input::History => {
                        show_history(&store, &loader, &session_id).await;
                        Ok(())
                    }
                    Input::Unknown(cmd) => {
                        println!("{}", style(format!("Unknown command {cmd}")).yellow());
                        Ok(())
                    }
                };
                report(outcome)?;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print!("{}", view.update(&snapshot));
                std::io::stdout().flush()?;
            }
        }
    }

    let _ = store.cancel_stream().await;
    Ok(())
}

/// Print recoverable errors; only a dead store ends the loop
fn report(outcome: Result<(), ChatError>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(ChatError::StoreClosed) => bail!(ChatError::StoreClosed),
        Err(err) => {
            println!("{}", style(err.to_string()).red());
            Ok(())
        }
    }
}

async fn show_history(store: &ChatStore, loader: &StoredHistoryLoader, session_id: &str) {
    match store.reload_history(loader, session_id).await {
        Ok(0) => {}
        Ok(_) => {
            for turn in store.snapshot().turns.iter().filter(|t| t.is_stored()) {
                print!("{}", render_turn(turn));
            }
            println!();
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not load history");
            println!("{}", style(format!("History unavailable: {err}")).yellow());
        }
    }
}
