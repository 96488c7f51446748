//! Stored conversation history, adapted into [`Turn`]s.

use crate::api::{ApiClient, ApiError};
use crate::chat::chunk::lenient_timestamp;
use crate::chat::{MessageScope, MessageType, Turn};
use crate::config::constants::api::session_messages_path;
use crate::config::constants::defaults::NO_SESSION_ID;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One persisted message as the server returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Correlation id shared by a user message and the reply to it
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub scope: MessageScope,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_step: Option<u32>,
    #[serde(default)]
    pub step_repetitions: Option<u32>,
}

#[derive(Default)]
struct Group {
    user: Option<String>,
    assistant: Option<String>,
    internal: bool,
    created_at: Option<DateTime<Utc>>,
    current_step: Option<u32>,
    step_repetitions: Option<u32>,
}

fn append(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(text);
        }
        None => *slot = Some(text.to_string()),
    }
}

/// Group messages by id, in order of first appearance
///
/// `USER` messages fill the user side and everything else the assistant
/// side. Groups with only one side still make a turn.
pub fn group_into_turns(messages: Vec<StoredMessage>) -> Vec<Turn> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();

    for message in messages {
        let group = groups.entry(message.id.clone()).or_insert_with(|| {
            order.push(message.id.clone());
            Group::default()
        });

        match message.message_type {
            MessageType::User => {
                append(&mut group.user, &message.content);
                group.internal = message.scope == MessageScope::Internal;
            }
            MessageType::Assistant | MessageType::System => {
                append(&mut group.assistant, &message.content)
            }
        }

        group.created_at = group.created_at.or(message.created_at);
        if message.current_step.is_some() {
            group.current_step = message.current_step;
        }
        if message.step_repetitions.is_some() {
            group.step_repetitions = message.step_repetitions;
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let group = groups.remove(&id)?;
            let timestamp = group.created_at.unwrap_or(DateTime::<Utc>::default());
            let mut turn = Turn::stored(id, timestamp, group.user, group.assistant);
            turn.is_user_message_internal = group.internal;
            turn.current_step = group.current_step;
            turn.step_repetitions = group.step_repetitions;
            Some(turn)
        })
        .collect()
}

/// Fetches a session's persisted messages
#[derive(Debug, Clone)]
pub struct StoredHistoryLoader {
    api: ApiClient,
}

impl StoredHistoryLoader {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Stored turns of a session; the `"none"` placeholder yields nothing
    pub async fn load(&self, session_id: &str) -> Result<Vec<Turn>, ApiError> {
        if session_id.is_empty() || session_id == NO_SESSION_ID {
            tracing::debug!("no session id; skipping history fetch");
            return Ok(Vec::new());
        }

        let messages: Vec<StoredMessage> = self
            .api
            .get_json(&session_messages_path(session_id))
            .await?;
        let turns = group_into_turns(messages);
        tracing::debug!(session_id, turns = turns.len(), "history loaded");
        Ok(turns)
    }
}
