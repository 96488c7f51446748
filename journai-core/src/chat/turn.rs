//! Turns (message pairs): the unit the renderer draws.

use super::chunk::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Author of a message on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    User,
    Assistant,
    System,
}

/// Whether a message is shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageScope {
    #[default]
    External,
    /// Drives the protocol (e.g. the opening greeting) but stays hidden
    Internal,
}

/// Why a turn failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("connection failed: {0}")]
    Transport(String),
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("server reported an error: {0}")]
    Server(String),
    #[error("stream ended before the reply finished")]
    Interrupted,
    #[error("no data received for {0:?}")]
    TimedOut(Duration),
    #[error("canceled")]
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    WaitingForStreamToStart,
    Streaming,
    Complete,
    Error(TurnError),
    /// Loaded from history; never entered by the live path
    Stored,
}

impl LifecycleState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::WaitingForStreamToStart | Self::Streaming)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// The message as originally sent; replayed verbatim on retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub scope: MessageScope,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>, message_type: MessageType, scope: MessageScope) -> Self {
        Self {
            text: text.into(),
            message_type,
            scope,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, MessageType::User, MessageScope::External)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_message: Option<String>,
    /// Always the concatenation of `chunks` text deltas for live turns
    pub assistant_message: Option<String>,
    pub lifecycle: LifecycleState,
    /// `None` for turns loaded from history
    pub chunks: Option<Vec<Chunk>>,
    pub is_user_message_internal: bool,
    pub current_step: Option<u32>,
    pub step_repetitions: Option<u32>,
    pub origin: Option<OutboundMessage>,
}

impl Turn {
    /// Optimistic turn inserted as soon as the user sends
    pub(crate) fn pending(id: String, outbound: &OutboundMessage) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            user_message: Some(outbound.text.clone()),
            assistant_message: None,
            lifecycle: LifecycleState::WaitingForStreamToStart,
            chunks: Some(Vec::new()),
            is_user_message_internal: outbound.scope == MessageScope::Internal,
            current_step: None,
            step_repetitions: None,
            origin: Some(outbound.clone()),
        }
    }

    /// Assistant-only turn for replies to non-user sends
    pub(crate) fn reply_only(id: String, outbound: &OutboundMessage) -> Self {
        Self {
            user_message: None,
            assistant_message: Some(String::new()),
            is_user_message_internal: false,
            ..Self::pending(id, outbound)
        }
    }

    pub fn stored(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        user_message: Option<String>,
        assistant_message: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            user_message,
            assistant_message,
            lifecycle: LifecycleState::Stored,
            chunks: None,
            is_user_message_internal: false,
            current_step: None,
            step_repetitions: None,
            origin: None,
        }
    }

    pub fn is_pair(&self) -> bool {
        self.user_message.is_some() && self.assistant_message.is_some()
    }

    pub fn is_ai_only(&self) -> bool {
        self.user_message.is_none() && self.assistant_message.is_some()
    }

    pub fn is_user_only(&self) -> bool {
        self.user_message.is_some() && self.assistant_message.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn is_stored(&self) -> bool {
        self.lifecycle == LifecycleState::Stored
    }

    pub fn can_retry(&self) -> bool {
        self.lifecycle.is_error() && self.origin.is_some()
    }

    /// The user bubble, or `None` when it should not be drawn
    pub fn visible_user_message(&self) -> Option<&str> {
        if self.is_user_message_internal {
            None
        } else {
            self.user_message.as_deref()
        }
    }

    pub fn error(&self) -> Option<&TurnError> {
        match &self.lifecycle {
            LifecycleState::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Append a chunk and re-derive the assistant text from the full buffer
    pub(crate) fn push_chunk(&mut self, chunk: Chunk) {
        if chunk.current_step.is_some() {
            self.current_step = chunk.current_step;
        }
        if chunk.step_repetitions.is_some() {
            self.step_repetitions = chunk.step_repetitions;
        }

        let chunks = self.chunks.get_or_insert_with(Vec::new);
        chunks.push(chunk);
        self.assistant_message = Some(chunks.iter().map(Chunk::text_delta).collect());
    }
}
