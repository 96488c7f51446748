//! Session lifecycle: opening a session with the pre-chat mood survey and
//! closing it with the post-chat one.

use crate::api::{ApiClient, ApiError, SharedContext};
use crate::config::constants::api::{end_session_path, start_session_path};
use crate::config::constants::defaults::NO_SESSION_ID;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The three survey answers collected before and after a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodScores {
    pub feeling: u8,
    pub motivation: u8,
    pub anxiety: u8,
}

impl MoodScores {
    pub fn new(feeling: u8, motivation: u8, anxiety: u8) -> Self {
        Self {
            feeling,
            motivation,
            anxiety,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreScores {
    pre_feeling_score: u8,
    pre_motivation_score: u8,
    pre_anxiety_score: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostScores {
    post_feeling_score: u8,
    post_motivation_score: u8,
    post_anxiety_score: u8,
}

impl From<MoodScores> for PreScores {
    fn from(s: MoodScores) -> Self {
        Self {
            pre_feeling_score: s.feeling,
            pre_motivation_score: s.motivation,
            pre_anxiety_score: s.anxiety,
        }
    }
}

impl From<MoodScores> for PostScores {
    fn from(s: MoodScores) -> Self {
        Self {
            post_feeling_score: s.feeling,
            post_motivation_score: s.motivation,
            post_anxiety_score: s.anxiety,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Aborted,
}

/// Server record of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLog {
    pub id: String,
    pub status: SessionStatus,
}

/// Observable progress of one request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState<T> {
    #[default]
    Idle,
    Loading,
    Success(T),
    Error(String),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Starts and ends sessions, keeping the shared context's session id current
#[derive(Debug)]
pub struct SessionLifecycleManager {
    api: ApiClient,
    context: SharedContext,
    start_state: watch::Sender<RequestState<SessionLog>>,
    end_state: watch::Sender<RequestState<SessionStatus>>,
}

impl SessionLifecycleManager {
    pub fn new(api: ApiClient, context: SharedContext) -> Self {
        Self {
            api,
            context,
            start_state: watch::Sender::new(RequestState::Idle),
            end_state: watch::Sender::new(RequestState::Idle),
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn watch_start(&self) -> watch::Receiver<RequestState<SessionLog>> {
        self.start_state.subscribe()
    }

    pub fn watch_end(&self) -> watch::Receiver<RequestState<SessionStatus>> {
        self.end_state.subscribe()
    }

    /// Open a session and record its id in the shared context
    pub async fn start_session(&self, scores: MoodScores) -> Result<SessionLog, ApiError> {
        let (user_id, slug) = {
            let context = self.context.read();
            (context.user_id.clone(), context.slug.clone())
        };
        if user_id.is_empty() {
            let err = ApiError::InvalidRequest("user id is not set".into());
            self.start_state.send_replace(RequestState::Error(err.to_string()));
            return Err(err);
        }

        self.start_state.send_replace(RequestState::Loading);
        let result: Result<SessionLog, ApiError> = self
            .api
            .post_json(&start_session_path(&user_id, &slug), &PreScores::from(scores))
            .await;

        match result {
            Ok(log) => {
                tracing::info!(session_id = %log.id, "session started");
                self.context.write().session_log_id = Some(log.id.clone());
                self.start_state
                    .send_replace(RequestState::Success(log.clone()));
                Ok(log)
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to start session");
                self.start_state
                    .send_replace(RequestState::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Close a session with the post-chat scores
    ///
    /// Falls back to the context's session id when `session_id` is `None`.
    /// With no usable id at all this does nothing and returns `Ok(None)`.
    pub async fn end_session(
        &self,
        session_id: Option<&str>,
        scores: MoodScores,
    ) -> Result<Option<SessionStatus>, ApiError> {
        let explicit = session_id
            .filter(|id| !id.is_empty() && *id != NO_SESSION_ID)
            .map(str::to_string);
        let Some(id) = explicit.or_else(|| self.context.read().session_id().map(str::to_string))
        else {
            tracing::warn!("end_session called without a session id; nothing to end");
            return Ok(None);
        };

        self.end_state.send_replace(RequestState::Loading);
        let result: Result<SessionLog, ApiError> = self
            .api
            .post_json(&end_session_path(&id), &PostScores::from(scores))
            .await;

        match result {
            Ok(log) => {
                tracing::info!(session_id = %id, status = ?log.status, "session ended");
                let mut context = self.context.write();
                if context.session_log_id.as_deref() == Some(id.as_str()) {
                    context.session_log_id = None;
                }
                drop(context);
                self.end_state
                    .send_replace(RequestState::Success(log.status));
                Ok(Some(log.status))
            }
            Err(err) => {
                tracing::error!(session_id = %id, error = %err, "failed to end session");
                self.end_state
                    .send_replace(RequestState::Error(err.to_string()));
                Err(err)
            }
        }
    }
}
