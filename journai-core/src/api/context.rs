use crate::config::constants::defaults::NO_SESSION_ID;
use parking_lot::RwLock;
use std::sync::Arc;

/// Identifiers supplied by the surrounding onboarding/navigation flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatContext {
    pub user_id: String,
    pub slug: String,
    pub session_log_id: Option<String>,
}

/// Context shared between the session manager (writer) and the chat store
pub type SharedContext = Arc<RwLock<ChatContext>>;

impl ChatContext {
    pub fn new(user_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            slug: slug.into(),
            session_log_id: None,
        }
    }

    pub fn with_session(mut self, session_log_id: impl Into<String>) -> Self {
        self.session_log_id = Some(session_log_id.into());
        self
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(RwLock::new(self))
    }

    /// The current session id, ignoring the `"none"` placeholder
    pub fn session_id(&self) -> Option<&str> {
        self.session_log_id
            .as_deref()
            .filter(|id| !id.is_empty() && *id != NO_SESSION_ID)
    }
}
