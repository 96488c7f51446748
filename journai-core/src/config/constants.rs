/// Backend endpoint paths, relative to the configured API root
pub mod api {
    pub const SESSIONS_SEGMENT: &str = "/api/sessions/slug";
    pub const USERS_SEGMENT: &str = "/api/users";
    pub const SESSION_LOGS_SEGMENT: &str = "/api/session-logs";

    /// `POST /api/sessions/slug/{slug}` opens the streaming reply for one message
    pub fn stream_path(slug: &str) -> String {
        format!("{SESSIONS_SEGMENT}/{slug}")
    }

    /// `POST /api/users/{user_id}/sessions/slug/{slug}/start`
    pub fn start_session_path(user_id: &str, slug: &str) -> String {
        format!("{USERS_SEGMENT}/{user_id}/sessions/slug/{slug}/start")
    }

    /// `POST /api/session-logs/{id}/end`
    pub fn end_session_path(session_log_id: &str) -> String {
        format!("{SESSION_LOGS_SEGMENT}/{session_log_id}/end")
    }

    /// `GET /api/session-logs/{id}/messages`
    pub fn session_messages_path(session_log_id: &str) -> String {
        format!("{SESSION_LOGS_SEGMENT}/{session_log_id}/messages")
    }
}

/// Framing markers of the streaming response body
pub mod frames {
    pub const DATA_PREFIX: &str = "data:";
    pub const START_SENTINEL: &str = "[START]";
    pub const DONE_SENTINEL: &str = "[DONE]";
    pub const COMMENT_PREFIX: char = ':';
}

/// Default configuration values
pub mod defaults {
    pub const DEFAULT_API_ROOT: &str = "http://localhost:3000";
    pub const DEFAULT_TOKEN_ENV: &str = "JOURNAI_AUTH_TOKEN";
    pub const DEFAULT_USER_AGENT: &str = "journai/0.3";
    pub const DEFAULT_SLUG: &str = "sam";
    pub const DEFAULT_LOG_LEVEL: &str = "info";
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
    /// Zero disables pacing entirely
    pub const DEFAULT_MAX_CHUNKS_PER_SECOND: u32 = 0;
    pub const DEFAULT_JITTER_MS: u64 = 0;
    /// Placeholder session id the app uses before a session exists
    pub const NO_SESSION_ID: &str = "none";
}

/// Config file locations
pub mod files {
    pub const CONFIG_FILE_NAME: &str = "journai.toml";
    pub const CONFIG_DIR_NAME: &str = ".journai";
}

/// User-facing copy shared by renderers
pub mod copy {
    pub const RETRY_AFFORDANCE: &str = "Something went wrong. Use /retry to try again.";
    pub const MENTOR_NAME: &str = "Sam";
}
