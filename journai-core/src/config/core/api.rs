use crate::config::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend connection settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// Root URL of the journai backend, without a trailing slash
    #[serde(default = "default_root_url")]
    pub root_url: String,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for plain JSON requests (session start/end, history)
    ///
    /// Streaming requests are bounded by `stream.idle_timeout_secs` instead.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            root_url: default_root_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where the authorization token comes from
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// Environment variable holding the token (also read from `.env`)
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

/// Identifiers normally supplied by the onboarding flow
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContextConfig {
    #[serde(default)]
    pub user_id: String,

    /// Mentor slug used to address the conversation
    #[serde(default = "default_slug")]
    pub slug: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            slug: default_slug(),
        }
    }
}

fn default_root_url() -> String {
    defaults::DEFAULT_API_ROOT.to_string()
}
fn default_connect_timeout() -> u64 {
    defaults::DEFAULT_CONNECT_TIMEOUT_SECS
}
fn default_request_timeout() -> u64 {
    defaults::DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    defaults::DEFAULT_USER_AGENT.to_string()
}
fn default_token_env() -> String {
    defaults::DEFAULT_TOKEN_ENV.to_string()
}
fn default_slug() -> String {
    defaults::DEFAULT_SLUG.to_string()
}
