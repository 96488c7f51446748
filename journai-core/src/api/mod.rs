//! HTTP plumbing shared by the stream source, the session manager and the
//! history loader.

pub mod auth;
pub mod client;
pub mod context;

pub use auth::{AuthProvider, EnvTokenProvider, StaticToken, load_dotenv};
pub use client::ApiClient;
pub use context::{ChatContext, SharedContext};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Map a non-success status and its body onto the error taxonomy
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => ApiError::Authentication(if body.is_empty() {
                status.to_string()
            } else {
                body
            }),
            code => ApiError::Http { status: code, body },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
