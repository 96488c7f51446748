//! Authorization header providers.
//!
//! The provider is handed to every component that talks to the backend; there
//! is no process-wide token lookup.

use anyhow::Result;
use std::env;

/// Supplies the value of the `Authorization` header
pub trait AuthProvider: Send + Sync {
    fn authorization_header(&self) -> String;
}

/// A fixed token, mostly useful for tests and one-off CLI invocations
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AuthProvider for StaticToken {
    fn authorization_header(&self) -> String {
        self.0.clone()
    }
}

/// Reads the token from an environment variable on every request so a
/// refreshed token is picked up without rebuilding clients.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    env_var: String,
    fallback: Option<String>,
}

impl EnvTokenProvider {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            fallback: None,
        }
    }

    /// Use `token` when the environment variable is unset or empty
    pub fn with_fallback(mut self, token: Option<String>) -> Self {
        self.fallback = token.filter(|t| !t.is_empty());
        self
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Resolve the token, failing when neither source provides one
    pub fn resolve(&self) -> Result<String> {
        if let Ok(token) = env::var(&self.env_var) {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        if let Some(token) = &self.fallback {
            return Ok(token.clone());
        }

        Err(anyhow::anyhow!(
            "No authorization token found. Set the {} environment variable (or add it to a .env file)",
            self.env_var
        ))
    }
}

impl AuthProvider for EnvTokenProvider {
    fn authorization_header(&self) -> String {
        match self.resolve() {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(%err, "sending request without authorization token");
                String::new()
            }
        }
    }
}

/// Load environment variables from a `.env` file in the current directory
///
/// A missing file is not an error; a malformed one is logged and ignored.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded environment variables");
        }
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to load .env file");
        }
    }
}
