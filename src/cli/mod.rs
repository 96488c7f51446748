//! Command-line interface module
//!
//! Argument parsing plus one handler per subcommand.

pub mod args;
pub mod chat;
pub mod history;
pub mod init;
pub mod session;
pub mod transcript;

pub use args::{Cli, Commands, ScoreArgs};

use anyhow::{Context, Result};
use journai_core::{ApiClient, ChatContext, EnvTokenProvider, JournaiConfig, SharedContext};
use std::sync::Arc;

/// Everything the handlers share
pub struct AppContext {
    pub config: JournaiConfig,
    pub api: ApiClient,
    pub context: SharedContext,
}

impl AppContext {
    pub fn build(config: JournaiConfig) -> Result<Self> {
        let auth = EnvTokenProvider::new(&config.auth.token_env);
        if let Err(err) = auth.resolve() {
            tracing::warn!(error = %err, "requests will be sent without a token");
        }

        let api = ApiClient::new(&config.api, Arc::new(auth))
            .context("failed to build HTTP client")?;
        let context = ChatContext::new(&config.context.user_id, &config.context.slug).shared();

        Ok(Self {
            config,
            api,
            context,
        })
    }
}
