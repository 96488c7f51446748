//! CLI argument parsing

use clap::{Args, ColorChoice, Parser, Subcommand, ValueHint};
use journai_core::JournaiConfig;
use std::path::PathBuf;

/// journai terminal client
#[derive(Parser, Debug)]
#[command(
    name = "journai",
    version,
    about = "Chat with your journai mentor from the terminal\n\nQuick Start:\n  export JOURNAI_AUTH_TOKEN=\"your_token\"\n  journai --user-id <id> start --feeling 3 --motivation 3 --anxiety 3\n  journai --user-id <id> chat --session <session id>",
    color = ColorChoice::Auto
)]
pub struct Cli {
    /// Configuration file (skips the workspace/home lookup)
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Workspace root used to find `journai.toml`
    ///
    /// Default: Current directory
    #[arg(long, global = true, value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub workspace: Option<PathBuf>,

    /// Backend root URL, e.g. https://api.journai.app
    #[arg(long, global = true, value_name = "URL")]
    pub api_root: Option<String>,

    /// User id the session belongs to
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Mentor slug
    #[arg(long, global = true)]
    pub slug: Option<String>,

    /// Environment variable holding the authorization token
    #[arg(long, global = true, value_name = "VAR")]
    pub token_env: Option<String>,

    /// Log filter, e.g. `debug` or `journai_core=trace` (RUST_LOG wins)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Interactive chat (`/retry`, `/cancel`, `/history`, `/quit`)
    Chat {
        /// Session to chat in, as printed by `journai start`
        #[arg(long)]
        session: Option<String>,
    },

    /// Open a session with the pre-chat mood survey
    Start {
        #[command(flatten)]
        scores: ScoreArgs,
    },

    /// Close a session with the post-chat mood survey
    End {
        /// Session to end
        #[arg(long)]
        session: Option<String>,

        #[command(flatten)]
        scores: ScoreArgs,
    },

    /// Print the stored conversation of a session
    History { session_id: String },

    /// Write a default journai.toml into the workspace
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// The three mood survey answers
#[derive(Args, Debug, Clone, Copy)]
pub struct ScoreArgs {
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub feeling: u8,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub motivation: u8,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub anxiety: u8,
}

impl From<ScoreArgs> for journai_core::MoodScores {
    fn from(args: ScoreArgs) -> Self {
        Self::new(args.feeling, args.motivation, args.anxiety)
    }
}

impl Cli {
    /// Command-line values take precedence over the config file
    pub fn apply_overrides(&self, config: &mut JournaiConfig) {
        if let Some(root) = &self.api_root {
            config.api.root_url = root.trim_end_matches('/').to_string();
        }
        if let Some(user_id) = &self.user_id {
            config.context.user_id = user_id.clone();
        }
        if let Some(slug) = &self.slug {
            config.context.slug = slug.clone();
        }
        if let Some(token_env) = &self.token_env {
            config.auth.token_env = token_env.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}
