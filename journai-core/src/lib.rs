//! # journai-core - streaming mentor chat
//!
//! `journai-core` is the client-side chat pipeline of the journai mentoring
//! app. It opens the streaming reply request, decodes `data:` frames,
//! reassembles them into message turns and hands snapshots to whatever
//! renders them.
//!
//! ## Architecture Overview
//!
//! - `chat/`: frame decoding, the HTTP frame source, delivery pacing, the
//!   turn state machine and the [`ChatStore`] actor that wires them up.
//! - `session/`: opening and closing sessions around the mood surveys.
//! - `history/`: stored messages of a past session, grouped into turns.
//! - `api/`: HTTP client, authorization providers and the shared
//!   identifier context.
//! - `config/`: `journai.toml` loading and centralized constants.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use journai_core::{ChatContext, ChatStore, ConfigManager, EventStreamSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anyhow::Error> {
//!     let config = ConfigManager::load()?.into_config();
//!     let auth = std::sync::Arc::new(journai_core::EnvTokenProvider::new(&config.auth.token_env));
//!     let api = journai_core::ApiClient::new(&config.api, auth)?;
//!
//!     let context = ChatContext::new("user-1", "sam").with_session("log-7").shared();
//!     let source = EventStreamSource::new(api, config.stream.idle_timeout());
//!     let store = ChatStore::spawn(std::sync::Arc::new(source), context, &config.throttle);
//!
//!     store.send_message("Hello").await?;
//!     let snapshot = store.wait_until_idle().await?;
//!     println!("{:?}", snapshot.turns.last().and_then(|t| t.assistant_message.clone()));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod history;
pub mod session;

pub use api::{
    ApiClient, ApiError, AuthProvider, ChatContext, EnvTokenProvider, SharedContext, StaticToken,
};
pub use chat::{
    ChatError, ChatSnapshot, ChatStore, Chunk, ChunkDecoder, ChunkKind, EventStreamSource,
    FrameSource, LifecycleState, MessageScope, MessageType, OutboundMessage, RawFrame,
    StreamEvent, StreamRequest, Throttler, Turn, TurnError, TurnReconciler,
};
pub use config::{ConfigManager, JournaiConfig};
pub use history::{StoredHistoryLoader, StoredMessage, group_into_turns};
pub use session::{MoodScores, RequestState, SessionLifecycleManager, SessionLog, SessionStatus};
