//! Streaming chat ingestion: wire records, decoding, pacing and the turn
//! state machine, wired together by [`ChatStore`].

pub mod chunk;
pub mod decoder;
pub mod reconciler;
pub mod source;
pub mod store;
pub mod throttle;
pub mod turn;

pub use chunk::{Chunk, ChunkKind, StreamEvent};
pub use decoder::{ChunkDecoder, FrameError, decode_frame};
pub use reconciler::{PendingSend, TurnReconciler};
pub use source::{EventStreamSource, FrameSource, RawFrame, StreamRequest};
pub use store::{ChatSnapshot, ChatStore};
pub use throttle::Throttler;
pub use turn::{LifecycleState, MessageScope, MessageType, OutboundMessage, Turn, TurnError};

use crate::api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("no session is open")]
    MissingSession,
    #[error("turn {0} has not failed and cannot be retried")]
    NotRetryable(usize),
    #[error("there is no turn {0}")]
    NoSuchTurn(usize),
    #[error("nothing to retry")]
    NothingToRetry,
    #[error("chat store has shut down")]
    StoreClosed,
    #[error(transparent)]
    Api(#[from] ApiError),
}
