//! The turn state machine.
//!
//! Owns the ordered turn list and folds stream events into it. Every event
//! carries the generation of the send it belongs to; only events of the
//! active generation are applied, so anything arriving for a canceled or
//! finished reply is ignored.

use super::ChatError;
use super::chunk::{Chunk, StreamEvent};
use super::turn::{LifecycleState, MessageType, OutboundMessage, Turn, TurnError};

/// A send the reconciler has registered and the caller must now put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub generation: u64,
    pub correlation_id: String,
    pub outbound: OutboundMessage,
}

#[derive(Debug, Clone)]
struct ActiveStream {
    correlation_id: String,
    /// Key of the turn being fed; `None` until a reply-only turn is created
    turn_key: Option<String>,
    generation: u64,
    outbound: OutboundMessage,
}

pub type IdGenerator = Box<dyn FnMut() -> String + Send>;

pub struct TurnReconciler {
    turns: Vec<Turn>,
    active: Option<ActiveStream>,
    generation: u64,
    next_id: IdGenerator,
}

impl std::fmt::Debug for TurnReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnReconciler")
            .field("turns", &self.turns.len())
            .field("active", &self.active)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Default for TurnReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnReconciler {
    /// Reconciler with random v4 UUID correlation ids
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(|| uuid::Uuid::new_v4().to_string()))
    }

    pub fn with_id_generator(next_id: IdGenerator) -> Self {
        Self {
            turns: Vec::new(),
            active: None,
            generation: 0,
            next_id,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    /// Register a new send. Any in-flight reply is canceled first.
    pub fn begin_send(&mut self, outbound: OutboundMessage) -> Result<PendingSend, ChatError> {
        if outbound.text.trim().is_empty() {
            tracing::warn!("refusing to send an empty message");
            return Err(ChatError::EmptyMessage);
        }

        self.cancel_active();

        let correlation_id = (self.next_id)();
        self.generation += 1;

        let turn_key = if outbound.message_type == MessageType::User {
            self.turns
                .push(Turn::pending(correlation_id.clone(), &outbound));
            Some(correlation_id.clone())
        } else {
            None
        };

        tracing::debug!(
            run_id = %correlation_id,
            generation = self.generation,
            message_type = ?outbound.message_type,
            "send registered"
        );

        self.active = Some(ActiveStream {
            correlation_id: correlation_id.clone(),
            turn_key,
            generation: self.generation,
            outbound: outbound.clone(),
        });

        Ok(PendingSend {
            generation: self.generation,
            correlation_id,
            outbound,
        })
    }

    /// Fold one event into the turn list; returns whether it was applied
    pub fn apply(&mut self, generation: u64, event: StreamEvent) -> bool {
        if self.active_generation() != Some(generation) {
            tracing::debug!(generation, "ignoring event for an inactive stream");
            return false;
        }

        match event {
            StreamEvent::Start => {
                if let Some(turn) = self.active_turn_mut() {
                    turn.lifecycle = LifecycleState::Streaming;
                }
            }
            StreamEvent::Chunk(chunk) => {
                let server_error = chunk.error_message().map(str::to_string);
                self.append_chunk(chunk);
                if let Some(message) = server_error {
                    self.finish(LifecycleState::Error(TurnError::Server(message)));
                }
            }
            StreamEvent::Done => self.finish(LifecycleState::Complete),
            StreamEvent::Error(err) => self.finish(LifecycleState::Error(err)),
        }
        true
    }

    /// Force the in-flight reply, if any, into `error(canceled)`
    pub fn cancel_active(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        tracing::debug!("canceling in-flight reply");
        self.finish(LifecycleState::Error(TurnError::Canceled));
        true
    }

    /// Remove an errored turn and send its original message again
    pub fn retry(&mut self, index: usize) -> Result<PendingSend, ChatError> {
        let turn = self.turns.get(index).ok_or(ChatError::NoSuchTurn(index))?;
        let outbound = match (&turn.origin, turn.can_retry()) {
            (Some(origin), true) => origin.clone(),
            _ => {
                tracing::warn!(turn_id = %turn.id, "turn is not retryable");
                return Err(ChatError::NotRetryable(index));
            }
        };

        self.turns.remove(index);
        self.begin_send(outbound)
    }

    /// Index of the most recent retryable turn
    pub fn last_retryable(&self) -> Option<usize> {
        self.turns.iter().rposition(Turn::can_retry)
    }

    /// Replace previously loaded history; stored turns always precede live ones
    pub fn load_history(&mut self, stored: Vec<Turn>) {
        self.turns.retain(|turn| !turn.is_stored());
        let live = std::mem::replace(&mut self.turns, stored);
        self.turns.extend(live);
    }

    pub fn reset(&mut self) {
        self.turns.clear();
        self.active = None;
    }

    fn active_turn_mut(&mut self) -> Option<&mut Turn> {
        let key = self.active.as_ref()?.turn_key.as_deref()?;
        self.turns.iter_mut().rev().find(|turn| turn.id == key)
    }

    fn append_chunk(&mut self, chunk: Chunk) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let key = match active.turn_key.clone() {
            Some(key) => key,
            // Replies to non-user sends get their turn on the first chunk
            None => {
                self.turns
                    .push(Turn::reply_only(active.correlation_id.clone(), &active.outbound));
                active.turn_key = Some(active.correlation_id.clone());
                active.correlation_id.clone()
            }
        };

        // The server id replaces the correlation id once, on first sight
        let promote = key == active.correlation_id && !chunk.id.is_empty() && chunk.id != key;
        if promote {
            active.turn_key = Some(chunk.id.clone());
        }

        let Some(turn) = self.turns.iter_mut().rev().find(|turn| turn.id == key) else {
            return;
        };

        if promote {
            tracing::debug!(from = %turn.id, to = %chunk.id, "turn promoted to server id");
            turn.id = chunk.id.clone();
        }
        if turn.lifecycle == LifecycleState::WaitingForStreamToStart {
            turn.lifecycle = LifecycleState::Streaming;
        }
        turn.push_chunk(chunk);
    }

    fn finish(&mut self, state: LifecycleState) {
        if let LifecycleState::Error(err) = &state {
            if self.active_turn_mut().is_none() {
                // Failure before any reply chunk of a non-user send
                if let Some(active) = self.active.as_mut() {
                    self.turns
                        .push(Turn::reply_only(active.correlation_id.clone(), &active.outbound));
                    active.turn_key = Some(active.correlation_id.clone());
                }
            }
            tracing::debug!(error = %err, "reply failed");
        }

        if let Some(turn) = self.active_turn_mut() {
            turn.lifecycle = state;
        }
        self.active = None;
    }
}
