//! The chat store: one actor task that owns the conversation.
//!
//! Commands arrive over a channel, paced stream events arrive from the
//! throttler, and every mutation of the turn list happens on the actor task.
//! Subscribers observe [`ChatSnapshot`]s through a `watch` channel.

use super::ChatError;
use super::chunk::StreamEvent;
use super::decoder::ChunkDecoder;
use super::reconciler::{PendingSend, TurnReconciler};
use super::source::{FrameSource, RawFrame, StreamRequest};
use super::throttle::Throttler;
use super::turn::{OutboundMessage, Turn, TurnError};
use crate::api::SharedContext;
use crate::config::ThrottleConfig;
use crate::history::StoredHistoryLoader;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What subscribers see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub turns: Vec<Turn>,
    pub is_streaming: bool,
}

impl ChatSnapshot {
    /// Index of the newest turn that can be retried
    pub fn last_retryable(&self) -> Option<usize> {
        self.turns.iter().rposition(Turn::can_retry)
    }
}

type Reply<T> = oneshot::Sender<Result<T, ChatError>>;
type Paced = (u64, StreamEvent);

enum Command {
    Send {
        outbound: OutboundMessage,
        reply: Reply<()>,
    },
    Retry {
        index: Option<usize>,
        reply: Reply<()>,
    },
    Cancel {
        reply: Reply<bool>,
    },
    LoadHistory {
        turns: Vec<Turn>,
        reply: Reply<()>,
    },
    Reset {
        reply: Reply<()>,
    },
}

/// Handle to the chat actor; cheap to clone
#[derive(Debug, Clone)]
pub struct ChatStore {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ChatSnapshot>,
}

impl ChatStore {
    /// Spawn the actor on the current tokio runtime
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        context: SharedContext,
        throttle: &ThrottleConfig,
    ) -> Self {
        Self::spawn_with(TurnReconciler::new(), source, context, throttle)
    }

    /// Spawn with a preconfigured reconciler (e.g. deterministic ids)
    pub fn spawn_with(
        reconciler: TurnReconciler,
        source: Arc<dyn FrameSource>,
        context: SharedContext,
        throttle: &ThrottleConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<Paced>();
        let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot::default());

        let throttler = Arc::new(Throttler::new(throttle, move |paced: Paced| {
            let _ = events_tx.send(paced);
        }));

        let actor = ChatActor {
            reconciler,
            source,
            context,
            throttler,
            stream: None,
            snapshots: snapshot_tx,
        };
        tokio::spawn(actor.run(commands_rx, events_rx));

        Self {
            commands: commands_tx,
            snapshots: snapshot_rx,
        }
    }

    /// Send a visible user message
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.send(OutboundMessage::user(text)).await
    }

    /// Send a message with an explicit type and scope
    pub async fn send(&self, outbound: OutboundMessage) -> Result<(), ChatError> {
        self.call(|reply| Command::Send { outbound, reply }).await
    }

    pub async fn retry(&self, index: usize) -> Result<(), ChatError> {
        self.call(|reply| Command::Retry {
            index: Some(index),
            reply,
        })
        .await
    }

    /// Retry the newest errored turn
    pub async fn retry_last(&self) -> Result<(), ChatError> {
        self.call(|reply| Command::Retry { index: None, reply })
            .await
    }

    /// Cancel the in-flight reply; `false` when nothing was streaming
    pub async fn cancel_stream(&self) -> Result<bool, ChatError> {
        self.call(|reply| Command::Cancel { reply }).await
    }

    pub async fn load_history(&self, turns: Vec<Turn>) -> Result<(), ChatError> {
        self.call(|reply| Command::LoadHistory { turns, reply })
            .await
    }

    /// Fetch a session's stored turns and place them before the live ones
    pub async fn reload_history(
        &self,
        loader: &StoredHistoryLoader,
        session_id: &str,
    ) -> Result<usize, ChatError> {
        let turns = loader.load(session_id).await?;
        let count = turns.len();
        self.load_history(turns).await?;
        Ok(count)
    }

    pub async fn reset(&self) -> Result<(), ChatError> {
        self.call(|reply| Command::Reset { reply }).await
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until no reply is streaming and return that snapshot
    pub async fn wait_until_idle(&self) -> Result<ChatSnapshot, ChatError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|snapshot| !snapshot.is_streaming)
            .await
            .map_err(|_| ChatError::StoreClosed)?;
        Ok(snapshot.clone())
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, ChatError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ChatError::StoreClosed)?;
        response.await.map_err(|_| ChatError::StoreClosed)?
    }
}

struct ActiveTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct ChatActor {
    reconciler: TurnReconciler,
    source: Arc<dyn FrameSource>,
    context: SharedContext,
    throttler: Arc<Throttler<Paced>>,
    stream: Option<ActiveTask>,
    snapshots: watch::Sender<ChatSnapshot>,
}

impl ChatActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Paced>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some((generation, event)) = events.recv() => {
                    if self.reconciler.apply(generation, event) {
                        self.publish();
                    }
                }
            }
        }

        tracing::debug!("chat store shutting down");
        self.stop_stream();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Send { outbound, reply } => {
                let result = self.send(outbound);
                let _ = reply.send(result);
            }
            Command::Retry { index, reply } => {
                let result = self.retry(index);
                let _ = reply.send(result);
            }
            Command::Cancel { reply } => {
                self.stop_stream();
                let canceled = self.reconciler.cancel_active();
                self.publish();
                let _ = reply.send(Ok(canceled));
            }
            Command::LoadHistory { turns, reply } => {
                self.reconciler.load_history(turns);
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::Reset { reply } => {
                self.stop_stream();
                self.reconciler.reset();
                self.publish();
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn send(&mut self, outbound: OutboundMessage) -> Result<(), ChatError> {
        let (user_id, slug) = self.identifiers()?;
        let pending = self.reconciler.begin_send(outbound)?;
        self.stop_stream();
        self.launch(pending, user_id, slug);
        Ok(())
    }

    fn retry(&mut self, index: Option<usize>) -> Result<(), ChatError> {
        let index = index
            .or_else(|| self.reconciler.last_retryable())
            .ok_or(ChatError::NothingToRetry)?;
        let (user_id, slug) = self.identifiers()?;
        let pending = self.reconciler.retry(index)?;
        self.stop_stream();
        self.launch(pending, user_id, slug);
        Ok(())
    }

    /// User id and slug, provided a session is open
    fn identifiers(&self) -> Result<(String, String), ChatError> {
        let context = self.context.read();
        if context.session_id().is_none() {
            tracing::warn!("no session id; open a session before chatting");
            return Err(ChatError::MissingSession);
        }
        Ok((context.user_id.clone(), context.slug.clone()))
    }

    /// Cancel the stream task and drop everything it queued
    fn stop_stream(&mut self) {
        if let Some(active) = self.stream.take() {
            active.cancel.cancel();
            active.task.abort();
        }
        self.throttler.clear();
    }

    fn launch(&mut self, pending: PendingSend, user_id: String, slug: String) {
        let PendingSend {
            generation,
            correlation_id,
            outbound,
        } = pending;

        let request = StreamRequest {
            message: outbound.text,
            message_type: outbound.message_type,
            scope: outbound.scope,
            user_id,
            run_id: correlation_id,
            slug,
        };

        let cancel = CancellationToken::new();
        let frames = self.source.open(request, cancel.clone());
        let task = tokio::spawn(pump_frames(
            frames,
            generation,
            cancel.clone(),
            Arc::clone(&self.throttler),
        ));

        self.stream = Some(ActiveTask { cancel, task });
        self.publish();
    }

    fn publish(&self) {
        let snapshot = ChatSnapshot {
            turns: self.reconciler.turns().to_vec(),
            is_streaming: self.reconciler.is_streaming(),
        };
        self.snapshots.send_replace(snapshot);
    }
}

/// Decode frames of one reply and queue them for paced delivery
async fn pump_frames(
    mut frames: futures::stream::BoxStream<'static, RawFrame>,
    generation: u64,
    cancel: CancellationToken,
    throttler: Arc<Throttler<Paced>>,
) {
    let mut decoder = ChunkDecoder::new();

    while let Some(frame) = frames.next().await {
        match frame {
            RawFrame::Text(text) => {
                for event in decoder.decode(&text) {
                    let terminal = event.is_terminal();
                    throttler.enqueue((generation, event));
                    if terminal {
                        return;
                    }
                }
            }
            RawFrame::Error(err) => {
                throttler.enqueue((generation, StreamEvent::Error(err)));
                return;
            }
        }
    }

    if cancel.is_cancelled() {
        return;
    }

    if let Some(event) = decoder.finish() {
        let terminal = event.is_terminal();
        throttler.enqueue((generation, event));
        if terminal {
            return;
        }
    }

    tracing::warn!(generation, "reply stream ended without [DONE]");
    throttler.enqueue((generation, StreamEvent::Error(TurnError::Interrupted)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatContext;
    use crate::chat::LifecycleState;
    use futures::stream::{self, BoxStream};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Replays canned frames and records what was requested
    #[derive(Default)]
    struct ScriptedSource {
        scripts: Mutex<Vec<(Vec<RawFrame>, bool)>>,
        requests: Mutex<Vec<StreamRequest>>,
    }

    impl ScriptedSource {
        fn push(&self, frames: Vec<RawFrame>) {
            self.scripts.lock().push((frames, false));
        }

        /// Frames followed by a stream that never ends
        fn push_hanging(&self, frames: Vec<RawFrame>) {
            self.scripts.lock().push((frames, true));
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&self, request: StreamRequest, _cancel: CancellationToken) -> BoxStream<'static, RawFrame> {
            self.requests.lock().push(request);
            let mut scripts = self.scripts.lock();
            let (frames, hang) = if scripts.is_empty() {
                (Vec::new(), false)
            } else {
                scripts.remove(0)
            };
            if hang {
                stream::iter(frames).chain(stream::pending()).boxed()
            } else {
                stream::iter(frames).boxed()
            }
        }
    }

    fn text(s: &str) -> RawFrame {
        RawFrame::Text(s.to_string())
    }

    fn store(source: Arc<ScriptedSource>, context: SharedContext) -> ChatStore {
        let mut n = 0;
        let reconciler = TurnReconciler::with_id_generator(Box::new(move || {
            n += 1;
            format!("r{n}")
        }));
        ChatStore::spawn_with(reconciler, source, context, &ThrottleConfig::default())
    }

    fn open_session() -> SharedContext {
        ChatContext::new("u1", "sam").with_session("log-1").shared()
    }

    #[tokio::test]
    async fn streamed_reply_lands_in_one_turn() {
        let source = Arc::new(ScriptedSource::default());
        source.push(vec![
            text("data: [START]\ndata: {\"id\":\"r1\",\"runId\":\"r1\",\"chunkType\":\"text-delta\",\"textDelta\":\"Hi\"}\n"),
            text("data: {\"id\":\"server-42\",\"runId\":\"r1\",\"chunkType\":\"text-del"),
            text("ta\",\"textDelta\":\" there\"}\ndata: [DONE]\n"),
        ]);
        let store = store(Arc::clone(&source), open_session());

        store.send_message("Hello").await.unwrap();
        let snapshot = store.wait_until_idle().await.unwrap();

        assert_eq!(snapshot.turns.len(), 1);
        let turn = &snapshot.turns[0];
        assert_eq!(turn.id, "server-42");
        assert_eq!(turn.assistant_message.as_deref(), Some("Hi there"));
        assert_eq!(turn.lifecycle, LifecycleState::Complete);

        let requests = source.requests.lock();
        assert_eq!(requests[0].message, "Hello");
        assert_eq!(requests[0].run_id, "r1");
        assert_eq!(requests[0].user_id, "u1");
        assert_eq!(requests[0].slug, "sam");
    }

    #[tokio::test]
    async fn frames_without_chunk_type_are_streamed_as_text() {
        let source = Arc::new(ScriptedSource::default());
        source.push(vec![
            text("data: [START]\ndata: {\"runId\":\"r1\",\"id\":\"r1\",\"textDelta\":\"Hi\"}\n"),
            text("data: {\"runId\":\"r1\",\"id\":\"server-42\",\"textDelta\":\" there\"}\n"),
            text("data: [DONE]\n"),
        ]);
        let store = store(source, open_session());

        store.send_message("Hello").await.unwrap();
        let snapshot = store.wait_until_idle().await.unwrap();

        let turn = &snapshot.turns[0];
        assert_eq!(turn.id, "server-42");
        assert_eq!(turn.assistant_message.as_deref(), Some("Hi there"));
        assert_eq!(turn.lifecycle, LifecycleState::Complete);
    }

    #[tokio::test]
    async fn stream_without_done_is_interrupted() {
        let source = Arc::new(ScriptedSource::default());
        source.push(vec![text("data: [START]\n")]);
        let store = store(source, open_session());

        store.send_message("Hello").await.unwrap();
        let snapshot = store.wait_until_idle().await.unwrap();

        assert_eq!(
            snapshot.turns[0].lifecycle,
            LifecycleState::Error(TurnError::Interrupted)
        );
        assert_eq!(snapshot.last_retryable(), Some(0));
    }

    #[tokio::test]
    async fn transport_error_then_retry() {
        let source = Arc::new(ScriptedSource::default());
        source.push(vec![
            text("data: [START]\n"),
            RawFrame::Error(TurnError::Transport("reset".into())),
        ]);
        source.push(vec![text("data: [START]\ndata: {\"id\":\"s-2\",\"chunkType\":\"text-delta\",\"textDelta\":\"ok\"}\ndata: [DONE]\n")]);
        let store = store(Arc::clone(&source), open_session());

        store.send_message("Hello").await.unwrap();
        let failed = store.wait_until_idle().await.unwrap();
        assert!(failed.turns[0].lifecycle.is_error());
        assert_eq!(failed.turns[0].assistant_message, None);

        store.retry_last().await.unwrap();
        let snapshot = store.wait_until_idle().await.unwrap();
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.turns[0].assistant_message.as_deref(), Some("ok"));

        let requests = source.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].message, "Hello");
        assert_eq!(requests[1].message_type, requests[0].message_type);
        assert_eq!(requests[1].scope, requests[0].scope);
    }

    #[tokio::test]
    async fn cancel_marks_turn_and_stops_streaming() {
        let source = Arc::new(ScriptedSource::default());
        source.push_hanging(vec![text("data: [START]\n")]);
        let store = store(source, open_session());

        store.send_message("Hello").await.unwrap();
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.turns.first().is_some_and(|t| t.lifecycle == LifecycleState::Streaming))
            .await
            .unwrap();

        assert!(store.cancel_stream().await.unwrap());
        let snapshot = store.snapshot();
        assert!(!snapshot.is_streaming);
        assert_eq!(
            snapshot.turns[0].lifecycle,
            LifecycleState::Error(TurnError::Canceled)
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.snapshot(), snapshot);
        assert!(!store.cancel_stream().await.unwrap());
    }

    #[tokio::test]
    async fn sending_without_session_is_rejected_locally() {
        let source = Arc::new(ScriptedSource::default());
        let context = ChatContext::new("u1", "sam").with_session("none").shared();
        let store = store(Arc::clone(&source), context);

        let err = store.send_message("Hello").await.unwrap_err();
        assert!(matches!(err, ChatError::MissingSession));
        assert!(source.requests.lock().is_empty());
        assert!(store.snapshot().turns.is_empty());
    }

    #[tokio::test]
    async fn empty_message_never_reaches_the_network() {
        let source = Arc::new(ScriptedSource::default());
        let store = store(Arc::clone(&source), open_session());

        let err = store.send_message("  ").await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(source.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn retry_with_nothing_failed() {
        let store = store(Arc::new(ScriptedSource::default()), open_session());
        assert!(matches!(
            store.retry_last().await,
            Err(ChatError::NothingToRetry)
        ));
    }
}
