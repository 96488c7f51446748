//! The long-lived HTTP request behind one assistant reply.

use super::turn::{MessageScope, MessageType, TurnError};
use crate::api::ApiClient;
use crate::config::constants::api::stream_path;
use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Method;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Body of the streaming request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub message: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub scope: MessageScope,
    pub user_id: String,
    pub run_id: String,
    #[serde(skip)]
    pub slug: String,
}

/// One element of the raw frame stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// A network buffer decoded to text; may hold several frames or a fragment
    Text(String),
    /// The stream failed; always the last element
    Error(TurnError),
}

/// Something that can turn a request into raw frames
///
/// The stream ends on its own when the body ends or `cancel` fires.
pub trait FrameSource: Send + Sync {
    fn open(&self, request: StreamRequest, cancel: CancellationToken) -> BoxStream<'static, RawFrame>;
}

/// [`FrameSource`] backed by the journai HTTP API
#[derive(Debug, Clone)]
pub struct EventStreamSource {
    api: ApiClient,
    idle_timeout: Option<Duration>,
}

impl EventStreamSource {
    pub fn new(api: ApiClient, idle_timeout: Option<Duration>) -> Self {
        Self { api, idle_timeout }
    }
}

impl FrameSource for EventStreamSource {
    fn open(&self, request: StreamRequest, cancel: CancellationToken) -> BoxStream<'static, RawFrame> {
        let api = self.api.clone();
        let idle = self.idle_timeout;

        stream! {
            let path = stream_path(&request.slug);
            tracing::debug!(path = %path, run_id = %request.run_id, "opening reply stream");
            let send = api.request(Method::POST, &path).json(&request).send();

            let response = match wait(send, idle, &cancel).await {
                Wait::Canceled => return,
                Wait::TimedOut(limit) => {
                    yield RawFrame::Error(TurnError::TimedOut(limit));
                    return;
                }
                Wait::Ready(Err(err)) => {
                    tracing::error!(error = %err, "reply stream failed to connect");
                    yield RawFrame::Error(TurnError::Transport(err.to_string()));
                    return;
                }
                Wait::Ready(Ok(response)) => response,
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = status.as_u16(), "reply stream rejected");
                yield RawFrame::Error(TurnError::Http { status: status.as_u16(), body });
                return;
            }

            let mut body = response.bytes_stream();
            let mut carry = Utf8Carry::default();
            loop {
                match wait(body.next(), idle, &cancel).await {
                    Wait::Canceled => {
                        tracing::debug!("reply stream canceled");
                        return;
                    }
                    Wait::TimedOut(limit) => {
                        tracing::warn!(?limit, "reply stream went quiet");
                        yield RawFrame::Error(TurnError::TimedOut(limit));
                        return;
                    }
                    Wait::Ready(None) => break,
                    Wait::Ready(Some(Err(err))) => {
                        tracing::error!(error = %err, "reply stream broke");
                        yield RawFrame::Error(TurnError::Transport(err.to_string()));
                        return;
                    }
                    Wait::Ready(Some(Ok(bytes))) => {
                        let text = carry.push(&bytes);
                        if !text.is_empty() {
                            yield RawFrame::Text(text);
                        }
                    }
                }
            }

            let rest = carry.finish();
            if !rest.is_empty() {
                yield RawFrame::Text(rest);
            }
        }
        .boxed()
    }
}

enum Wait<T> {
    Ready(T),
    TimedOut(Duration),
    Canceled,
}

async fn wait<F>(fut: F, idle: Option<Duration>, cancel: &CancellationToken) -> Wait<F::Output>
where
    F: Future,
{
    let timed = async {
        match idle {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Wait::Canceled,
        result = timed => match result {
            Ok(value) => Wait::Ready(value),
            Err(limit) => Wait::TimedOut(limit),
        },
    }
}

/// Holds back a UTF-8 sequence cut in half by a buffer boundary
#[derive(Debug, Default)]
struct Utf8Carry {
    bytes: Vec<u8>,
}

impl Utf8Carry {
    fn push(&mut self, input: &[u8]) -> String {
        self.bytes.extend_from_slice(input);
        // Skip past invalid bytes so a sequence cut at the very end is still held back
        let mut offset = 0;
        let held_from = loop {
            match std::str::from_utf8(&self.bytes[offset..]) {
                Ok(_) => break self.bytes.len(),
                // `error_len() == None` means the input ended mid-sequence
                Err(err) => match err.error_len() {
                    None => break offset + err.valid_up_to(),
                    Some(invalid) => offset += err.valid_up_to() + invalid,
                },
            }
        };

        let rest = self.bytes.split_off(held_from);
        let ready = std::mem::replace(&mut self.bytes, rest);
        String::from_utf8_lossy(&ready).into_owned()
    }

    fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.bytes);
        String::from_utf8_lossy(&rest).into_owned()
    }
}
