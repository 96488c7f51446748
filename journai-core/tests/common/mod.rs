//! In-process stand-in for the journai backend.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use journai_core::config::ApiConfig;
use journai_core::{ApiClient, StaticToken};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const TOKEN: &str = "test-token";

/// One piece of a scripted reply body
pub enum Piece {
    Text(&'static str),
    Pause(Duration),
    /// Abort the connection mid-body
    Break,
    /// Keep the connection open without sending anything
    Hang,
}

pub enum Reply {
    Stream(Vec<Piece>),
    Status(u16, &'static str),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct Backend {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    history: Arc<Mutex<Value>>,
}

impl Backend {
    pub fn script(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn set_history(&self, messages: Value) {
        *self.history.lock() = messages;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    fn record(&self, path: String, headers: &HeaderMap, body: Value) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().push(Recorded {
            path,
            authorization,
            body,
        });
    }
}

pub struct MockServer {
    pub backend: Backend,
    pub root_url: String,
    shutdown: CancellationToken,
}

impl MockServer {
    pub async fn start() -> Self {
        let backend = Backend::default();
        let router = Router::new()
            .route("/api/sessions/slug/{slug}", post(stream_reply))
            .route(
                "/api/users/{user_id}/sessions/slug/{slug}/start",
                post(start_session),
            )
            .route("/api/session-logs/{id}/end", post(end_session))
            .route("/api/session-logs/{id}/messages", get(messages))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let shutdown = CancellationToken::new();

        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let _ = axum::serve(listener, router)
                    .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
                    .await;
            }
        });

        Self {
            backend,
            root_url: format!("http://{addr}"),
            shutdown,
        }
    }

    pub fn api(&self) -> ApiClient {
        let config = ApiConfig {
            root_url: self.root_url.clone(),
            request_timeout_secs: 5,
            ..ApiConfig::default()
        };
        ApiClient::new(&config, Arc::new(StaticToken::new(TOKEN))).expect("api client")
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn stream_reply(
    State(backend): State<Backend>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    backend.record(format!("/api/sessions/slug/{slug}"), &headers, body);
    let reply = backend.replies.lock().pop_front();

    match reply {
        None => (StatusCode::NOT_FOUND, "no scripted reply").into_response(),
        Some(Reply::Status(code, text)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, text).into_response()
        }
        Some(Reply::Stream(pieces)) => {
            let body = async_stream::stream! {
                for piece in pieces {
                    match piece {
                        Piece::Text(text) => yield Ok::<_, std::io::Error>(text),
                        Piece::Pause(d) => tokio::time::sleep(d).await,
                        Piece::Break => {
                            yield Err(std::io::Error::other("connection dropped"));
                            return;
                        }
                        Piece::Hang => std::future::pending::<()>().await,
                    }
                }
            };
            Response::builder()
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(body))
                .expect("response")
        }
    }
}

async fn start_session(
    State(backend): State<Backend>,
    Path((user_id, slug)): Path<(String, String)>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    backend.record(
        format!("/api/users/{user_id}/sessions/slug/{slug}/start"),
        &headers,
        body,
    );
    if headers.get(header::AUTHORIZATION).is_none_or(|v| v != TOKEN) {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }
    axum::Json(json!({ "id": "log-1", "status": "IN_PROGRESS", "userId": user_id })).into_response()
}

async fn end_session(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    backend.record(format!("/api/session-logs/{id}/end"), &headers, body);
    axum::Json(json!({ "id": id, "status": "COMPLETED" })).into_response()
}

async fn messages(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.record(format!("/api/session-logs/{id}/messages"), &headers, Value::Null);
    let history = backend.history.lock().clone();
    axum::Json(history).into_response()
}
