//! Wire records of the streaming reply.

use super::turn::TurnError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One decoded network event of an assistant reply
///
/// Common correlation fields live on the struct; everything specific to a
/// `chunkType` lives on [`ChunkKind`]. Decoding goes through [`WireChunk`]
/// so that a frame without a `chunkType` still reads as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireChunk")]
pub struct Chunk {
    /// Server-assigned id; only stable from the first chunk of a turn onwards.
    /// Empty when the server has not assigned one yet.
    pub id: String,

    /// Correlation id chosen by the client (or echoed by the server)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_repetitions: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub kind: ChunkKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "chunkType",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ChunkKind {
    TextDelta {
        text_delta: Option<String>,
    },
    ToolCall {
        tool_name: Option<String>,
        args: Option<Value>,
    },
    ToolResult {
        tool_name: Option<String>,
        result: Option<Value>,
    },
    Start,
    Finish {
        finish_reason: Option<String>,
    },
    Error {
        error: Option<String>,
    },
    Unknown,
}

/// Flat view of a chunk as the server sends it: every field optional,
/// the discriminator included.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChunk {
    #[serde(default, deserialize_with = "lenient_id")]
    id: String,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    current_step: Option<u32>,
    #[serde(default)]
    step_repetitions: Option<u32>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    chunk_type: Option<String>,
    #[serde(default)]
    text_delta: Option<String>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    args: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl From<WireChunk> for Chunk {
    fn from(wire: WireChunk) -> Self {
        let tag = wire
            .chunk_type
            .as_deref()
            .map(|t| t.trim().to_ascii_lowercase().replace('_', "-"));

        let kind = match tag.as_deref() {
            // Untagged frames are plain text unless they only carry an error.
            None if wire.text_delta.is_none() && wire.error.is_some() => ChunkKind::Error {
                error: wire.error,
            },
            None | Some("text-delta") => ChunkKind::TextDelta {
                text_delta: wire.text_delta,
            },
            Some("tool-call") => ChunkKind::ToolCall {
                tool_name: wire.tool_name,
                args: wire.args,
            },
            Some("tool-result") => ChunkKind::ToolResult {
                tool_name: wire.tool_name,
                result: wire.result,
            },
            Some("start") => ChunkKind::Start,
            Some("finish" | "done") => ChunkKind::Finish {
                finish_reason: wire.finish_reason,
            },
            Some("error") => ChunkKind::Error { error: wire.error },
            Some(other) => {
                tracing::trace!(chunk_type = other, "unrecognised chunk type");
                ChunkKind::Unknown
            }
        };

        Self {
            id: wire.id,
            run_id: wire.run_id,
            current_step: wire.current_step,
            step_repetitions: wire.step_repetitions,
            created_at: wire.created_at,
            kind,
        }
    }
}

impl Chunk {
    /// The text carried by this chunk; empty for non-text chunks
    pub fn text_delta(&self) -> &str {
        match &self.kind {
            ChunkKind::TextDelta { text_delta } => text_delta.as_deref().unwrap_or(""),
            _ => "",
        }
    }

    /// Server-declared failure message, if this is an error chunk
    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            ChunkKind::Error { error } => Some(error.as_deref().unwrap_or("unknown error")),
            _ => None,
        }
    }

    /// Convenience constructor for text chunks
    pub fn text(id: impl Into<String>, run_id: Option<&str>, delta: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            run_id: run_id.map(str::to_string),
            current_step: None,
            step_repetitions: None,
            created_at: None,
            kind: ChunkKind::TextDelta {
                text_delta: Some(delta.into()),
            },
        }
    }
}

/// Null and missing ids both read as "not assigned yet"; numeric ids are
/// kept as their decimal text.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// Accepts RFC 3339 strings and silently drops anything else, so an odd
/// timestamp format never costs us the whole frame.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|millis| DateTime::<Utc>::from_timestamp_millis(millis)),
        _ => None,
    })
}

/// What the decoder hands downstream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start,
    Chunk(Chunk),
    Done,
    Error(TurnError),
}

impl StreamEvent {
    /// `Done` and `Error` end a reply; nothing after them is applied
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}
