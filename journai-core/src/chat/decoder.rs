//! Line decoder for the `data: ...` framed reply body.
//!
//! Network buffers do not respect frame boundaries, so the decoder keeps the
//! trailing fragment of each buffer and only decodes newline-terminated
//! lines. Call [`ChunkDecoder::finish`] once the body ends to flush the last
//! unterminated line.

use super::chunk::{Chunk, StreamEvent};
use crate::config::constants::frames::{
    COMMENT_PREFIX, DATA_PREFIX, DONE_SENTINEL, START_SENTINEL,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame does not start with `{DATA_PREFIX}`")]
    MissingPrefix,
    #[error("frame payload is not a chunk: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: String,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network buffer, yielding the events of every line it completes
    pub fn decode(&mut self, text: &str) -> impl Iterator<Item = StreamEvent> + use<> {
        self.pending.push_str(text);

        let lines = match self.pending.rfind('\n') {
            Some(end) => {
                let rest = self.pending.split_off(end + 1);
                std::mem::replace(&mut self.pending, rest)
            }
            None => String::new(),
        };

        lines
            .lines()
            .map(str::to_owned)
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|line| decode_line(&line))
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }

    /// Bytes held back waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Decode a single frame line
pub fn decode_frame(line: &str) -> Result<StreamEvent, FrameError> {
    let payload = line
        .trim_end_matches('\r')
        .strip_prefix(DATA_PREFIX)
        .ok_or(FrameError::MissingPrefix)?
        .trim();

    match payload {
        START_SENTINEL => Ok(StreamEvent::Start),
        DONE_SENTINEL => Ok(StreamEvent::Done),
        json => serde_json::from_str::<Chunk>(json)
            .map(StreamEvent::Chunk)
            .map_err(|e| FrameError::InvalidJson(e.to_string())),
    }
}

fn decode_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() || line.starts_with(COMMENT_PREFIX) {
        return None;
    }

    match decode_frame(line) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!(error = %err, frame = %truncate(line, 120), "dropping malformed frame");
            None
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    match line.char_indices().nth(max) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk(c) => Some(c.text_delta()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn decodes_control_and_chunk_frames() {
        let mut decoder = ChunkDecoder::new();
        let events: Vec<_> = decoder
            .decode(
                "data: [START]\n\
                 data: {\"id\":\"r1\",\"runId\":\"r1\",\"chunkType\":\"text-delta\",\"textDelta\":\"Hi\"}\n\
                 data: [DONE]\n",
            )
            .collect();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::Start);
        assert_eq!(texts(&events), "Hi");
        assert_eq!(events[2], StreamEvent::Done);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let mut decoder = ChunkDecoder::new();
        let events: Vec<_> = decoder
            .decode(
                "data: [START]\n\
                 garbage without prefix\n\
                 data: {not json}\n\
                 data: {\"id\":\"a\",\"chunkType\":\"text-delta\",\"textDelta\":\"ok\"}\n\
                 data: 42\n\
                 data: \"just a string\"\n",
            )
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(texts(&events), "ok");
    }

    #[test]
    fn untagged_text_frames_are_decoded() {
        let mut decoder = ChunkDecoder::new();
        let events: Vec<_> = decoder
            .decode(
                "data: [START]\n\
                 data: {\"runId\":\"r1\",\"id\":\"r1\",\"textDelta\":\"Hi\"}\n\
                 data: {\"runId\":\"r1\",\"id\":\"server-42\",\"textDelta\":\" there\"}\n\
                 data: [DONE]\n",
            )
            .collect();

        assert_eq!(events.len(), 4);
        assert_eq!(texts(&events), "Hi there");
        assert!(matches!(&events[2], StreamEvent::Chunk(chunk) if chunk.id == "server-42"));
    }

    #[test]
    fn null_id_frame_keeps_its_text() {
        let event =
            decode_frame("data: {\"id\":null,\"runId\":\"r1\",\"chunkType\":\"text-delta\",\"textDelta\":\"Hi\"}")
                .unwrap();
        let StreamEvent::Chunk(chunk) = event else {
            panic!("expected a chunk, got {event:?}");
        };
        assert!(chunk.id.is_empty());
        assert_eq!(chunk.text_delta(), "Hi");
    }

    #[test]
    fn frames_split_across_buffers_are_reassembled() {
        let body = "data: [START]\n\
                    data: {\"id\":\"r1\",\"chunkType\":\"text-delta\",\"textDelta\":\"Hel\"}\n\
                    data: {\"id\":\"r1\",\"chunkType\":\"text-delta\",\"textDelta\":\"lo\"}\n\
                    data: [DONE]\n";

        let whole: Vec<_> = ChunkDecoder::new().decode(body).collect();

        for split in [1, 7, 20, 45, body.len() - 1] {
            let mut decoder = ChunkDecoder::new();
            let mut events: Vec<_> = decoder.decode(&body[..split]).collect();
            events.extend(decoder.decode(&body[split..]));
            events.extend(decoder.finish());
            assert_eq!(events, whole, "split at {split}");
        }
        assert_eq!(texts(&whole), "Hello");
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.decode("data: [DONE]").count(), 0);
        assert!(decoder.pending_len() > 0);
        assert_eq!(decoder.finish(), Some(StreamEvent::Done));
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn crlf_blank_and_comment_lines_are_separators() {
        let mut decoder = ChunkDecoder::new();
        let events: Vec<_> = decoder
            .decode("data: [START]\r\n\r\n: keep-alive\r\ndata: [DONE]\r\n")
            .collect();
        assert_eq!(events, vec![StreamEvent::Start, StreamEvent::Done]);
    }

    #[test]
    fn decode_frame_reports_reason() {
        assert_eq!(decode_frame("[DONE]"), Err(FrameError::MissingPrefix));
        assert!(matches!(
            decode_frame("data: {"),
            Err(FrameError::InvalidJson(_))
        ));
        assert_eq!(decode_frame("data:[START]"), Ok(StreamEvent::Start));
    }
}
