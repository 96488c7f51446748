//! Incremental rendering of chat snapshots to a terminal

use console::style;
use journai_core::config::constants::copy::{MENTOR_NAME, RETRY_AFFORDANCE};
use journai_core::{ChatSnapshot, LifecycleState, Turn};

/// Remembers how much of the live turn is already on screen
#[derive(Debug, Default)]
pub struct TranscriptView {
    /// Number of live turns seen so far
    live_turns: usize,
    printed: usize,
    finished: bool,
}

impl TranscriptView {
    /// Text to write for the change from the previous snapshot to `snapshot`
    pub fn update(&mut self, snapshot: &ChatSnapshot) -> String {
        let live: Vec<&Turn> = snapshot.turns.iter().filter(|t| !t.is_stored()).collect();
        let Some(turn) = live.last() else {
            return String::new();
        };

        let mut out = String::new();
        let is_new = live.len() != self.live_turns || (self.finished && turn.is_active());
        if is_new {
            self.live_turns = live.len();
            self.printed = 0;
            self.finished = false;
            out.push_str(&format!("{} ", style(format!("{MENTOR_NAME}:")).cyan().bold()));
        }
        if self.finished {
            return out;
        }

        let text = turn.assistant_message.as_deref().unwrap_or("");
        if let Some(delta) = text.get(self.printed..) {
            out.push_str(delta);
            self.printed = text.len();
        }

        match &turn.lifecycle {
            LifecycleState::Complete => {
                out.push('\n');
                self.finished = true;
            }
            LifecycleState::Error(err) => {
                out.push('\n');
                out.push_str(&format!("{} ({err})\n", style(RETRY_AFFORDANCE).red()));
                self.finished = true;
            }
            _ => {}
        }
        out
    }
}

/// Static rendering of a whole turn, used for history
pub fn render_turn(turn: &Turn) -> String {
    let mut out = String::new();
    if let Some(user) = turn.visible_user_message() {
        out.push_str(&format!("{} {user}\n", style("You:").green().bold()));
    }
    if let Some(reply) = turn.assistant_message.as_deref() {
        out.push_str(&format!(
            "{} {reply}\n",
            style(format!("{MENTOR_NAME}:")).cyan().bold()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use journai_core::{Chunk, OutboundMessage, StreamEvent, TurnError, TurnReconciler};

    fn plain(s: String) -> String {
        console::strip_ansi_codes(&s).into_owned()
    }

    fn snapshot(rec: &TurnReconciler) -> ChatSnapshot {
        ChatSnapshot {
            turns: rec.turns().to_vec(),
            is_streaming: rec.is_streaming(),
        }
    }

    #[test]
    fn prints_only_new_text() {
        let mut rec = TurnReconciler::new();
        let g = rec.begin_send(OutboundMessage::user("Hello")).unwrap().generation;
        let mut view = TranscriptView::default();

        assert_eq!(plain(view.update(&snapshot(&rec))), "Sam: ");
        rec.apply(g, StreamEvent::Chunk(Chunk::text("a", None, "Hi")));
        assert_eq!(plain(view.update(&snapshot(&rec))), "Hi");
        rec.apply(g, StreamEvent::Chunk(Chunk::text("a", None, " there")));
        rec.apply(g, StreamEvent::Done);
        assert_eq!(plain(view.update(&snapshot(&rec))), " there\n");
        assert_eq!(view.update(&snapshot(&rec)), "");
    }

    #[test]
    fn errors_show_retry_affordance() {
        let mut rec = TurnReconciler::new();
        let g = rec.begin_send(OutboundMessage::user("Hello")).unwrap().generation;
        let mut view = TranscriptView::default();
        view.update(&snapshot(&rec));

        rec.apply(g, StreamEvent::Error(TurnError::Interrupted));
        let out = plain(view.update(&snapshot(&rec)));
        assert!(out.contains(RETRY_AFFORDANCE));
        assert!(rec.turns()[0].lifecycle.is_error());

        // retry replaces the turn in place
        rec.retry(0).unwrap();
        assert_eq!(plain(view.update(&snapshot(&rec))), "Sam: ");
        assert_eq!(rec.turns()[0].lifecycle, LifecycleState::WaitingForStreamToStart);
    }

    #[test]
    fn internal_user_messages_are_not_rendered() {
        let mut turn = Turn::stored("a", chrono::Utc::now(), Some("[greet]".into()), Some("Hi!".into()));
        turn.is_user_message_internal = true;
        assert_eq!(plain(render_turn(&turn)), "Sam: Hi!\n");
    }
}
