//! Turn controller.
//!
//! Orchestrates one request/response cycle: append the user turn, call the
//! analyst API with the full history and the selected semantic model, then
//! append the analyst turn. A failed call becomes a synthesized error turn
//! plus the one-shot notification flag; nothing propagates past this
//! boundary, so the conversation stays usable after any single-turn failure.

use crate::analyst::AnalystApi;
use crate::models::{ContentBlock, Turn};
use crate::session::Session;

/// Seed prompt sent through the normal protocol when a session starts with
/// an empty conversation.
pub const BOOTSTRAP_PROMPT: &str = "What question would you like to ask?";

pub struct TurnController {
    analyst: Box<dyn AnalystApi>,
}

impl TurnController {
    pub fn new(analyst: Box<dyn AnalystApi>) -> Self {
        Self { analyst }
    }

    /// Seed an empty conversation with the bootstrap prompt. No-op once the
    /// session has any turns.
    pub async fn bootstrap(&self, session: &mut Session) {
        if session.is_empty() {
            self.process_input(session, BOOTSTRAP_PROMPT).await;
        }
    }

    /// Run one full cycle for raw user input.
    ///
    /// Appends exactly one user turn and exactly one analyst turn, in that
    /// order. On an API failure the analyst turn is a single text block
    /// embedding the status code, request id, error code, and message, and
    /// the session's API-error flag is set for the next render.
    pub async fn process_input(&self, session: &mut Session, input: &str) {
        session.append(Turn::user(input));

        let model_ref = session.selected_model().to_string();
        let outcome = self.analyst.send(session.messages(), &model_ref).await;
        match outcome {
            Ok(reply) => {
                session.append(Turn::analyst(
                    reply.message.content,
                    Some(reply.request_id),
                ));
            }
            Err(err) => {
                tracing::warn!(error = %err, "analyst turn failed");
                let request_id = err.request_id();
                session.append(Turn::analyst(
                    vec![ContentBlock::text(err.user_message())],
                    request_id,
                ));
                session.flag_api_error();
            }
        }
    }

    /// Drain the suggestion mailbox: if a suggestion was clicked since the
    /// last cycle, process it as user input. Returns true if a cycle ran.
    pub async fn process_pending(&self, session: &mut Session) -> bool {
        match session.take_suggestion() {
            Some(suggestion) => {
                self.process_input(session, &suggestion).await;
                true
            }
            None => false,
        }
    }
}
