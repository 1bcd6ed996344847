//! Per-session conversation state.
//!
//! A [`Session`] holds the ordered turn log, the pending-suggestion mailbox,
//! the selected semantic model, and the one-shot API-error notification flag.
//! The log is append-only: the only mutation besides appending is a full
//! reset, triggered by the user or by a semantic-model change.

use crate::models::Turn;

/// Conversation state for one user session.
///
/// Created on first interaction and torn down with the process. All
/// mutation goes through the turn controller; renderers only read.
#[derive(Debug)]
pub struct Session {
    messages: Vec<Turn>,
    active_suggestion: Option<String>,
    selected_model: String,
    api_error_pending: bool,
}

impl Session {
    pub fn new(selected_model: impl Into<String>) -> Self {
        Session {
            messages: Vec::new(),
            active_suggestion: None,
            selected_model: selected_model.into(),
            api_error_pending: false,
        }
    }

    /// Clears the turn log, the pending suggestion, and the notification
    /// flag. Idempotent; the selected model is kept.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.active_suggestion = None;
        self.api_error_pending = false;
    }

    /// Appends a turn to the end of the log, preserving order. No
    /// deduplication and no size bound; the log grows for the lifetime of
    /// the session.
    pub fn append(&mut self, turn: Turn) {
        self.messages.push(turn);
    }

    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.messages.last()
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    /// Switches the semantic model. Changing the model invalidates the
    /// conversation, so the session is reset; re-selecting the current
    /// model is a no-op.
    pub fn select_model(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        if reference != self.selected_model {
            self.selected_model = reference;
            self.reset();
        }
    }

    /// Parks a clicked suggestion for the next control cycle (one-slot
    /// mailbox; a later click overwrites an unconsumed one).
    pub fn set_suggestion(&mut self, suggestion: impl Into<String>) {
        self.active_suggestion = Some(suggestion.into());
    }

    /// Takes and clears the pending suggestion.
    pub fn take_suggestion(&mut self) -> Option<String> {
        self.active_suggestion.take()
    }

    /// Marks that an analyst API error should be announced on the next
    /// render.
    pub fn flag_api_error(&mut self) {
        self.api_error_pending = true;
    }

    /// Consumes the notification flag; true at most once per failure.
    pub fn take_api_error_notice(&mut self) -> bool {
        std::mem::take(&mut self.api_error_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentBlock, Role};

    #[test]
    fn test_append_preserves_order() {
        let mut session = Session::new("DB.SCHEMA.STAGE/model.yaml");
        session.append(Turn::user("first"));
        session.append(Turn::analyst(vec![ContentBlock::text("reply")], None));
        session.append(Turn::user("second"));

        let roles: Vec<Role> = session.messages().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Analyst, Role::User]);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = Session::new("DB.SCHEMA.STAGE/model.yaml");
        session.append(Turn::user("hello"));
        session.set_suggestion("follow up");
        session.flag_api_error();

        session.reset();
        assert!(session.is_empty());
        assert!(session.take_suggestion().is_none());
        assert!(!session.take_api_error_notice());

        session.reset();
        assert!(session.is_empty());
    }

    #[test]
    fn test_model_change_resets_session() {
        let mut session = Session::new("DB.SCHEMA.STAGE/a.yaml");
        session.append(Turn::user("hello"));

        session.select_model("DB.SCHEMA.STAGE/b.yaml");
        assert!(session.is_empty());
        assert_eq!(session.selected_model(), "DB.SCHEMA.STAGE/b.yaml");
    }

    #[test]
    fn test_reselecting_same_model_keeps_history() {
        let mut session = Session::new("DB.SCHEMA.STAGE/a.yaml");
        session.append(Turn::user("hello"));

        session.select_model("DB.SCHEMA.STAGE/a.yaml");
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_suggestion_mailbox_is_one_slot() {
        let mut session = Session::new("DB.SCHEMA.STAGE/a.yaml");
        session.set_suggestion("first");
        session.set_suggestion("second");

        assert_eq!(session.take_suggestion().as_deref(), Some("second"));
        assert!(session.take_suggestion().is_none());
    }

    #[test]
    fn test_api_error_notice_fires_once() {
        let mut session = Session::new("DB.SCHEMA.STAGE/a.yaml");
        session.flag_api_error();

        assert!(session.take_api_error_notice());
        assert!(!session.take_api_error_notice());
    }
}
