//! Core data models for the conversation and query pipeline.
//!
//! These types represent the turns and content blocks that flow between the
//! session log, the analyst API, and the renderer, plus the tabular results
//! coming back from the warehouse.

use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Analyst,
}

/// One renderable unit within a turn.
///
/// The analyst API returns an open-ended set of block types; the three known
/// variants are modeled explicitly and anything else lands in
/// [`ContentBlock::Unrecognized`], which the renderer skips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Suggestions { suggestions: Vec<String> },
    Sql { statement: String },
    #[serde(other)]
    Unrecognized,
}

impl ContentBlock {
    /// Shorthand for a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// One exchange unit in the conversation.
///
/// Immutable once appended to the session log. `request_id` is the opaque
/// correlation id minted by the analyst API and is only present on analyst
/// turns (including synthesized error turns, when the failure body carried
/// one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
}

impl Turn {
    /// A user turn wrapping raw input text in a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
            request_id: None,
        }
    }

    /// An analyst turn carrying the reply's content blocks verbatim.
    pub fn analyst(content: Vec<ContentBlock>, request_id: Option<String>) -> Self {
        Turn {
            role: Role::Analyst,
            content,
            request_id,
        }
    }

    /// The suggestion list carried by this turn, if any.
    pub fn suggestions(&self) -> Option<&[String]> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Suggestions { suggestions } => Some(suggestions.as_slice()),
            _ => None,
        })
    }
}

/// Successful analyst API reply.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalystReply {
    pub message: ReplyMessage,
    pub request_id: String,
}

/// Message envelope inside a successful reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyMessage {
    pub content: Vec<ContentBlock>,
}

/// Tabular result from the warehouse: ordered named columns and rows of
/// loosely typed cells. Ephemeral; results are never stored in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl Table {
    /// An empty result set with no column metadata.
    pub fn empty() -> Self {
        Table {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Render one table cell for display. Strings print bare (no quotes);
/// everything else uses its JSON form.
pub fn format_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_tagged_serialization() {
        let block = ContentBlock::Sql {
            statement: "SELECT 1".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "sql");
        assert_eq!(json["statement"], "SELECT 1");
    }

    #[test]
    fn test_content_block_unknown_type_is_unrecognized() {
        let block: ContentBlock = serde_json::from_str(r#"{"type":"chart_hint"}"#).unwrap();
        assert_eq!(block, ContentBlock::Unrecognized);
    }

    #[test]
    fn test_turn_user_shape() {
        let turn = Turn::user("show revenue");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, vec![ContentBlock::text("show revenue")]);
        assert!(turn.request_id.is_none());
    }

    #[test]
    fn test_turn_serializes_without_null_request_id() {
        let json = serde_json::to_string(&Turn::user("q")).unwrap();
        assert!(!json.contains("request_id"));
    }

    #[test]
    fn test_turn_suggestions_lookup() {
        let turn = Turn::analyst(
            vec![
                ContentBlock::text("Try one of these:"),
                ContentBlock::Suggestions {
                    suggestions: vec!["a".to_string(), "b".to_string()],
                },
            ],
            None,
        );
        assert_eq!(turn.suggestions().unwrap().len(), 2);
        assert!(Turn::user("q").suggestions().is_none());
    }

    #[test]
    fn test_reply_deserialization() {
        let reply: AnalystReply = serde_json::from_str(
            r#"{
                "message": {"content": [
                    {"type": "text", "text": "Here is the SQL"},
                    {"type": "sql", "statement": "SELECT * FROM revenue"}
                ]},
                "request_id": "req-123"
            }"#,
        )
        .unwrap();
        assert_eq!(reply.request_id, "req-123");
        assert_eq!(reply.message.content.len(), 2);
    }

    #[test]
    fn test_table_column_index() {
        let table = Table {
            columns: vec!["month".to_string(), "revenue".to_string()],
            rows: vec![],
        };
        assert_eq!(table.column_index("revenue"), Some(1));
        assert_eq!(table.column_index("missing"), None);
        assert!(table.is_empty());
    }
}
