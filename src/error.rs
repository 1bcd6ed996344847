//! Error types for the chat pipeline.
//!
//! All of these are recoverable at the turn/render boundary: the controller
//! converts them into user-visible content instead of aborting the session.

/// Errors surfaced by the analyst client and query executor.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The analyst API answered with an HTTP status >= 400.
    #[error("analyst API error {status} (request-id: {request_id}, error code: {error_code}): {message}")]
    AnalystApi {
        status: u16,
        request_id: String,
        error_code: String,
        message: String,
    },
    /// The analyst API could not be reached or the request timed out.
    #[error("analyst API unreachable: {0}")]
    Transport(String),
    /// The analyst API returned a body that is not valid JSON, or JSON that
    /// does not match the documented reply shape.
    #[error("malformed analyst response: {0}")]
    MalformedResponse(String),
    /// The warehouse engine rejected a statement.
    #[error("SQL execution failed: {0}")]
    SqlExecution(String),
}

impl ChatError {
    /// Request id carried by the failure, if the API reported one.
    pub fn request_id(&self) -> Option<String> {
        match self {
            ChatError::AnalystApi { request_id, .. } => Some(request_id.clone()),
            _ => None,
        }
    }

    /// Multi-line message rendered into the conversation when a turn fails.
    ///
    /// For API errors this embeds the status code, request id, error code,
    /// and message body so the failing request can be chased down later.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::AnalystApi {
                status,
                request_id,
                error_code,
                message,
            } => format!(
                "An analyst API error has occurred.\n\n\
                 * response code: `{status}`\n\
                 * request-id: `{request_id}`\n\
                 * error code: `{error_code}`\n\n\
                 Message:\n```\n{message}\n```"
            ),
            ChatError::Transport(detail) => {
                format!("The analyst API could not be reached.\n\n```\n{detail}\n```")
            }
            ChatError::MalformedResponse(detail) => {
                format!("The analyst API returned an unreadable response.\n\n```\n{detail}\n```")
            }
            ChatError::SqlExecution(detail) => detail.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_user_message_embeds_all_fields() {
        let err = ChatError::AnalystApi {
            status: 400,
            request_id: "req-42".to_string(),
            error_code: "invalid_semantic_model".to_string(),
            message: "unknown stage".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.contains("400"));
        assert!(msg.contains("req-42"));
        assert!(msg.contains("invalid_semantic_model"));
        assert!(msg.contains("unknown stage"));
    }

    #[test]
    fn test_request_id_only_on_api_errors() {
        let err = ChatError::AnalystApi {
            status: 429,
            request_id: "req-7".to_string(),
            error_code: "throttled".to_string(),
            message: "slow down".to_string(),
        };
        assert_eq!(err.request_id().as_deref(), Some("req-7"));
        assert!(ChatError::Transport("timed out".to_string())
            .request_id()
            .is_none());
        assert!(ChatError::SqlExecution("syntax error".to_string())
            .request_id()
            .is_none());
    }

    #[test]
    fn test_display_shapes() {
        let err = ChatError::MalformedResponse("expected object".to_string());
        assert_eq!(
            err.to_string(),
            "malformed analyst response: expected object"
        );
        let err = ChatError::SqlExecution("no such table: revenue".to_string());
        assert_eq!(err.to_string(), "SQL execution failed: no such table: revenue");
    }
}
