//! Error types for the agent protocol

use thiserror::Error;

/// Why a structured response could not be turned into a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseFormatIssue {
    #[error("no <response>...</response> block in agent output")]
    MissingDelimiters,

    #[error("response block is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response does not match schema: {0}")]
    SchemaMismatch(String),
}

/// Protocol-level failures. Any of these aborts the enclosing suite run.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("agent stream ended without a result (session: {})", .session_id.as_deref().unwrap_or("none"))]
    UnexpectedTermination { session_id: Option<String> },

    #[error("agent exceeded its turn limit (session: {})", .session_id.as_deref().unwrap_or("none"))]
    MaxTurnsExceeded {
        session_id: Option<String>,
        num_turns: Option<u32>,
    },

    #[error("agent execution failed (session: {}): {}", .session_id.as_deref().unwrap_or("none"), .message.as_deref().unwrap_or("no detail"))]
    ExecutionError {
        session_id: Option<String>,
        message: Option<String>,
    },

    #[error("invalid agent response (session: {}): {issue}", .session_id.as_deref().unwrap_or("none"))]
    ResponseFormatInvalid {
        session_id: Option<String>,
        issue: ResponseFormatIssue,
    },

    #[error("agent backend error: {0}")]
    Backend(String),
}

impl AgentError {
    /// Session the failure belongs to, for correlating with agent logs
    pub fn session_id(&self) -> Option<&str> {
        match self {
            AgentError::UnexpectedTermination { session_id }
            | AgentError::MaxTurnsExceeded { session_id, .. }
            | AgentError::ExecutionError { session_id, .. }
            | AgentError::ResponseFormatInvalid { session_id, .. } => session_id.as_deref(),
            AgentError::Backend(_) => None,
        }
    }

    pub fn response_format(session_id: Option<&str>, issue: ResponseFormatIssue) -> Self {
        AgentError::ResponseFormatInvalid {
            session_id: session_id.map(String::from),
            issue,
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::Backend(e.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_session() {
        let err = AgentError::MaxTurnsExceeded {
            session_id: Some("sess-9".into()),
            num_turns: Some(50),
        };
        assert!(err.to_string().contains("sess-9"));
        assert_eq!(err.session_id(), Some("sess-9"));

        let err = AgentError::UnexpectedTermination { session_id: None };
        assert!(err.to_string().contains("session: none"));
    }

    #[test]
    fn test_format_issues_are_distinguishable() {
        let missing = AgentError::response_format(Some("s"), ResponseFormatIssue::MissingDelimiters);
        let schema = AgentError::response_format(
            Some("s"),
            ResponseFormatIssue::SchemaMismatch("\"maybe\" is not one of [\"passed\"]".into()),
        );
        assert!(missing.to_string().contains("no <response>"));
        assert!(schema.to_string().contains("does not match schema"));
    }
}
