//! Agent message stream events
//!
//! Mirrors the stream-json event kinds emitted by the agent CLI: a system
//! init event, assistant turns, user turns carrying tool results, and one
//! terminal `result` event.

use serde::Deserialize;
use serde_json::Value;

use crate::error::AgentError;

/// One event from the agent's message stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    System {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Assistant {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        message: MessageBody,
    },
    User {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        message: MessageBody,
    },
    Result(ResultMessage),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// How the agent run ended, as reported in the `result` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubtype {
    Success,
    ErrorMaxTurns,
    ErrorDuringExecution,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultMessage {
    pub subtype: ResultSubtype,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

/// Terminal outcome of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Success { result_text: String },
    MaxTurnsExceeded { num_turns: Option<u32> },
    ExecutionError { message: Option<String> },
    UnexpectedTermination,
}

impl TerminalOutcome {
    /// Success yields the result text; every other outcome becomes the
    /// matching protocol error tagged with `session_id`.
    pub fn into_result(self, session_id: Option<String>) -> Result<String, AgentError> {
        match self {
            TerminalOutcome::Success { result_text } => Ok(result_text),
            TerminalOutcome::MaxTurnsExceeded { num_turns } => Err(AgentError::MaxTurnsExceeded {
                session_id,
                num_turns,
            }),
            TerminalOutcome::ExecutionError { message } => {
                Err(AgentError::ExecutionError { session_id, message })
            }
            TerminalOutcome::UnexpectedTermination => {
                Err(AgentError::UnexpectedTermination { session_id })
            }
        }
    }
}

impl AgentMessage {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            AgentMessage::System { session_id, .. }
            | AgentMessage::Assistant { session_id, .. }
            | AgentMessage::User { session_id, .. } => session_id.as_deref(),
            AgentMessage::Result(result) => result.session_id.as_deref(),
            AgentMessage::Other => None,
        }
    }

    /// `Some` only for the terminal `result` event.
    pub fn terminal_outcome(&self) -> Option<TerminalOutcome> {
        let AgentMessage::Result(result) = self else {
            return None;
        };
        let outcome = match result.subtype {
            ResultSubtype::Success if !result.is_error => TerminalOutcome::Success {
                result_text: result.result.clone().unwrap_or_default(),
            },
            ResultSubtype::ErrorMaxTurns => TerminalOutcome::MaxTurnsExceeded {
                num_turns: result.num_turns,
            },
            ResultSubtype::Success
            | ResultSubtype::ErrorDuringExecution
            | ResultSubtype::Unknown => TerminalOutcome::ExecutionError {
                message: result.result.clone(),
            },
        };
        Some(outcome)
    }

    /// One-line description for logs
    pub fn describe(&self) -> String {
        match self {
            AgentMessage::System { subtype, model, .. } => match model {
                Some(model) => format!("system:{} ({})", subtype, model),
                None => format!("system:{}", subtype),
            },
            AgentMessage::Assistant { message, .. } => {
                let parts: Vec<String> = message
                    .content
                    .iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => truncate(text, 200),
                        ContentBlock::ToolUse { name, .. } => format!("> {}", name),
                        ContentBlock::ToolResult { .. } => "tool result".to_string(),
                        ContentBlock::Other => "…".to_string(),
                    })
                    .collect();
                format!("assistant: {}", parts.join(" | "))
            }
            AgentMessage::User { message, .. } => {
                let errors = message
                    .content
                    .iter()
                    .filter(|b| matches!(b, ContentBlock::ToolResult { is_error: true, .. }))
                    .count();
                format!("user: {} block(s), {} tool error(s)", message.content.len(), errors)
            }
            AgentMessage::Result(result) => format!(
                "result:{:?} turns={} cost=${:.4}",
                result.subtype,
                result.num_turns.unwrap_or(0),
                result.total_cost_usd.unwrap_or(0.0)
            ),
            AgentMessage::Other => "other event".to_string(),
        }
    }

    pub fn system_init(session_id: &str) -> Self {
        AgentMessage::System {
            subtype: "init".to_string(),
            session_id: Some(session_id.to_string()),
            model: None,
        }
    }

    pub fn assistant_text(session_id: &str, text: &str) -> Self {
        AgentMessage::Assistant {
            session_id: Some(session_id.to_string()),
            message: MessageBody {
                content: vec![ContentBlock::Text {
                    text: text.to_string(),
                }],
            },
        }
    }

    pub fn success(session_id: &str, result: &str) -> Self {
        AgentMessage::Result(ResultMessage {
            subtype: ResultSubtype::Success,
            is_error: false,
            result: Some(result.to_string()),
            session_id: Some(session_id.to_string()),
            num_turns: Some(1),
            duration_ms: None,
            total_cost_usd: None,
        })
    }

    pub fn failure(session_id: &str, subtype: ResultSubtype) -> Self {
        AgentMessage::Result(ResultMessage {
            subtype,
            is_error: true,
            result: None,
            session_id: Some(session_id.to_string()),
            num_turns: None,
            duration_ms: None,
            total_cost_usd: None,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_system_init() {
        let line = r#"{"type":"system","subtype":"init","model":"claude-sonnet-4","session_id":"sess-123","tools":["Read"]}"#;
        let msg: AgentMessage = serde_json::from_str(line).unwrap();
        assert_eq!(msg.session_id(), Some("sess-123"));
        assert!(msg.terminal_outcome().is_none());
    }

    #[test]
    fn test_parse_assistant_tool_use() {
        let line = r#"{"type":"assistant","session_id":"s","message":{"content":[{"type":"text","text":"Looking"},{"type":"tool_use","id":"t1","name":"mcp__playwright__browser_click","input":{"ref":"e3"}},{"type":"thinking","thinking":"hm"}]}}"#;
        let msg: AgentMessage = serde_json::from_str(line).unwrap();
        let AgentMessage::Assistant { message, .. } = &msg else {
            panic!("expected assistant, got {:?}", msg);
        };
        assert_eq!(message.content.len(), 3);
        assert_eq!(message.content[2], ContentBlock::Other);
        assert!(msg.describe().contains("browser_click"));
    }

    #[test]
    fn test_parse_success_result() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","session_id":"s","num_turns":3,"duration_ms":5200,"total_cost_usd":0.0123}"#;
        let msg: AgentMessage = serde_json::from_str(line).unwrap();
        assert_eq!(
            msg.terminal_outcome(),
            Some(TerminalOutcome::Success {
                result_text: "done".into()
            })
        );
    }

    #[test]
    fn test_error_results_classified() {
        let max: AgentMessage =
            serde_json::from_str(r#"{"type":"result","subtype":"error_max_turns","num_turns":50}"#).unwrap();
        assert_eq!(
            max.terminal_outcome(),
            Some(TerminalOutcome::MaxTurnsExceeded { num_turns: Some(50) })
        );

        let exec: AgentMessage =
            serde_json::from_str(r#"{"type":"result","subtype":"error_during_execution"}"#).unwrap();
        assert!(matches!(
            exec.terminal_outcome(),
            Some(TerminalOutcome::ExecutionError { .. })
        ));

        let flagged: AgentMessage = serde_json::from_str(
            r#"{"type":"result","subtype":"success","is_error":true,"result":"API Error: overloaded"}"#,
        )
        .unwrap();
        assert_eq!(
            flagged.terminal_outcome(),
            Some(TerminalOutcome::ExecutionError {
                message: Some("API Error: overloaded".into())
            })
        );
    }

    #[test]
    fn test_unknown_event_kind_tolerated() {
        let msg: AgentMessage =
            serde_json::from_str(r#"{"type":"stream_event","event":{}}"#).unwrap();
        assert_eq!(msg, AgentMessage::Other);
        assert_eq!(msg.session_id(), None);
    }

    #[test]
    fn test_into_result_carries_session() {
        let err = TerminalOutcome::MaxTurnsExceeded { num_turns: None }
            .into_result(Some("sess".into()))
            .unwrap_err();
        assert_eq!(err.session_id(), Some("sess"));
    }
}
