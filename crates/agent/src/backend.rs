//! Agent backend abstraction

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::AgentError;
use crate::message::AgentMessage;

/// Lazy, finite, non-restartable event stream for one query.
/// Dropping it releases the underlying transport.
pub type MessageStream = BoxStream<'static, Result<AgentMessage, AgentError>>;

/// Something that can run one agent query and stream its events
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<MessageStream, AgentError>;
}

/// External tool server made available to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Full option set for one backend call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Working directory bound to the system under test
    pub cwd: PathBuf,
    pub max_turns: Option<u32>,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    pub append_system_prompt: Option<String>,
    /// Session to continue. Managed by `DriverAgent` only.
    pub resume: Option<String>,
}

/// Per-call adjustments merged over an agent's base options.
///
/// Deliberately has no session field: the session belongs to the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOverrides {
    pub max_turns: Option<u32>,
    pub model: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub extra_disallowed_tools: Vec<String>,
    pub append_system_prompt: Option<String>,
}

impl AgentOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.append_system_prompt = Some(text.into());
        self
    }

    /// Merge over `base`. `resume` is copied from `base` untouched.
    pub fn apply(&self, base: &QueryOptions) -> QueryOptions {
        let mut merged = base.clone();
        if let Some(max_turns) = self.max_turns {
            merged.max_turns = Some(max_turns);
        }
        if let Some(model) = &self.model {
            merged.model = Some(model.clone());
        }
        if let Some(tools) = &self.allowed_tools {
            merged.allowed_tools = tools.clone();
        }
        for tool in &self.extra_disallowed_tools {
            if !merged.disallowed_tools.contains(tool) {
                merged.disallowed_tools.push(tool.clone());
            }
        }
        if let Some(text) = &self.append_system_prompt {
            merged.append_system_prompt = Some(match &base.append_system_prompt {
                Some(existing) => format!("{}\n\n{}", existing, text),
                None => text.clone(),
            });
        }
        merged
    }
}
