//! Driver agent: one conversational session over an [`AgentBackend`]

use futures::StreamExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{AgentBackend, AgentOverrides, QueryOptions};
use crate::error::AgentError;
use crate::structured::{parse_structured_response, schema_for, structured_prompt};

/// Owns a single agent session.
///
/// The session id is captured from the first event that carries one and
/// never changes afterwards; every later call resumes it.
pub struct DriverAgent {
    label: String,
    backend: Arc<dyn AgentBackend>,
    options: QueryOptions,
    session_id: Option<String>,
    log_events: bool,
}

impl DriverAgent {
    pub fn new(label: impl Into<String>, backend: Arc<dyn AgentBackend>, options: QueryOptions) -> Self {
        let mut options = options;
        options.resume = None;
        Self {
            label: label.into(),
            backend,
            options,
            session_id: None,
            log_events: true,
        }
    }

    /// Toggle per-event debug logging. Session capture and terminal
    /// detection run either way.
    pub fn with_event_logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Base options this agent was built with
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// First write wins. Returns whether the id was stored.
    pub(crate) fn set_session_id(&mut self, session_id: &str) -> bool {
        if self.session_id.is_some() {
            return false;
        }
        info!(agent = %self.label, "Agent session {}", session_id);
        self.session_id = Some(session_id.to_string());
        true
    }

    /// Ask for a free-text answer.
    ///
    /// Consumes the message stream up to the first terminal event and
    /// drops the rest unread.
    pub async fn ask(&mut self, prompt: &str, overrides: &AgentOverrides) -> Result<String, AgentError> {
        let mut options = overrides.apply(&self.options);
        options.resume = self.session_id.clone();

        let mut stream = self.backend.query(prompt, &options).await?;
        while let Some(event) = stream.next().await {
            let message = event?;
            if let Some(id) = message.session_id() {
                self.set_session_id(id);
            }
            if self.log_events {
                debug!(agent = %self.label, "{}", message.describe());
            }
            if let Some(outcome) = message.terminal_outcome() {
                drop(stream);
                return outcome.into_result(self.session_id.clone());
            }
        }

        Err(AgentError::UnexpectedTermination {
            session_id: self.session_id.clone(),
        })
    }

    /// Ask for an answer of type `T`, embedded as `<response>` JSON and
    /// validated against `T`'s JSON Schema.
    pub async fn query<T>(&mut self, prompt: &str, overrides: &AgentOverrides) -> Result<T, AgentError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = schema_for::<T>();
        let text = self.ask(&structured_prompt(prompt, &schema), overrides).await?;
        parse_structured_response(&text, &schema, self.session_id.as_deref())
    }
}

impl std::fmt::Debug for DriverAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverAgent")
            .field("label", &self.label)
            .field("session_id", &self.session_id)
            .field("options", &self.options)
            .finish()
    }
}
