//! In-memory backend that replays scripted message streams

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{AgentBackend, MessageStream, QueryOptions};
use crate::error::AgentError;
use crate::message::AgentMessage;

/// One recorded backend call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub options: QueryOptions,
}

/// Replays queued scripts, one per `query` call, in FIFO order.
///
/// With no script queued, `query` fails with a backend error.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Vec<AgentMessage>>>,
    calls: Mutex<Vec<RecordedCall>>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, events: Vec<AgentMessage>) {
        self.scripts.lock().push_back(events);
    }

    /// Queue a well-formed session ending in a successful result
    pub fn push_answer(&self, session_id: &str, result: &str) {
        self.push_script(vec![
            AgentMessage::system_init(session_id),
            AgentMessage::assistant_text(session_id, "working on it"),
            AgentMessage::success(session_id, result),
        ]);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Total events pulled from all streams handed out so far
    pub fn events_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<MessageStream, AgentError> {
        self.calls.lock().push(RecordedCall {
            prompt: prompt.to_string(),
            options: options.clone(),
        });
        let events = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| AgentError::Backend("no scripted response left".to_string()))?;

        let pulled = self.pulled.clone();
        Ok(futures::stream::iter(events)
            .map(move |event| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok(event)
            })
            .boxed())
    }
}
