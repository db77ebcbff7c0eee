//! appbench agent layer
//!
//! Wraps a conversational coding agent (the `claude` CLI in stream-json
//! mode by default) behind a small protocol:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  DriverAgent (one session per instance)                      │
//! │    ├── ask(prompt)   -> String            free text          │
//! │    └── query::<T>()  -> T                 <response>JSON     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  AgentBackend::query(prompt, options) -> MessageStream       │
//! │    system / assistant / user / result events                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │  AgentFactory                                                │
//! │    ├── discovery_agent()            read-only exploration    │
//! │    ├── test_case_agent(caps)        browser + verification   │
//! │    └── coding_agent()               writes the attempt       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod capability;
pub mod claude;
pub mod driver;
pub mod error;
pub mod factory;
pub mod message;
pub mod structured;

#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use backend::{AgentBackend, AgentOverrides, McpServerConfig, MessageStream, QueryOptions};
pub use capability::{BrowserToolConfig, Capability, CapabilitySet, DISALLOWED_TEST_TOOLS};
pub use claude::ClaudeCliBackend;
pub use driver::DriverAgent;
pub use error::{AgentError, AgentResult, ResponseFormatIssue};
pub use factory::{AgentConfig, AgentFactory, DefaultAgentFactory};
pub use message::{AgentMessage, ContentBlock, ResultMessage, ResultSubtype, TerminalOutcome};
