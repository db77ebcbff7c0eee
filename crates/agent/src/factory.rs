//! Building driver agents with the right tool set

use appbench_common::AgentSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{AgentBackend, QueryOptions};
use crate::capability::{
    BrowserToolConfig, CapabilitySet, CODING_TOOLS, DISALLOWED_TEST_TOOLS, DISCOVERY_TOOLS,
    TEST_CASE_TOOLS,
};
use crate::driver::DriverAgent;

const DISCOVERY_SYSTEM_PROMPT: &str = "You are exploring a web application to describe it for \
a test plan. Read files and look at pages; do not modify anything.";

const TEST_CASE_SYSTEM_PROMPT: &str = "You are a QA engineer testing a running web application \
through a browser. Exercise the behavior you are asked about like a user would and report \
exactly what you observed. Report a failure when the app misbehaves; report a skip only when \
the behavior cannot be exercised at all.";

const CODING_SYSTEM_PROMPT: &str = "You are building a small web application in the current \
directory. The app must start with `npm run start`, honor the PORT environment variable and a \
--port flag, and serve its UI at /.";

/// Agent settings resolved for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub max_turns: u32,
    pub coding_max_turns: u32,
    pub model: Option<String>,
    pub log_events: bool,
    pub browser: BrowserToolConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_turns: settings.max_turns,
            coding_max_turns: settings.coding_max_turns,
            model: settings.model.clone(),
            log_events: settings.log_events,
            browser: BrowserToolConfig {
                command: settings.browser_mcp_command.clone(),
                headed: settings.headed,
                trace_dir: settings.trace_dir.clone(),
            },
        }
    }
}

/// Hands out fresh agents. Every call returns a new session.
pub trait AgentFactory: Send + Sync {
    /// Read-only exploration agent
    fn discovery_agent(&self) -> DriverAgent;

    /// Browser agent for one test case; evaluation tools are always removed
    fn test_case_agent(&self, capabilities: &CapabilitySet) -> DriverAgent;
}

/// Factory bound to one project directory and backend
#[derive(Clone)]
pub struct DefaultAgentFactory {
    backend: Arc<dyn AgentBackend>,
    project_dir: PathBuf,
    config: AgentConfig,
}

impl DefaultAgentFactory {
    pub fn new(backend: Arc<dyn AgentBackend>, project_dir: impl Into<PathBuf>, config: AgentConfig) -> Self {
        Self {
            backend,
            project_dir: project_dir.into(),
            config,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Write-capable agent that builds or updates the attempt
    pub fn coding_agent(&self) -> DriverAgent {
        let options = QueryOptions {
            max_turns: Some(self.config.coding_max_turns),
            allowed_tools: to_strings(CODING_TOOLS),
            append_system_prompt: Some(CODING_SYSTEM_PROMPT.to_string()),
            ..self.base_options()
        };
        self.agent("coding", options)
    }

    fn base_options(&self) -> QueryOptions {
        QueryOptions {
            cwd: self.project_dir.clone(),
            max_turns: Some(self.config.max_turns),
            model: self.config.model.clone(),
            ..Default::default()
        }
    }

    fn agent(&self, label: &str, options: QueryOptions) -> DriverAgent {
        DriverAgent::new(label, self.backend.clone(), options).with_event_logging(self.config.log_events)
    }
}

impl AgentFactory for DefaultAgentFactory {
    fn discovery_agent(&self) -> DriverAgent {
        let options = QueryOptions {
            allowed_tools: to_strings(DISCOVERY_TOOLS),
            disallowed_tools: to_strings(DISALLOWED_TEST_TOOLS),
            mcp_servers: self.config.browser.mcp_servers(&CapabilitySet::empty()),
            append_system_prompt: Some(DISCOVERY_SYSTEM_PROMPT.to_string()),
            ..self.base_options()
        };
        self.agent("discovery", options)
    }

    fn test_case_agent(&self, capabilities: &CapabilitySet) -> DriverAgent {
        let options = QueryOptions {
            allowed_tools: to_strings(TEST_CASE_TOOLS),
            disallowed_tools: to_strings(DISALLOWED_TEST_TOOLS),
            mcp_servers: self.config.browser.mcp_servers(capabilities),
            append_system_prompt: Some(TEST_CASE_SYSTEM_PROMPT.to_string()),
            ..self.base_options()
        };
        self.agent("test-case", options)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
