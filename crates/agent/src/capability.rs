//! Capabilities and the browser tool server

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::backend::McpServerConfig;

/// Name the browser MCP server is registered under
pub const BROWSER_SERVER: &str = "playwright";

/// Never exposed to test-case agents, whatever they request.
/// Raw script evaluation in the page is too unreliable to base verdicts on.
pub const DISALLOWED_TEST_TOOLS: &[&str] = &["mcp__playwright__browser_evaluate"];

/// Tools for read-only discovery
pub const DISCOVERY_TOOLS: &[&str] = &[
    "Read",
    "Glob",
    "Grep",
    "LS",
    "mcp__playwright__browser_navigate",
    "mcp__playwright__browser_snapshot",
    "mcp__playwright__browser_take_screenshot",
];

/// Tools for test-case agents (all browser tools, minus the disallowed ones)
pub const TEST_CASE_TOOLS: &[&str] = &["mcp__playwright"];

/// Tools for the coding agent that builds an attempt
pub const CODING_TOOLS: &[&str] = &[
    "Read", "Glob", "Grep", "LS", "Edit", "MultiEdit", "Write", "Bash", "TodoWrite",
];

/// Permission bundle granted to a test-case agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Assertion tools (element/text visibility checks)
    Verification,
    /// Coordinate-based mouse interaction on screenshots
    Vision,
}

impl Capability {
    /// Value for the browser server's `--caps` flag
    pub fn browser_cap(&self) -> &'static str {
        match self {
            Capability::Verification => "verify",
            Capability::Vision => "vision",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Baseline for test cases
    pub fn verification() -> Self {
        Self::empty().with(Capability::Verification)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

/// How to launch the browser tool server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserToolConfig {
    /// Launch command, program first
    pub command: Vec<String>,
    pub headed: bool,
    pub trace_dir: Option<PathBuf>,
}

impl Default for BrowserToolConfig {
    fn default() -> Self {
        Self {
            command: vec!["npx".to_string(), "@playwright/mcp@latest".to_string()],
            headed: false,
            trace_dir: None,
        }
    }
}

impl BrowserToolConfig {
    /// Server entry for an agent granted `capabilities`
    pub fn mcp_server(&self, capabilities: &CapabilitySet) -> McpServerConfig {
        let (program, rest) = match self.command.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => ("npx".to_string(), vec!["@playwright/mcp@latest".to_string()]),
        };

        let mut args = rest;
        if !capabilities.is_empty() {
            let caps: Vec<&str> = capabilities.iter().map(|c| c.browser_cap()).collect();
            args.push(format!("--caps={}", caps.join(",")));
        }
        if !self.headed {
            args.push("--headless".to_string());
        }
        // Each agent gets its own browser profile so concurrent tests do
        // not share cookies or storage.
        args.push("--isolated".to_string());
        if let Some(dir) = &self.trace_dir {
            args.push("--save-trace".to_string());
            args.push(format!("--output-dir={}", dir.display()));
        }

        McpServerConfig {
            command: program,
            args,
            env: BTreeMap::new(),
        }
    }

    pub fn mcp_servers(&self, capabilities: &CapabilitySet) -> BTreeMap<String, McpServerConfig> {
        let mut servers = BTreeMap::new();
        servers.insert(BROWSER_SERVER.to_string(), self.mcp_server(capabilities));
        servers
    }
}
