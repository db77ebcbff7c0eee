//! Harness configuration
//!
//! Loaded from an optional `appbench.toml`; every section falls back to
//! its defaults so a missing file or a partial file is fine. CLI flags are
//! applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Dev server settings
    pub server: ServerSettings,

    /// Agent backend settings
    pub agent: AgentSettings,

    /// Test runner settings
    pub runner: RunnerSettings,

    /// Result output settings
    pub output: OutputSettings,
}

/// Dev server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port the app under test listens on
    pub port: u16,

    /// Host used for readiness polling and the URL handed to agents
    pub host: String,

    /// Command used to start the app; `PORT` is set and `--port <n>` is appended
    pub start_command: Vec<String>,

    /// Command used to install dependencies for fresh attempts
    pub install_command: Vec<String>,

    /// File whose presence marks a valid project
    pub manifest_file: String,

    /// Directory that must exist once dependencies are installed
    pub dependencies_dir: String,

    /// Readiness timeout in seconds
    pub startup_timeout_secs: u64,

    /// Grace period after SIGTERM before escalating, in seconds
    pub stop_grace_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
            start_command: ["npm", "run", "start", "--"].map(String::from).to_vec(),
            install_command: vec!["npm".to_string(), "install".to_string()],
            manifest_file: "package.json".to_string(),
            dependencies_dir: "node_modules".to_string(),
            startup_timeout_secs: 30,
            stop_grace_secs: 5,
        }
    }
}

impl ServerSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// Agent backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent CLI binary
    pub binary: String,

    /// Model override passed to the agent CLI
    pub model: Option<String>,

    /// Turn cap for test-case and discovery agents
    pub max_turns: u32,

    /// Turn cap for the coding agent that builds attempts
    pub coding_max_turns: u32,

    /// Run the browser with a visible window
    pub headed: bool,

    /// Directory for browser traces; tracing is off when unset
    pub trace_dir: Option<PathBuf>,

    /// Log every agent event at debug level
    pub log_events: bool,

    /// Command that launches the browser MCP server
    pub browser_mcp_command: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            model: None,
            max_turns: 50,
            coding_max_turns: 200,
            headed: false,
            trace_dir: None,
            log_events: true,
            browser_mcp_command: vec!["npx".to_string(), "@playwright/mcp@latest".to_string()],
        }
    }
}

/// Test runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Maximum number of test cases in flight at once
    pub max_concurrent_tests: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tests: 4,
        }
    }
}

/// Result output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for attempts and `test-results.json`
    pub dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: crate::default_output_dir(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, or defaults if it does not exist.
    ///
    /// Values are not checked here; call [`HarnessConfig::validate`] once
    /// every override has been applied.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.runner.max_concurrent_tests == 0 {
            return Err(Error::InvalidConfig(
                "runner.max_concurrent_tests must be at least 1".to_string(),
            ));
        }
        if self.server.start_command.is_empty() {
            return Err(Error::InvalidConfig(
                "server.start_command must not be empty".to_string(),
            ));
        }
        if self.agent.max_turns == 0 {
            return Err(Error::InvalidConfig(
                "agent.max_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("appbench.toml")).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.runner.max_concurrent_tests, 4);
        assert_eq!(config.server.startup_timeout(), Duration::from_secs(30));
        assert_eq!(config.server.stop_grace(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appbench.toml");
        std::fs::write(&path, "[runner]\nmax_concurrent_tests = 2\n[server]\nport = 4000\n").unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.runner.max_concurrent_tests, 2);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.manifest_file, "package.json");
        assert_eq!(config.agent.binary, "claude");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appbench.toml");
        std::fs::write(&path, "[runner]\nmax_concurrent_tests = 0\n").unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.runner.max_concurrent_tests, 0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("appbench.toml");
        let mut config = HarnessConfig::default();
        config.agent.headed = true;
        config.save(&path).unwrap();

        assert_eq!(HarnessConfig::load(&path).unwrap(), config);
    }
}
