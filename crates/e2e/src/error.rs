//! Error types for suite execution

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use appbench_agent::AgentError;

/// Dev-server lifecycle failures
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Port {port} is already in use{}", match .next_available_port {
        Some(next) => format!(" (next free port: {})", next),
        None => String::new(),
    })]
    PortInUse {
        port: u16,
        next_available_port: Option<u16>,
    },

    #[error("No project found at {}: missing {manifest}", .path.display())]
    ProjectNotFound { path: PathBuf, manifest: String },

    #[error("Dependencies not installed: {} does not exist (run the install command first)", .path.display())]
    DependenciesNotInstalled { path: PathBuf },

    #[error("Dev server at {url} not ready after {}s (last error: {})", .timeout.as_secs(), .last_error.as_deref().unwrap_or("none"))]
    StartupTimeout {
        url: String,
        timeout: Duration,
        last_error: Option<String>,
    },

    #[error("Dev server exited before becoming ready ({status})")]
    ExitedEarly { status: String },

    #[error("Failed to spawn dev server: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Anything that aborts a suite run or benchmark attempt
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Unknown test strategy: {0}")]
    UnknownStrategy(String),

    #[error("Test catalog not found: {}", .0.display())]
    CatalogNotFound(PathBuf),

    #[error("Test catalog {} is invalid: {message}", .path.display())]
    CatalogParse { path: PathBuf, message: String },

    #[error("Invalid attempt path {}: {reason}", .path.display())]
    InvalidAttemptPath { path: PathBuf, reason: String },

    #[error("Dependency install failed: {0}")]
    Install(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] appbench_common::Error),
}

impl HarnessError {
    /// Agent session involved in the failure, if any
    pub fn session_id(&self) -> Option<&str> {
        match self {
            HarnessError::Agent(e) => e.session_id(),
            _ => None,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_in_use_message() {
        let err = ServerError::PortInUse {
            port: 4000,
            next_available_port: Some(4001),
        };
        assert_eq!(err.to_string(), "Port 4000 is already in use (next free port: 4001)");
    }

    #[test]
    fn test_timeout_message_includes_last_error() {
        let err = ServerError::StartupTimeout {
            url: "http://127.0.0.1:3000".into(),
            timeout: Duration::from_secs(30),
            last_error: Some("GET / returned 404 Not Found".into()),
        };
        let message = err.to_string();
        assert!(message.contains("30s"));
        assert!(message.contains("404"));
    }

    #[test]
    fn test_session_surfaces_through_harness_error() {
        let err = HarnessError::from(AgentError::UnexpectedTermination {
            session_id: Some("abc".into()),
        });
        assert_eq!(err.session_id(), Some("abc"));
        assert!(err.to_string().contains("abc"));
    }
}
