//! appbench Common Library
//!
//! Shared result types, the discovery-to-suite test context, and the
//! harness configuration used by the agent, e2e and cli crates.

pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::{AgentSettings, HarnessConfig, OutputSettings, RunnerSettings, ServerSettings};
pub use context::TestContext;
pub use error::{Error, Result};
pub use types::*;

/// appbench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "appbench.toml";

/// Default config path
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Default directory for benchmark attempts and results
pub fn default_output_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("results")
}
