//! appbench CLI
//!
//! Builds benchmark attempts with a coding agent and scores them with
//! agent-driven functionality tests.

pub mod commands;
pub mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use appbench_common::{default_config_path, HarnessConfig};

use commands::{config, list, report, run, test};

/// Process exit code when every test passed (skips allowed)
pub const EXIT_PASSED: u8 = 0;
/// Process exit code when at least one test failed
pub const EXIT_FAILED: u8 = 1;
/// Process exit code when the harness itself broke
pub const EXIT_HARNESS_ERROR: u8 = 2;

/// appbench - benchmark harness for AI coding agents
#[derive(Parser, Debug)]
#[command(name = "appbench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand; they override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to ./appbench.toml when present)
    #[arg(long, global = true, env = "APPBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port the app under test must listen on
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Maximum test cases run at once
    #[arg(long, global = true)]
    pub max_concurrent_tests: Option<usize>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Save browser traces into this directory
    #[arg(long, global = true)]
    pub trace_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load the config file (or defaults) and apply flag overrides
    pub fn load_config(&self) -> anyhow::Result<HarnessConfig> {
        let path = self.config.clone().unwrap_or_else(default_config_path);
        let mut config = HarnessConfig::load(&path)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max) = self.max_concurrent_tests {
            config.runner.max_concurrent_tests = max;
        }
        if self.headed {
            config.agent.headed = true;
        }
        if let Some(dir) = &self.trace_dir {
            config.agent.trace_dir = Some(dir.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a new attempt from a prompt, then test it
    Run(run::RunArgs),

    /// Copy an existing project into a new attempt, apply a prompt, then test it
    RunExisting(run::RunExistingArgs),

    /// Test an existing attempt
    Test(test::TestArgs),

    /// Show the saved results of an attempt
    Report(report::ReportArgs),

    /// List available test strategies
    List(list::ListArgs),

    /// Write a config file with every default spelled out
    InitConfig(config::InitConfigArgs),
}
