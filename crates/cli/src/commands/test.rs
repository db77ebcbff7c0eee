//! Test an existing attempt

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use appbench_common::HarnessConfig;

use super::{benchmark, finish, StrategyArgs};
use crate::output::{print_success, OutputFormat};

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Attempt directory holding the app
    #[arg(short, long)]
    pub attempt: PathBuf,

    #[command(flatten)]
    pub strategy: StrategyArgs,
}

pub async fn execute(args: TestArgs, config: HarnessConfig, format: OutputFormat) -> Result<bool> {
    let strategy = args.strategy.resolve()?;
    let outcome = benchmark(config).test(&args.attempt, strategy.as_ref()).await?;

    let passed = finish(&outcome.results, format);
    print_success(&format!("Results written to {}", outcome.results_path.display()));
    Ok(passed)
}
