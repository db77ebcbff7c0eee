//! Benchmark run commands

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use appbench_common::HarnessConfig;
use appbench_e2e::AttemptOutcome;

use super::{benchmark, finish, read_prompt, StrategyArgs};
use crate::output::{print_info, print_success, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Prompt file describing the app to build
    #[arg(short, long)]
    pub prompt: PathBuf,

    /// Directory attempts are created in
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Label used in the attempt directory name (defaults to the prompt file name)
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub strategy: StrategyArgs,
}

#[derive(Args, Debug)]
pub struct RunExistingArgs {
    /// Project to start from; copied without node_modules
    #[arg(long)]
    pub source: PathBuf,

    /// Prompt file describing the change to make
    #[arg(short, long)]
    pub prompt: PathBuf,

    /// Directory attempts are created in
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub strategy: StrategyArgs,
}

fn report(outcome: &AttemptOutcome, format: OutputFormat) -> bool {
    let passed = finish(&outcome.results, format);
    print_info(&format!("Attempt: {}", outcome.dir.display()));
    print_success(&format!("Results written to {}", outcome.results_path.display()));
    passed
}

pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> Result<bool> {
    if let Some(output) = args.output {
        config.output.dir = output;
    }
    let prompt = read_prompt(&args.prompt)?;
    let label = args.name.unwrap_or_else(|| {
        args.prompt
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "attempt".to_string())
    });
    let strategy = args.strategy.resolve()?;

    let outcome = benchmark(config).run(&prompt, &label, strategy.as_ref()).await?;
    Ok(report(&outcome, format))
}

pub async fn execute_existing(
    args: RunExistingArgs,
    mut config: HarnessConfig,
    format: OutputFormat,
) -> Result<bool> {
    if let Some(output) = args.output {
        config.output.dir = output;
    }
    let prompt = read_prompt(&args.prompt)?;
    let strategy = args.strategy.resolve()?;

    let outcome = benchmark(config)
        .run_existing(&args.source, &prompt, strategy.as_ref())
        .await?;
    Ok(report(&outcome, format))
}
