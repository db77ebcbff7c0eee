//! appbench CLI - Main Entry Point

use clap::Parser;
use std::process::ExitCode;

use appbench_cli::commands::{config, list, report, run, test};
use appbench_cli::output::print_error;
use appbench_cli::{Cli, Commands, EXIT_FAILED, EXIT_HARNESS_ERROR, EXIT_PASSED};

/// `Ok(true)` when every test passed or nothing was tested
async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let format = cli.global.format;
    match cli.command {
        Commands::Run(args) => run::execute(args, cli.global.load_config()?, format).await,
        Commands::RunExisting(args) => {
            run::execute_existing(args, cli.global.load_config()?, format).await
        }
        Commands::Test(args) => test::execute(args, cli.global.load_config()?, format).await,
        Commands::Report(args) => report::execute(args, format),
        Commands::List(args) => list::execute(args, format).map(|_| true),
        Commands::InitConfig(args) => config::execute(args).map(|_| true),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(cli.global.verbose)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli).await {
        Ok(true) => ExitCode::from(EXIT_PASSED),
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_HARNESS_ERROR)
        }
    }
}
