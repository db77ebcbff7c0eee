//! Re-render the saved results of an attempt

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use appbench_e2e::{read_results, RESULTS_FILE};

use super::finish;
use crate::output::OutputFormat;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Attempt directory holding a results file
    #[arg(short, long)]
    pub attempt: PathBuf,
}

pub fn execute(args: ReportArgs, format: OutputFormat) -> Result<bool> {
    let path = args.attempt.join(RESULTS_FILE);
    if !path.is_file() {
        anyhow::bail!(
            "No {} in {} (run `appbench test` first)",
            RESULTS_FILE,
            args.attempt.display()
        );
    }
    let results = read_results(&path)?;
    Ok(finish(&results, format))
}
