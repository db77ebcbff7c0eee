//! Config file scaffolding

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use appbench_common::{default_config_path, HarnessConfig};

use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the file (defaults to ./appbench.toml)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitConfigArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(default_config_path);
    if path.exists() && !args.force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    HarnessConfig::default().save(&path)?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}
