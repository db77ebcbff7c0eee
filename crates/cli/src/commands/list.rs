//! List test strategies

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use appbench_e2e::CatalogFilter;

use super::registry;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also list strategies from this catalog file or directory
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

/// Strategy display wrapper for serialization
#[derive(Serialize)]
pub struct StrategyDisplay {
    pub name: String,
    pub description: String,
}

impl TableDisplay for StrategyDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Strategy", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.description.clone()]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> Result<()> {
    let registry = registry(args.catalog.as_deref(), &CatalogFilter::default())?;
    let items: Vec<StrategyDisplay> = registry
        .iter()
        .map(|s| StrategyDisplay {
            name: s.name().to_string(),
            description: s.description().to_string(),
        })
        .collect();
    print_list(&items, format);
    Ok(())
}
