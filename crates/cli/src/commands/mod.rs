//! CLI Commands

pub mod config;
pub mod list;
pub mod report;
pub mod run;
pub mod test;

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use appbench_agent::ClaudeCliBackend;
use appbench_common::{HarnessConfig, TestSuiteResults};
use appbench_e2e::{
    Benchmark, Catalog, CatalogFilter, CatalogStrategy, Strategy, StrategyRegistry,
};

use crate::output::{print_results, OutputFormat};

/// Which strategy to run and how to narrow it
#[derive(Args, Debug, Clone)]
pub struct StrategyArgs {
    /// Strategy name (see `appbench list`)
    #[arg(short, long, default_value = "smoke")]
    pub strategy: String,

    /// YAML catalog file or directory of catalogs to register as strategies
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Only run catalog tests carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only run the catalog test with this name
    #[arg(long)]
    pub only: Option<String>,
}

impl StrategyArgs {
    pub fn filter(&self) -> CatalogFilter {
        CatalogFilter {
            tag: self.tag.clone(),
            name: self.only.clone(),
        }
    }

    /// Look up the selected strategy among built-ins and catalogs
    pub fn resolve(&self) -> Result<Arc<dyn Strategy>> {
        let registry = registry(self.catalog.as_deref(), &self.filter())?;
        Ok(registry.get(&self.strategy)?)
    }
}

/// Built-in strategies plus any catalogs found at `catalog`
pub fn registry(catalog: Option<&Path>, filter: &CatalogFilter) -> Result<StrategyRegistry> {
    let mut registry = StrategyRegistry::with_builtins();
    if let Some(path) = catalog {
        let catalogs = if path.is_dir() {
            Catalog::load_all(path)?
        } else {
            vec![Catalog::from_file(path)?]
        };
        for catalog in catalogs {
            debug!("Registering catalog strategy '{}'", catalog.name);
            registry.register(Arc::new(
                CatalogStrategy::new(catalog).with_filter(filter.clone()),
            ));
        }
    }
    Ok(registry)
}

pub fn benchmark(config: HarnessConfig) -> Benchmark {
    let backend = Arc::new(ClaudeCliBackend::new(config.agent.binary.clone()));
    Benchmark::new(config, backend)
}

pub fn read_prompt(path: &Path) -> Result<String> {
    let prompt = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read prompt {}: {}", path.display(), e))?;
    if prompt.trim().is_empty() {
        anyhow::bail!("Prompt file {} is empty", path.display());
    }
    Ok(prompt)
}

/// Print results and report whether the run passed
pub fn finish(results: &TestSuiteResults, format: OutputFormat) -> bool {
    print_results(results, format);
    results.summary.all_passed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_directory_registers_strategies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("todo.yaml"),
            "name: todo\ntests:\n  - name: add\n    tags: [core]\n  - name: export\n",
        )
        .unwrap();

        let registry = registry(Some(dir.path()), &CatalogFilter::default()).unwrap();
        assert_eq!(registry.names(), vec!["smoke", "todo"]);
    }

    #[test]
    fn test_unknown_strategy() {
        let args = StrategyArgs {
            strategy: "nope".into(),
            catalog: None,
            tag: None,
            only: None,
        };
        let err = args.resolve().err().unwrap();
        assert!(err.to_string().contains("Unknown test strategy: nope"));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "  \n").unwrap();
        assert!(read_prompt(&path).is_err());
    }
}
