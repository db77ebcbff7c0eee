//! Declarative YAML test catalogs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

use appbench_agent::{AgentError, DriverAgent};
use appbench_common::TestContext;

use super::{discover_overview, AgentTestCase};
use crate::error::{HarnessError, HarnessResult};
use crate::strategy::{Strategy, Suite, TestRunConfig};

/// A named set of hand-written test cases parsed from YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Strategy name the catalog registers under
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tests: Vec<CatalogEntry>,
}

/// One test case in a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,

    /// What the test is about
    #[serde(default)]
    pub description: String,

    /// User actions, in plain language
    #[serde(default)]
    pub steps: Vec<String>,

    /// What the user should observe
    #[serde(default)]
    pub expect: Option<String>,

    /// Needs coordinate-based interaction (canvas, drag and drop)
    #[serde(default)]
    pub vision: bool,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl CatalogEntry {
    fn instructions(&self) -> String {
        let mut text = self.description.clone();
        if !self.steps.is_empty() {
            text.push_str("\nSteps:");
            for (i, step) in self.steps.iter().enumerate() {
                let _ = write!(text, "\n{}. {}", i + 1, step);
            }
        }
        if let Some(expect) = &self.expect {
            let _ = write!(text, "\nExpected: {}", expect);
        }
        text
    }

    fn to_case(&self) -> AgentTestCase {
        let case = AgentTestCase::new(&self.name, self.instructions());
        if self.vision {
            case.with_vision()
        } else {
            case
        }
    }
}

impl Catalog {
    /// Parse a catalog from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let catalog: Catalog = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        if !path.is_file() {
            return Err(HarnessError::CatalogNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|message| HarnessError::CatalogParse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Load every `.yaml`/`.yml` catalog under a directory, in path order
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(HarnessError::CatalogNotFound(dir.to_path_buf()));
        }

        let mut catalogs = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            debug!("Loading catalog {}", entry.path().display());
            catalogs.push(Self::from_file(entry.path())?);
        }
        Ok(catalogs)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("catalog name must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for test in &self.tests {
            if test.name.trim().is_empty() {
                return Err("test name must not be empty".to_string());
            }
            if !seen.insert(test.name.as_str()) {
                return Err(format!("duplicate test name '{}'", test.name));
            }
        }
        Ok(())
    }
}

/// Narrows a catalog to a tag and/or a single test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub tag: Option<String>,
    pub name: Option<String>,
}

impl CatalogFilter {
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        let tag_ok = self
            .tag
            .as_ref()
            .map(|tag| entry.tags.iter().any(|t| t == tag))
            .unwrap_or(true);
        let name_ok = self.name.as_ref().map(|name| &entry.name == name).unwrap_or(true);
        tag_ok && name_ok
    }
}

/// Runs the cases of one catalog, after a discovery pass for context
#[derive(Debug, Clone)]
pub struct CatalogStrategy {
    catalog: Catalog,
    filter: CatalogFilter,
}

impl CatalogStrategy {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            filter: CatalogFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: CatalogFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[async_trait]
impl Strategy for CatalogStrategy {
    fn name(&self) -> &str {
        &self.catalog.name
    }

    fn description(&self) -> &str {
        &self.catalog.description
    }

    async fn discover(
        &self,
        config: &TestRunConfig,
        agent: &mut DriverAgent,
    ) -> Result<TestContext, AgentError> {
        discover_overview(config, agent).await
    }

    fn generate_suite(&self, _config: &TestRunConfig, _context: &TestContext) -> Suite {
        let mut suite = Suite::new(&self.catalog.name);
        for entry in self.catalog.tests.iter().filter(|e| self.filter.matches(e)) {
            suite.push(Box::new(entry.to_case()));
        }
        suite
    }
}
