//! Suite generation strategies and the test case contract

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use appbench_agent::{AgentError, AgentFactory, DriverAgent};
use appbench_common::{TestContext, TestResult};

use crate::error::{HarnessError, HarnessResult};
use crate::suites::SmokeStrategy;

/// What a strategy and its cases know about the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunConfig {
    /// Project under test
    pub project_dir: PathBuf,

    /// URL the dev server answers on
    pub base_url: String,
}

/// One executable test case.
///
/// `run` returns `Ok` for every behavioral outcome, failures included.
/// An `Err` means the agent protocol broke and aborts the whole run.
#[async_trait]
pub trait TestCase: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        agents: &dyn AgentFactory,
        context: &TestContext,
        config: &TestRunConfig,
    ) -> Result<TestResult, AgentError>;
}

/// Ordered, named collection of test cases
pub struct Suite {
    pub name: String,
    pub cases: Vec<Box<dyn TestCase>>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn with_case(mut self, case: impl TestCase + 'static) -> Self {
        self.cases.push(Box::new(case));
        self
    }

    pub fn push(&mut self, case: Box<dyn TestCase>) {
        self.cases.push(case);
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn case_names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name()).collect()
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("cases", &self.case_names())
            .finish()
    }
}

/// Decides what to test for an app.
///
/// `discover` may use the agent to explore; `generate_suite` is pure and
/// must not fail. A strategy that finds nothing returns an empty suite.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn discover(
        &self,
        config: &TestRunConfig,
        agent: &mut DriverAgent,
    ) -> Result<TestContext, AgentError>;

    fn generate_suite(&self, config: &TestRunConfig, context: &TestContext) -> Suite;
}

/// Strategies available by name
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SmokeStrategy::new()));
        registry
    }

    /// Add a strategy, replacing any with the same name
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> HarnessResult<Arc<dyn Strategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| HarnessError::UnknownStrategy(name.to_string()))
    }

    /// Strategies sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.strategies.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(|k| k.as_str()).collect()
    }
}
