use async_trait::async_trait;
use std::fmt::Write as _;

use appbench_agent::{AgentError, AgentFactory, AgentOverrides, Capability, CapabilitySet};
use appbench_common::{TestContext, TestResult};

use super::{AppOverview, APP_OVERVIEW_KEY};
use crate::strategy::{TestCase, TestRunConfig};

/// Test case carried out by a browser agent from natural-language instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTestCase {
    name: String,
    instructions: String,
    capabilities: CapabilitySet,
}

impl AgentTestCase {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            capabilities: CapabilitySet::verification(),
        }
    }

    /// Also grant coordinate-based interaction on screenshots
    pub fn with_vision(mut self) -> Self {
        self.capabilities = self.capabilities.with(Capability::Vision);
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn prompt(&self, context: &TestContext, config: &TestRunConfig) -> String {
        let mut prompt = format!("The web app under test is running at {}.\n", config.base_url);
        if let Some(overview) = context.get_as::<AppOverview>(APP_OVERVIEW_KEY) {
            let _ = writeln!(prompt, "App: {} - {}", overview.title, overview.summary);
        }
        let _ = write!(
            prompt,
            "\nTest: {}\n{}\n\n\
             Open the app in the browser and carry this out the way a user would. \
             Report `passed` only if you observed the expected behavior, `failed` with the \
             reason if the app misbehaved, and `skipped` if the behavior could not be \
             exercised at all. Describe in `howTested` what you actually did.",
            self.name, self.instructions
        );
        prompt
    }
}

#[async_trait]
impl TestCase for AgentTestCase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        agents: &dyn AgentFactory,
        context: &TestContext,
        config: &TestRunConfig,
    ) -> Result<TestResult, AgentError> {
        let mut agent = agents
            .test_case_agent(&self.capabilities)
            .with_label(format!("test:{}", self.name));

        let mut result: TestResult = agent
            .query(&self.prompt(context, config), &AgentOverrides::none())
            .await?;
        // The case owns its name; agents paraphrase.
        result.name = self.name.clone();
        Ok(result)
    }
}
