//! Built-in strategies and the agent-driven test case

mod agent_case;
mod catalog;
mod smoke;

pub use agent_case::AgentTestCase;
pub use catalog::{Catalog, CatalogEntry, CatalogFilter, CatalogStrategy};
pub use smoke::SmokeStrategy;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use appbench_agent::{AgentError, AgentOverrides, DriverAgent};
use appbench_common::TestContext;

use crate::strategy::TestRunConfig;

/// Context key holding the discovered [`AppOverview`]
pub const APP_OVERVIEW_KEY: &str = "app_overview";

/// Context key holding the server URL seen during discovery
pub const BASE_URL_KEY: &str = "base_url";

/// Upper bound on features turned into test cases
pub const MAX_FEATURES: usize = 8;

/// What discovery learned about the app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AppOverview {
    /// Short name of the app
    pub title: String,
    /// One paragraph on what the app does
    pub summary: String,
    /// User-facing features worth testing, most important first
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Feature {
    pub name: String,
    /// What a user can do and what they should see
    pub description: String,
}

/// Ask the discovery agent for an [`AppOverview`] and store it in a fresh context
pub(crate) async fn discover_overview(
    config: &TestRunConfig,
    agent: &mut DriverAgent,
) -> Result<TestContext, AgentError> {
    let prompt = format!(
        "The web app in the current directory is running at {url}.\n\
         Read its source (start with the manifest and entry points) and open {url} in the \
         browser. Describe the app: a short title, a one-paragraph summary, and at most \
         {max} user-facing features a tester should exercise, most important first. \
         Only list features you have confirmed exist in the UI.",
        url = config.base_url,
        max = MAX_FEATURES,
    );
    let overview: AppOverview = agent.query(&prompt, &AgentOverrides::none()).await?;
    info!(
        "Discovered '{}' with {} feature(s)",
        overview.title,
        overview.features.len()
    );

    let mut context = TestContext::new();
    context.insert_value(BASE_URL_KEY, serde_json::Value::String(config.base_url.clone()));
    if let Err(e) = context.insert(APP_OVERVIEW_KEY, &overview) {
        warn!("Could not store app overview in context: {}", e);
    }
    Ok(context)
}
