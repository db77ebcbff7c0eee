use async_trait::async_trait;
use tracing::warn;

use appbench_agent::{AgentError, DriverAgent};
use appbench_common::TestContext;

use super::{discover_overview, AgentTestCase, AppOverview, APP_OVERVIEW_KEY, MAX_FEATURES};
use crate::strategy::{Strategy, Suite, TestRunConfig};

pub const SMOKE_STRATEGY: &str = "smoke";

const APP_LOADS_CASE: &str = "App loads";

/// Checks the app loads, then tests each feature discovery found
#[derive(Debug, Clone, Copy, Default)]
pub struct SmokeStrategy;

impl SmokeStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Strategy for SmokeStrategy {
    fn name(&self) -> &str {
        SMOKE_STRATEGY
    }

    fn description(&self) -> &str {
        "Discover the app's features, then check it loads and each feature works"
    }

    async fn discover(
        &self,
        config: &TestRunConfig,
        agent: &mut DriverAgent,
    ) -> Result<TestContext, AgentError> {
        discover_overview(config, agent).await
    }

    fn generate_suite(&self, _config: &TestRunConfig, context: &TestContext) -> Suite {
        let mut suite = Suite::new(SMOKE_STRATEGY).with_case(AgentTestCase::new(
            APP_LOADS_CASE,
            "Open / and confirm the page renders real content with no error screen, \
             blank page or console-visible crash.",
        ));

        let Some(overview) = context.get_as::<AppOverview>(APP_OVERVIEW_KEY) else {
            warn!("No app overview in context, running only the static cases");
            return suite;
        };

        for feature in overview.features.into_iter().take(MAX_FEATURES) {
            suite.push(Box::new(AgentTestCase::new(
                feature.name,
                format!("Verify this feature works: {}", feature.description),
            )));
        }
        suite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suites::fixtures::*;
    use crate::suites::Feature;
    use appbench_agent::scripted::ScriptedBackend;
    use appbench_agent::AgentFactory;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_discover_then_generate() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_answer("disc", &answer(&todo_overview()));
        let factory = factory(backend.clone());

        let strategy = SmokeStrategy::new();
        let mut agent = factory.discovery_agent();
        let context = strategy.discover(&run_config(), &mut agent).await.unwrap();
        assert_eq!(agent.session_id(), Some("disc"));

        let suite = strategy.generate_suite(&run_config(), &context);
        assert_eq!(suite.name, "smoke");
        assert_eq!(suite.case_names(), vec!["App loads", "Add todo", "Complete todo"]);
    }

    #[test]
    fn test_empty_context_gives_static_case_only() {
        let suite = SmokeStrategy::new().generate_suite(&run_config(), &TestContext::new());
        assert_eq!(suite.case_names(), vec!["App loads"]);
    }

    #[test]
    fn test_feature_count_is_capped() {
        let mut overview = todo_overview();
        overview.features = (0..20)
            .map(|i| Feature {
                name: format!("f{}", i),
                description: "does a thing".into(),
            })
            .collect();
        let mut context = TestContext::new();
        context.insert(APP_OVERVIEW_KEY, &overview).unwrap();

        let suite = SmokeStrategy::new().generate_suite(&run_config(), &context);
        assert_eq!(suite.len(), 1 + MAX_FEATURES);
    }

    #[tokio::test]
    async fn test_discovery_schema_mismatch_is_fatal() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_answer("disc", r#"<response>{"title": "x"}</response>"#);
        let factory = factory(backend);

        let mut agent = factory.discovery_agent();
        let err = SmokeStrategy::new()
            .discover(&run_config(), &mut agent)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ResponseFormatInvalid { .. }));
    }
}
