//! Test runner: starts the dev server, runs a strategy's discovery and suite
//! with bounded concurrency, and always tears the server down

use chrono::Utc;
use futures::{FutureExt, StreamExt, TryStreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use appbench_agent::{AgentError, AgentFactory};
use appbench_common::{TestContext, TestResult, TestStatus, TestSuiteResults};

use crate::error::HarnessResult;
use crate::server::{DevServerLauncher, NpmDevServerLauncher, ServerConfig};
use crate::strategy::{Strategy, Suite, TestCase, TestRunConfig};

/// Phase of a strategy execution, logged on each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    StartingServer,
    Discovering,
    GeneratingSuite,
    ExecutingTests,
    StoppingServer,
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,

    /// Maximum test cases in flight; values below 1 are treated as 1
    pub max_concurrent_tests: usize,
}

/// Runs strategies against one project
pub struct TestRunner {
    config: RunnerConfig,
    launcher: Arc<dyn DevServerLauncher>,
    agents: Arc<dyn AgentFactory>,
}

impl TestRunner {
    /// Runner that starts the project's own dev server
    pub fn new(config: RunnerConfig, agents: Arc<dyn AgentFactory>) -> Self {
        Self::with_launcher(config, Arc::new(NpmDevServerLauncher), agents)
    }

    pub fn with_launcher(
        config: RunnerConfig,
        launcher: Arc<dyn DevServerLauncher>,
        agents: Arc<dyn AgentFactory>,
    ) -> Self {
        Self {
            config,
            launcher,
            agents,
        }
    }

    fn max_concurrent(&self) -> usize {
        self.config.max_concurrent_tests.max(1)
    }

    /// Start the server, discover, generate and execute the suite, stop the server.
    ///
    /// The server is stopped on every path once it has started, including
    /// agent errors and panics inside the strategy. A failed start returns
    /// immediately since nothing is running.
    pub async fn execute_strategy(&self, strategy: &dyn Strategy) -> HarnessResult<TestSuiteResults> {
        let started_at = Utc::now();
        let start = Instant::now();

        phase(RunPhase::StartingServer);
        let mut server = self.launcher.start(&self.config.server).await?;

        let run_config = TestRunConfig {
            project_dir: self.config.server.project_dir.clone(),
            base_url: server.url().to_string(),
        };

        let outcome = AssertUnwindSafe(self.run_with_server(strategy, &run_config))
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        phase(RunPhase::StoppingServer);
        if let Err(e) = server.stop().await {
            warn!("Failed to stop dev server: {}", e);
        }

        let (suite_name, results) = match outcome {
            Ok(result) => result?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        let results = TestSuiteResults::new(
            suite_name,
            &self.config.server.project_dir,
            started_at,
            results,
            duration_ms,
        );
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            results.summary.passed, results.summary.failed, results.summary.skipped, duration_ms
        );
        Ok(results)
    }

    async fn run_with_server(
        &self,
        strategy: &dyn Strategy,
        config: &TestRunConfig,
    ) -> Result<(String, Vec<TestResult>), AgentError> {
        phase(RunPhase::Discovering);
        let mut discovery = self.agents.discovery_agent();
        let context = strategy.discover(config, &mut discovery).await?;
        debug!(keys = ?context.keys().collect::<Vec<_>>(), "Discovery finished");

        phase(RunPhase::GeneratingSuite);
        let suite = strategy.generate_suite(config, &context);
        info!("Suite '{}' has {} test case(s)", suite.name, suite.len());

        phase(RunPhase::ExecutingTests);
        let results = self.execute_suite(&suite, &context, config).await?;
        Ok((suite.name, results))
    }

    /// Run every case with at most `max_concurrent_tests` in flight.
    ///
    /// A slot is refilled as soon as any case finishes. Results come back in
    /// suite order. The first protocol error cancels the cases still in flight.
    pub async fn execute_suite(
        &self,
        suite: &Suite,
        context: &TestContext,
        config: &TestRunConfig,
    ) -> Result<Vec<TestResult>, AgentError> {
        info!(
            "Running {} test(s), {} at a time...",
            suite.len(),
            self.max_concurrent()
        );

        let mut slots: Vec<Option<TestResult>> = Vec::with_capacity(suite.len());
        slots.resize_with(suite.len(), || None);

        let cases: Vec<_> = suite
            .cases
            .iter()
            .enumerate()
            .map(|(index, case)| self.run_case(index, case.as_ref(), context, config).boxed())
            .collect();
        let mut completed = futures::stream::iter(cases).buffer_unordered(self.max_concurrent());
        while let Some((index, result)) = completed.try_next().await? {
            slots[index] = Some(result);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn run_case(
        &self,
        index: usize,
        case: &dyn TestCase,
        context: &TestContext,
        config: &TestRunConfig,
    ) -> Result<(usize, TestResult), AgentError> {
        debug!("▶ {}", case.name());
        let mut result = case
            .run(self.agents.as_ref(), context, config)
            .await
            .map_err(|e| {
                error!("✗ {} - agent error: {}", case.name(), e);
                e
            })?;
        if result.name != case.name() {
            result.name = case.name().to_string();
        }
        log_result(&result);
        Ok((index, result))
    }
}

fn phase(next: RunPhase) {
    debug!("Runner phase: {:?}", next);
}

fn log_result(result: &TestResult) {
    match result.status() {
        TestStatus::Passed => info!("✓ {}", result.name),
        TestStatus::Failed => error!("✗ {} - {}", result.name, result.outcome.detail()),
        TestStatus::Skipped => warn!("- {} (skipped: {})", result.name, result.outcome.detail()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarnessError, ServerError};
    use crate::server::RunningServer;
    use crate::suites::fixtures::{answer, factory, todo_overview};
    use crate::suites::SmokeStrategy;
    use appbench_agent::scripted::ScriptedBackend;
    use appbench_agent::{AgentMessage, DriverAgent, ResultSubtype};
    use appbench_common::ServerSettings;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counts {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    struct FakeLauncher {
        counts: Arc<Counts>,
        fail: bool,
        stop_delay: Duration,
    }

    struct FakeServer {
        counts: Arc<Counts>,
        stop_delay: Duration,
    }

    #[async_trait]
    impl RunningServer for FakeServer {
        fn url(&self) -> &str {
            "http://127.0.0.1:3999"
        }

        async fn stop(&mut self) -> Result<(), ServerError> {
            tokio::time::sleep(self.stop_delay).await;
            self.counts.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl DevServerLauncher for FakeLauncher {
        async fn start(&self, _config: &ServerConfig) -> Result<Box<dyn RunningServer>, ServerError> {
            self.counts.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServerError::PortInUse {
                    port: 3999,
                    next_available_port: Some(4000),
                });
            }
            Ok(Box::new(FakeServer {
                counts: self.counts.clone(),
                stop_delay: self.stop_delay,
            }))
        }
    }

    fn runner(backend: Arc<ScriptedBackend>, counts: Arc<Counts>, max: usize) -> TestRunner {
        runner_with(
            backend,
            max,
            FakeLauncher {
                counts,
                fail: false,
                stop_delay: Duration::ZERO,
            },
        )
    }

    fn runner_with(backend: Arc<ScriptedBackend>, max: usize, launcher: FakeLauncher) -> TestRunner {
        let config = RunnerConfig {
            server: ServerConfig::new("/tmp/attempt", &ServerSettings::default()),
            max_concurrent_tests: max,
        };
        TestRunner::with_launcher(config, Arc::new(launcher), Arc::new(factory(backend)))
    }

    /// Case that sleeps and records peak concurrency
    struct Timed {
        name: String,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TestCase for Timed {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(
            &self,
            _agents: &dyn AgentFactory,
            _context: &TestContext,
            _config: &TestRunConfig,
        ) -> Result<TestResult, AgentError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(TestResult::passed(&self.name, "slept"))
        }
    }

    /// Case that records when it started relative to `epoch`
    struct Paced {
        name: String,
        delay: Duration,
        epoch: Instant,
        starts: Arc<Mutex<Vec<(String, Duration)>>>,
    }

    #[async_trait]
    impl TestCase for Paced {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(
            &self,
            _agents: &dyn AgentFactory,
            _context: &TestContext,
            _config: &TestRunConfig,
        ) -> Result<TestResult, AgentError> {
            self.starts.lock().push((self.name.clone(), self.epoch.elapsed()));
            tokio::time::sleep(self.delay).await;
            Ok(TestResult::passed(&self.name, "slept"))
        }
    }

    /// Strategy with a fixed suite and a no-op discovery
    struct Fixed {
        cases: Mutex<Option<Suite>>,
        panic_in_generate: bool,
    }

    #[async_trait]
    impl Strategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn description(&self) -> &str {
            "fixed suite"
        }

        async fn discover(
            &self,
            _config: &TestRunConfig,
            _agent: &mut DriverAgent,
        ) -> Result<TestContext, AgentError> {
            Ok(TestContext::new())
        }

        fn generate_suite(&self, _config: &TestRunConfig, _context: &TestContext) -> Suite {
            if self.panic_in_generate {
                panic!("suite generation blew up");
            }
            self.cases.lock().take().unwrap_or_else(|| Suite::new("fixed"))
        }
    }

    #[tokio::test]
    async fn test_concurrency_bound_and_order() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut suite = Suite::new("fixed");
        for i in 0..10u64 {
            suite.push(Box::new(Timed {
                name: format!("case-{}", i),
                delay: Duration::from_millis(5 + (i * 37) % 11 * 4),
                in_flight: in_flight.clone(),
                peak: peak.clone(),
            }));
        }
        let strategy = Fixed {
            cases: Mutex::new(Some(suite)),
            panic_in_generate: false,
        };
        let counts = Arc::new(Counts::default());
        let runner = runner(Arc::new(ScriptedBackend::new()), counts.clone(), 2);

        let results = runner.execute_strategy(&strategy).await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let names: Vec<_> = results.results.iter().map(|r| r.name.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("case-{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(results.summary.total, 10);
        assert_eq!(results.summary.passed, 10);
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_smoke_run_end_to_end() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_answer("disc", &answer(&todo_overview()));
        backend.push_answer("t1", &answer(&TestResult::passed("loads", "opened /")));
        backend.push_answer("t2", &answer(&TestResult::passed("add", "added milk")));
        backend.push_answer(
            "t3",
            &answer(&TestResult::failed("complete", "checkbox did nothing", "clicked it")),
        );
        let counts = Arc::new(Counts::default());
        let runner = runner(backend.clone(), counts.clone(), 1);

        let results = runner.execute_strategy(&SmokeStrategy::new()).await.unwrap();

        assert_eq!(results.suite_name, "smoke");
        assert_eq!(results.summary.total, 3);
        assert_eq!(results.summary.passed, 2);
        assert_eq!(results.summary.failed, 1);
        assert!(!results.summary.all_passed());
        assert_eq!(results.results[2].name, "Complete todo");
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
        assert!(backend.calls()[1].prompt.contains("http://127.0.0.1:3999"));
    }

    #[tokio::test]
    async fn test_discovery_error_still_stops_server() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_script(vec![
            AgentMessage::system_init("disc"),
            AgentMessage::failure("disc", ResultSubtype::ErrorMaxTurns),
        ]);
        let counts = Arc::new(Counts::default());
        let runner = runner(backend, counts.clone(), 4);

        let err = runner.execute_strategy(&SmokeStrategy::new()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Agent(AgentError::MaxTurnsExceeded { .. })));
        assert_eq!(err.session_id(), Some("disc"));
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_case_protocol_error_aborts_run() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_answer("disc", &answer(&todo_overview()));
        backend.push_answer("t1", &answer(&TestResult::passed("loads", "opened /")));
        backend.push_answer("t2", "no structured block here");
        backend.push_answer("t3", &answer(&TestResult::passed("complete", "clicked")));
        let counts = Arc::new(Counts::default());
        let runner = runner(backend, counts.clone(), 1);

        let err = runner.execute_strategy(&SmokeStrategy::new()).await.unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Agent(AgentError::ResponseFormatInvalid { .. })
        ));
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_in_generate_suite_still_stops_server() {
        let counts = Arc::new(Counts::default());
        let runner = runner(Arc::new(ScriptedBackend::new()), counts.clone(), 4);
        let strategy = Fixed {
            cases: Mutex::new(None),
            panic_in_generate: true,
        };

        let joined = tokio::spawn(async move { runner.execute_strategy(&strategy).await }).await;
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_start_skips_teardown() {
        let counts = Arc::new(Counts::default());
        let runner = runner_with(
            Arc::new(ScriptedBackend::new()),
            4,
            FakeLauncher {
                counts: counts.clone(),
                fail: true,
                stop_delay: Duration::ZERO,
            },
        );

        let err = runner.execute_strategy(&SmokeStrategy::new()).await.unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Server(ServerError::PortInUse { port: 3999, .. })
        ));
        assert_eq!(counts.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counts.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_suite() {
        let counts = Arc::new(Counts::default());
        let runner = runner(Arc::new(ScriptedBackend::new()), counts.clone(), 4);
        let strategy = Fixed {
            cases: Mutex::new(None),
            panic_in_generate: false,
        };

        let results = runner.execute_strategy(&strategy).await.unwrap();
        assert_eq!(results.summary.total, 0);
        assert!(results.summary.all_passed());
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_freed_slot_reused_while_head_case_runs() {
        let epoch = Instant::now();
        let starts = Arc::new(Mutex::new(Vec::new()));
        let mut suite = Suite::new("fixed");
        for (name, delay) in [("slow", 400), ("quick-1", 10), ("quick-2", 10)] {
            suite.push(Box::new(Paced {
                name: name.to_string(),
                delay: Duration::from_millis(delay),
                epoch,
                starts: starts.clone(),
            }));
        }
        let strategy = Fixed {
            cases: Mutex::new(Some(suite)),
            panic_in_generate: false,
        };
        let runner = runner(Arc::new(ScriptedBackend::new()), Arc::new(Counts::default()), 2);

        let results = runner.execute_strategy(&strategy).await.unwrap();

        let names: Vec<_> = results.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["slow", "quick-1", "quick-2"]);
        let starts = starts.lock();
        let (name, started) = &starts[2];
        assert_eq!(name, "quick-2");
        assert!(
            *started < Duration::from_millis(200),
            "quick-2 waited for the slow case: started at {:?}",
            started
        );
    }

    #[tokio::test]
    async fn test_duration_excludes_server_teardown() {
        let counts = Arc::new(Counts::default());
        let runner = runner_with(
            Arc::new(ScriptedBackend::new()),
            4,
            FakeLauncher {
                counts: counts.clone(),
                fail: false,
                stop_delay: Duration::from_millis(600),
            },
        );
        let strategy = Fixed {
            cases: Mutex::new(None),
            panic_in_generate: false,
        };

        let results = runner.execute_strategy(&strategy).await.unwrap();
        assert_eq!(counts.stops.load(Ordering::SeqCst), 1);
        assert!(
            results.summary.duration_ms < 300,
            "duration included teardown: {} ms",
            results.summary.duration_ms
        );
    }
}
