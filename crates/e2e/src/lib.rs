//! appbench functionality test harness
//!
//! Starts a generated app's dev server, lets a strategy discover the app
//! and plan a suite, then runs each test case through a browser-driving
//! agent with bounded concurrency.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TestRunner::execute_strategy                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  DevServerLauncher::start() -> RunningServer                │
//! │    ├── preflight: port free, manifest, dependencies         │
//! │    └── readiness: GET / (or /index.html) with backoff       │
//! │  Strategy                                                   │
//! │    ├── discover(config, discovery agent) -> TestContext     │
//! │    └── generate_suite(config, context) -> Suite             │
//! │  Suite execution (buffered, N in flight, suite order)       │
//! │    └── TestCase::run(agents, context, config) -> TestResult │
//! │  RunningServer::stop()   (every path after a start)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Benchmark: attempt dir -> coding agent -> install -> test  │
//! │  report: test-results.json + summary table                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod benchmark;
pub mod error;
pub mod report;
pub mod runner;
pub mod server;
pub mod strategy;
pub mod suites;

pub use benchmark::{AttemptOutcome, Benchmark};
pub use error::{HarnessError, HarnessResult, ServerError};
pub use report::{read_results, render_summary, write_results, RESULTS_FILE};
pub use runner::{RunnerConfig, TestRunner};
pub use server::{DevServer, DevServerLauncher, NpmDevServerLauncher, RunningServer, ServerConfig};
pub use strategy::{Strategy, StrategyRegistry, Suite, TestCase, TestRunConfig};
pub use suites::{AgentTestCase, Catalog, CatalogFilter, CatalogStrategy, SmokeStrategy};
