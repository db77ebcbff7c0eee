//! Core result types for appbench

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one test case, as reported by the test agent.
///
/// This is also the wire shape the agent must produce inside its
/// `<response>` block, so field names follow the protocol (`howTested`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed {
        #[serde(rename = "howTested")]
        how_tested: String,
    },
    Failed {
        reason: String,
        #[serde(rename = "howTested")]
        how_tested: String,
    },
    Skipped {
        reason: String,
    },
}

impl TestOutcome {
    pub fn status(&self) -> TestStatus {
        match self {
            TestOutcome::Passed { .. } => TestStatus::Passed,
            TestOutcome::Failed { .. } => TestStatus::Failed,
            TestOutcome::Skipped { .. } => TestStatus::Skipped,
        }
    }

    /// Short human-readable detail: the reason for failures and skips,
    /// otherwise how the behavior was checked.
    pub fn detail(&self) -> &str {
        match self {
            TestOutcome::Passed { how_tested } => how_tested,
            TestOutcome::Failed { reason, .. } => reason,
            TestOutcome::Skipped { reason } => reason,
        }
    }
}

/// Status without payload, for counting and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of running a single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestResult {
    pub name: String,
    pub outcome: TestOutcome,
}

impl TestResult {
    pub fn passed(name: impl Into<String>, how_tested: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Passed {
                how_tested: how_tested.into(),
            },
        }
    }

    pub fn failed(
        name: impl Into<String>,
        reason: impl Into<String>,
        how_tested: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Failed {
                reason: reason.into(),
                how_tested: how_tested.into(),
            },
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn status(&self) -> TestStatus {
        self.outcome.status()
    }
}

/// Count-based summary of a suite execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl Summary {
    /// Count outcomes. `total` always equals `results.len()`.
    pub fn from_results(results: &[TestResult], duration_ms: u64) -> Self {
        let mut summary = Summary {
            total: results.len(),
            duration_ms,
            ..Default::default()
        };
        for result in results {
            match result.status() {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Aggregated results of one suite execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteResults {
    pub suite_name: String,
    pub project_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub summary: Summary,
    pub results: Vec<TestResult>,
}

impl TestSuiteResults {
    /// Build the aggregate; the summary is derived from `results` so the
    /// count invariant holds by construction.
    pub fn new(
        suite_name: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        started_at: DateTime<Utc>,
        results: Vec<TestResult>,
        duration_ms: u64,
    ) -> Self {
        let summary = Summary::from_results(&results, duration_ms);
        Self {
            suite_name: suite_name.into(),
            project_dir: project_dir.into(),
            started_at,
            summary,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_outcome_wire_shape() {
        let result = TestResult::failed("add todo", "item not rendered", "typed and pressed enter");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "add todo",
                "outcome": {
                    "status": "failed",
                    "reason": "item not rendered",
                    "howTested": "typed and pressed enter"
                }
            })
        );
    }

    #[test]
    fn test_skipped_has_no_how_tested() {
        let raw = r#"{"name":"x","outcome":{"status":"skipped","reason":"no login page"}}"#;
        let result: TestResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.status(), TestStatus::Skipped);
        assert_eq!(result.outcome.detail(), "no login page");
    }

    #[test]
    fn test_unknown_status_rejected() {
        let raw = r#"{"name":"x","outcome":{"status":"maybe","howTested":"manual"}}"#;
        assert!(serde_json::from_str::<TestResult>(raw).is_err());
    }

    #[test_case(0, 0, 0 ; "empty")]
    #[test_case(3, 0, 0 ; "all passed")]
    #[test_case(2, 1, 4 ; "mixed")]
    fn test_summary_counts_sum_to_total(passed: usize, failed: usize, skipped: usize) {
        let mut results = Vec::new();
        for i in 0..passed {
            results.push(TestResult::passed(format!("p{i}"), "ok"));
        }
        for i in 0..failed {
            results.push(TestResult::failed(format!("f{i}"), "broken", "clicked"));
        }
        for i in 0..skipped {
            results.push(TestResult::skipped(format!("s{i}"), "n/a"));
        }

        let suite = TestSuiteResults::new("suite", "/tmp/app", Utc::now(), results, 12);
        let s = suite.summary;
        assert_eq!(s.total, suite.results.len());
        assert_eq!(s.passed + s.failed + s.skipped, s.total);
        assert_eq!((s.passed, s.failed, s.skipped), (passed, failed, skipped));
        assert_eq!(s.all_passed(), failed == 0);
    }
}
