//! Result persistence and the end-of-run summary

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::path::{Path, PathBuf};
use tracing::info;

use appbench_common::{TestStatus, TestSuiteResults};

use crate::error::HarnessResult;

pub const RESULTS_FILE: &str = "test-results.json";

/// Write results as pretty JSON to `<dir>/test-results.json`
pub fn write_results(dir: &Path, results: &TestSuiteResults) -> HarnessResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Read a results file written by [`write_results`]
pub fn read_results(path: &Path) -> HarnessResult<TestSuiteResults> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn status_marker(status: TestStatus) -> String {
    match status {
        TestStatus::Passed => "PASS".green().bold().to_string(),
        TestStatus::Failed => "FAIL".red().bold().to_string(),
        TestStatus::Skipped => "SKIP".yellow().to_string(),
    }
}

/// One row per case followed by the counts
pub fn render_summary(results: &TestSuiteResults) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Status", "Test", "Detail"]);

    for result in &results.results {
        table.add_row(vec![
            status_marker(result.status()),
            result.name.clone(),
            result.outcome.detail().to_string(),
        ]);
    }

    let summary = &results.summary;
    format!(
        "Suite: {}\n{}\n{} total, {} passed, {} failed, {} skipped in {:.1}s",
        results.suite_name,
        table,
        summary.total,
        summary.passed,
        summary.failed,
        summary.skipped,
        summary.duration_ms as f64 / 1000.0
    )
}
