//! Benchmark attempts: attempt directories, code generation by the coding
//! agent, dependency install and the functionality test pass

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use appbench_agent::{AgentBackend, AgentConfig, AgentOverrides, DefaultAgentFactory};
use appbench_common::{HarnessConfig, TestSuiteResults};

use crate::error::{HarnessError, HarnessResult};
use crate::report::write_results;
use crate::runner::{RunnerConfig, TestRunner};
use crate::server::{DevServerLauncher, NpmDevServerLauncher, ServerConfig};
use crate::strategy::Strategy;

/// Copy of the prompt kept next to the generated code
pub const PROMPT_FILE: &str = "PROMPT.md";

/// Never copied into an attempt
const SKIP_DIRS: &[&str] = &["node_modules", ".git"];

const MAX_SLUG_LEN: usize = 40;

/// Lowercase, dash-separated form of `label` for directory names
pub fn slugify(label: &str) -> String {
    let mut slug = String::new();
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "attempt".to_string()
    } else {
        slug.to_string()
    }
}

/// `<timestamp>-<slug>`, sortable by creation time
pub fn attempt_dir_name(label: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", at.format("%Y%m%d-%H%M%S"), slugify(label))
}

/// Create a fresh, empty attempt directory under `output_dir`
pub fn create_attempt_dir(output_dir: &Path, label: &str) -> HarnessResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let dir = output_dir.join(attempt_dir_name(label, Utc::now()));
    std::fs::create_dir(&dir)?;
    info!("Created attempt directory {}", dir.display());
    Ok(dir)
}

/// An attempt must be an existing directory
pub fn validate_attempt(dir: &Path) -> HarnessResult<()> {
    if !dir.exists() {
        return Err(HarnessError::InvalidAttemptPath {
            path: dir.to_path_buf(),
            reason: "does not exist".to_string(),
        });
    }
    if !dir.is_dir() {
        return Err(HarnessError::InvalidAttemptPath {
            path: dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(())
}

/// Copy a project tree, leaving out installed dependencies and VCS metadata.
///
/// Returns the number of files copied. Symlinks are skipped.
pub fn copy_project(source: &Path, dest: &Path) -> HarnessResult<usize> {
    validate_attempt(source)?;
    std::fs::create_dir_all(dest)?;

    let mut copied = 0;
    let walker = walkdir::WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIP_DIRS.iter().any(|skip| e.file_name() == *skip))
        });

    for entry in walker {
        let entry = entry.map_err(|e| HarnessError::Io(e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            debug!("Skipping {}", entry.path().display());
        }
    }

    info!(
        "Copied {} file(s) from {} to {}",
        copied,
        source.display(),
        dest.display()
    );
    Ok(copied)
}

/// Run the install command in `project_dir`
pub async fn install_dependencies(project_dir: &Path, command: &[String]) -> HarnessResult<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| HarnessError::Install("install command is empty".to_string()))?;

    info!("Installing dependencies: {}", command.join(" "));
    let output = Command::new(program)
        .args(args)
        .current_dir(project_dir)
        .output()
        .await
        .map_err(|e| HarnessError::Install(format!("{}: {}", program, e)))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!(target: "install", "{}", line);
    }
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(HarnessError::Install(format!(
            "{} exited with {}\n{}",
            command.join(" "),
            output.status,
            tail.join("\n")
        )));
    }
    Ok(())
}

/// Finished attempt: where it lives and how it scored
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub dir: PathBuf,
    pub results: TestSuiteResults,
    pub results_path: PathBuf,
}

/// Drives attempts end to end with one configuration and agent backend
pub struct Benchmark {
    config: HarnessConfig,
    backend: Arc<dyn AgentBackend>,
    launcher: Arc<dyn DevServerLauncher>,
}

impl Benchmark {
    pub fn new(config: HarnessConfig, backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            config,
            backend,
            launcher: Arc::new(NpmDevServerLauncher),
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn DevServerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn agents(&self, project_dir: &Path) -> DefaultAgentFactory {
        DefaultAgentFactory::new(
            self.backend.clone(),
            project_dir,
            AgentConfig::from(&self.config.agent),
        )
    }

    /// Have the coding agent build (or change) the app in `attempt_dir`.
    ///
    /// Returns the agent's closing message.
    pub async fn generate(&self, attempt_dir: &Path, prompt: &str) -> HarnessResult<String> {
        validate_attempt(attempt_dir)?;
        std::fs::write(attempt_dir.join(PROMPT_FILE), prompt)?;

        let mut agent = self.agents(attempt_dir).coding_agent();
        info!("Generating app in {}", attempt_dir.display());
        let summary = agent.ask(prompt, &AgentOverrides::none()).await?;
        info!(
            "Coding agent finished (session {})",
            agent.session_id().unwrap_or("unknown")
        );
        Ok(summary)
    }

    /// Run `strategy` against an attempt and write its results into it
    pub async fn test(&self, attempt_dir: &Path, strategy: &dyn Strategy) -> HarnessResult<AttemptOutcome> {
        validate_attempt(attempt_dir)?;

        let runner = TestRunner::with_launcher(
            RunnerConfig {
                server: ServerConfig::new(attempt_dir, &self.config.server),
                max_concurrent_tests: self.config.runner.max_concurrent_tests,
            },
            self.launcher.clone(),
            Arc::new(self.agents(attempt_dir)),
        );

        info!("Testing {} with strategy '{}'", attempt_dir.display(), strategy.name());
        let results = runner.execute_strategy(strategy).await?;
        let results_path = write_results(attempt_dir, &results)?;
        Ok(AttemptOutcome {
            dir: attempt_dir.to_path_buf(),
            results,
            results_path,
        })
    }

    /// New attempt from scratch: generate, install, test
    pub async fn run(&self, prompt: &str, label: &str, strategy: &dyn Strategy) -> HarnessResult<AttemptOutcome> {
        let dir = create_attempt_dir(&self.config.output.dir, label)?;
        self.generate_install_test(&dir, prompt, strategy).await
    }

    /// New attempt seeded from an existing project
    pub async fn run_existing(
        &self,
        source: &Path,
        prompt: &str,
        strategy: &dyn Strategy,
    ) -> HarnessResult<AttemptOutcome> {
        validate_attempt(source)?;
        let label = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "existing".to_string());
        let dir = create_attempt_dir(&self.config.output.dir, &label)?;
        copy_project(source, &dir)?;
        self.generate_install_test(&dir, prompt, strategy).await
    }

    async fn generate_install_test(
        &self,
        dir: &Path,
        prompt: &str,
        strategy: &dyn Strategy,
    ) -> HarnessResult<AttemptOutcome> {
        let summary = self.generate(dir, prompt).await?;
        if summary.trim().is_empty() {
            warn!("Coding agent finished without a summary");
        }
        install_dependencies(dir, &self.config.server.install_command).await?;
        self.test(dir, strategy).await
    }
}
