//! Claude Code CLI backend
//!
//! Runs `claude -p` with stream-json output, feeds the prompt on stdin and
//! turns each stdout line into an [`AgentMessage`].

use async_trait::async_trait;
use futures::StreamExt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::backend::{AgentBackend, MessageStream, QueryOptions};
use crate::error::AgentError;
use crate::message::AgentMessage;

/// Agent backend that shells out to the Claude Code CLI
#[derive(Debug, Clone)]
pub struct ClaudeCliBackend {
    binary: String,
}

impl Default for ClaudeCliBackend {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl ClaudeCliBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// CLI arguments for one query
    pub fn build_args(&self, options: &QueryOptions) -> Result<Vec<String>, AgentError> {
        let mut args: Vec<String> = [
            "-p",
            "-",
            "--output-format",
            "stream-json",
            "--verbose",
            "--dangerously-skip-permissions",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(max_turns) = options.max_turns {
            args.push("--max-turns".to_string());
            args.push(max_turns.to_string());
        }
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if !options.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(options.allowed_tools.join(","));
        }
        if !options.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.push(options.disallowed_tools.join(","));
        }
        if !options.mcp_servers.is_empty() {
            let config = serde_json::json!({ "mcpServers": &options.mcp_servers });
            args.push("--mcp-config".to_string());
            args.push(
                serde_json::to_string(&config)
                    .map_err(|e| AgentError::Backend(format!("encode MCP config: {}", e)))?,
            );
        }
        if let Some(text) = &options.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(text.clone());
        }
        if let Some(session) = &options.resume {
            args.push("--resume".to_string());
            args.push(session.clone());
        }

        Ok(args)
    }
}

#[async_trait]
impl AgentBackend for ClaudeCliBackend {
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<MessageStream, AgentError> {
        let args = self.build_args(options)?;
        debug!(
            "Spawning {} in {} (resume: {:?})",
            self.binary,
            options.cwd.display(),
            options.resume
        );

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(&options.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Backend(format!("failed to spawn {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "agent_cli", "{}", line);
                }
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Backend("agent stdout was not captured".to_string()))?;

        let state = StreamState {
            lines: BufReader::new(stdout).lines(),
            child,
            done: false,
        };
        Ok(futures::stream::unfold(state, next_message).boxed())
    }
}

struct StreamState {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    done: bool,
}

async fn next_message(
    mut state: StreamState,
) -> Option<(Result<AgentMessage, AgentError>, StreamState)> {
    if state.done {
        return None;
    }
    loop {
        match state.lines.next_line().await {
            Ok(Some(line)) => match parse_stream_line(&line) {
                Some(Ok(message)) => return Some((Ok(message), state)),
                Some(Err(e)) => {
                    warn!("Skipping malformed agent event: {}", e);
                }
                None => {}
            },
            Ok(None) => {
                match state.child.wait().await {
                    Ok(status) if !status.success() => {
                        warn!("Agent CLI exited with {}", status);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to reap agent CLI: {}", e),
                }
                return None;
            }
            Err(e) => {
                state.done = true;
                return Some((
                    Err(AgentError::Backend(format!("reading agent output: {}", e))),
                    state,
                ));
            }
        }
    }
}

/// Parse one stdout line. `None` for blank or non-JSON lines, which the
/// CLI prints in verbose mode alongside the JSON events.
pub fn parse_stream_line(line: &str) -> Option<Result<AgentMessage, serde_json::Error>> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}
