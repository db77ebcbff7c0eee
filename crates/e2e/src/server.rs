//! Dev server management: pre-flight checks, spawning, readiness polling
//! and process-group teardown

use async_trait::async_trait;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use appbench_common::ServerSettings;

use crate::error::ServerError;

/// Delays before successive readiness probes; later probes use the cap
const POLL_BACKOFF_MS: &[u64] = &[0, 50, 100, 200, 400, 800];
const POLL_BACKOFF_CAP: Duration = Duration::from_millis(1000);

/// Per-request timeout for a single readiness probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one dev server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Ready,
    Stopping,
    Stopped,
    Failed,
}

/// Configuration for spawning a dev server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Project the server is started in
    pub project_dir: PathBuf,

    /// Host the app is reached on
    pub host: String,

    /// Port the app must listen on
    pub port: u16,

    /// Start command, program first; `--port <n>` is appended
    pub start_command: Vec<String>,

    /// File that must exist in `project_dir`
    pub manifest_file: String,

    /// Directory that must exist in `project_dir`
    pub dependencies_dir: String,

    pub startup_timeout: Duration,
    pub stop_grace: Duration,
}

impl ServerConfig {
    pub fn new(project_dir: impl Into<PathBuf>, settings: &ServerSettings) -> Self {
        Self {
            project_dir: project_dir.into(),
            host: settings.host.clone(),
            port: settings.port,
            start_command: settings.start_command.clone(),
            manifest_file: settings.manifest_file.clone(),
            dependencies_dir: settings.dependencies_dir.clone(),
            startup_timeout: settings.startup_timeout(),
            stop_grace: settings.stop_grace(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// True if nothing is listening on `host:port`
pub fn port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

/// First free port at or above `start`
pub fn find_available_port(host: &str, start: u16) -> Option<u16> {
    (start..=u16::MAX).find(|port| port_available(host, *port))
}

/// Checks that must pass before anything is spawned
pub fn preflight(config: &ServerConfig) -> Result<(), ServerError> {
    if !port_available(&config.host, config.port) {
        let next_available_port = config
            .port
            .checked_add(1)
            .and_then(|start| find_available_port(&config.host, start));
        return Err(ServerError::PortInUse {
            port: config.port,
            next_available_port,
        });
    }

    if !config.project_dir.join(&config.manifest_file).is_file() {
        return Err(ServerError::ProjectNotFound {
            path: config.project_dir.clone(),
            manifest: config.manifest_file.clone(),
        });
    }

    let deps = config.project_dir.join(&config.dependencies_dir);
    if !deps.is_dir() {
        return Err(ServerError::DependenciesNotInstalled { path: deps });
    }

    Ok(())
}

fn backoff_delay(attempt: usize) -> Duration {
    POLL_BACKOFF_MS
        .get(attempt)
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(POLL_BACKOFF_CAP)
}

/// One readiness probe: `/` must answer 2xx, or `/index.html` must when `/` is a 404
async fn probe(client: &reqwest::Client, base_url: &str) -> Result<(), String> {
    let root = client
        .get(format!("{}/", base_url))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if root.status().is_success() {
        return Ok(());
    }
    if root.status() != reqwest::StatusCode::NOT_FOUND {
        return Err(format!("GET / returned {}", root.status()));
    }

    let index = client
        .get(format!("{}/index.html", base_url))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if index.status().is_success() {
        Ok(())
    } else {
        Err(format!("GET / returned 404 and GET /index.html returned {}", index.status()))
    }
}

/// Poll `base_url` until it serves a page or `startup_timeout` runs out
pub async fn wait_until_ready(base_url: &str, startup_timeout: Duration) -> Result<(), ServerError> {
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .no_proxy()
        .build()?;
    let deadline = Instant::now() + startup_timeout;
    let mut last_error = None;
    let mut attempt = 0;

    loop {
        let delay = backoff_delay(attempt);
        if Instant::now() + delay > deadline {
            break;
        }
        sleep(delay).await;

        match probe(&client, base_url).await {
            Ok(()) => {
                debug!(attempt, "Readiness probe succeeded");
                return Ok(());
            }
            Err(e) => {
                if attempt == 0 {
                    info!("Waiting for dev server at {}...", base_url);
                }
                debug!(attempt, "Readiness probe failed: {}", e);
                last_error = Some(e);
            }
        }
        attempt += 1;
    }

    Err(ServerError::StartupTimeout {
        url: base_url.to_string(),
        timeout: startup_timeout,
        last_error,
    })
}

async fn forward_lines<R>(reader: R, stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if stderr {
            error!(target: "dev_server", "{}", line);
        } else {
            info!(target: "dev_server", "{}", line);
        }
    }
}

/// Signal every process in the server's group
#[cfg(unix)]
fn signal_group(pgid: Option<i32>, force: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid else { return };
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Err(e) = killpg(Pid::from_raw(pgid), signal) {
        // ESRCH: the group is already gone
        debug!(pgid, "killpg({:?}) failed: {}", signal, e);
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: Option<i32>, _force: bool) {}

/// A dev server started by this process
pub struct DevServer {
    child: Option<Child>,
    pgid: Option<i32>,
    base_url: String,
    stop_grace: Duration,
    state: ServerState,
    output_tasks: Vec<JoinHandle<()>>,
}

impl DevServer {
    /// Run pre-flight checks, spawn the start command and wait for readiness.
    ///
    /// On readiness failure the spawned processes are torn down before the
    /// error is returned.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        preflight(config)?;

        let (program, args) = config
            .start_command
            .split_first()
            .ok_or_else(|| ServerError::Spawn("start command is empty".to_string()))?;

        info!(
            "Starting dev server in {} on port {}: {}",
            config.project_dir.display(),
            config.port,
            config.start_command.join(" ")
        );

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--port")
            .arg(config.port.to_string())
            .env("PORT", config.port.to_string())
            .current_dir(&config.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| ServerError::Spawn(format!("{}: {}", program, e)))?;

        let mut output_tasks = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            output_tasks.push(tokio::spawn(forward_lines(stdout, false)));
        }
        if let Some(stderr) = child.stderr.take() {
            output_tasks.push(tokio::spawn(forward_lines(stderr, true)));
        }

        let mut server = DevServer {
            // With process_group(0) the group id is the child's pid
            pgid: child.id().map(|id| id as i32),
            child: Some(child),
            base_url: config.base_url(),
            stop_grace: config.stop_grace,
            state: ServerState::Starting,
            output_tasks,
        };

        match server.await_ready(config.startup_timeout).await {
            Ok(()) => {
                server.transition(ServerState::Ready);
                info!("Dev server ready at {}", server.base_url);
                Ok(server)
            }
            Err(e) => {
                if let Err(stop_err) = server.stop().await {
                    warn!("Failed to stop dev server after startup failure: {}", stop_err);
                }
                server.transition(ServerState::Failed);
                Err(e)
            }
        }
    }

    async fn await_ready(&mut self, startup_timeout: Duration) -> Result<(), ServerError> {
        let base_url = self.base_url.clone();
        let Some(child) = self.child.as_mut() else {
            return Err(ServerError::ExitedEarly {
                status: "not running".to_string(),
            });
        };

        tokio::select! {
            ready = wait_until_ready(&base_url, startup_timeout) => ready,
            status = child.wait() => {
                let status = match status {
                    Ok(status) => status.to_string(),
                    Err(e) => e.to_string(),
                };
                Err(ServerError::ExitedEarly { status })
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    fn transition(&mut self, next: ServerState) {
        debug!("Dev server state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// SIGTERM the process group, wait out the grace period, then SIGKILL.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.transition(ServerState::Stopping);
        info!("Stopping dev server (pgid: {:?})", self.pgid);

        signal_group(self.pgid, false);
        #[cfg(not(unix))]
        let _ = child.start_kill();

        let result = match timeout(self.stop_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Dev server exited: {}", status);
                Ok(())
            }
            Ok(Err(e)) => Err(ServerError::Io(e)),
            Err(_) => {
                warn!(
                    "Dev server still running {}s after SIGTERM, sending SIGKILL",
                    self.stop_grace.as_secs()
                );
                signal_group(self.pgid, true);
                let _ = child.start_kill();
                child.wait().await.map(|_| ()).map_err(ServerError::Io)
            }
        };

        for task in self.output_tasks.drain(..) {
            task.abort();
        }
        self.transition(ServerState::Stopped);
        result
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if self.child.is_some() {
            warn!("Dev server dropped without stop(), killing process group");
            signal_group(self.pgid, true);
        }
    }
}

/// A started server the runner can tear down
#[async_trait]
pub trait RunningServer: Send {
    /// URL handed to agents
    fn url(&self) -> &str;

    async fn stop(&mut self) -> Result<(), ServerError>;
}

#[async_trait]
impl RunningServer for DevServer {
    fn url(&self) -> &str {
        DevServer::base_url(self)
    }

    async fn stop(&mut self) -> Result<(), ServerError> {
        DevServer::stop(self).await
    }
}

/// Starts dev servers for the runner
#[async_trait]
pub trait DevServerLauncher: Send + Sync {
    async fn start(&self, config: &ServerConfig) -> Result<Box<dyn RunningServer>, ServerError>;
}

/// Launches the project's own start command (`npm run start` by default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NpmDevServerLauncher;

#[async_trait]
impl DevServerLauncher for NpmDevServerLauncher {
    async fn start(&self, config: &ServerConfig) -> Result<Box<dyn RunningServer>, ServerError> {
        let server = DevServer::start(config).await?;
        Ok(Box::new(server))
    }
}
