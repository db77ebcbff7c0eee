//! Dev server pre-flight and readiness against real sockets

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use appbench_common::ServerSettings;
use appbench_e2e::server::{preflight, wait_until_ready};
use appbench_e2e::{DevServerLauncher, NpmDevServerLauncher, ServerConfig, ServerError};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// `/` answers 404 for the first `failures` hits, then 200
async fn flaky_root(State((hits, failures)): State<(Arc<AtomicUsize>, usize)>) -> StatusCode {
    if hits.fetch_add(1, Ordering::SeqCst) < failures {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

fn project(with_deps: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), r#"{"scripts":{"start":"vite"}}"#).unwrap();
    if with_deps {
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
    }
    dir
}

#[tokio::test]
async fn ready_after_three_not_found_responses() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/", get(flaky_root))
        .with_state((hits.clone(), 3));
    let addr = serve(app).await;

    wait_until_ready(&format!("http://{}", addr), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn index_html_counts_when_root_is_missing() {
    let app = Router::new().route("/index.html", get(|| async { "<html></html>" }));
    let addr = serve(app).await;

    wait_until_ready(&format!("http://{}", addr), Duration::from_secs(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn timeout_reports_last_error() {
    let app = Router::new();
    let addr = serve(app).await;

    let err = wait_until_ready(&format!("http://{}", addr), Duration::from_secs(1))
        .await
        .unwrap_err();
    match err {
        ServerError::StartupTimeout { last_error, timeout, .. } => {
            assert_eq!(timeout, Duration::from_secs(1));
            assert!(last_error.unwrap().contains("404"));
        }
        other => panic!("expected StartupTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn server_error_is_not_ready() {
    let app = Router::new().route("/", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let addr = serve(app).await;

    let err = wait_until_ready(&format!("http://{}", addr), Duration::from_millis(400))
        .await
        .unwrap_err();
    match err {
        ServerError::StartupTimeout { last_error, .. } => {
            assert_eq!(last_error.as_deref(), Some("GET / returned 500 Internal Server Error"));
        }
        other => panic!("expected StartupTimeout, got {:?}", other),
    }
}

#[test]
fn occupied_port_suggests_next_free_one() {
    // Whoever holds 4000, it is busy for the duration of the test
    let _held = TcpListener::bind("127.0.0.1:4000").ok();
    let dir = project(true);
    let mut config = ServerConfig::new(dir.path(), &ServerSettings::default());
    config.port = 4000;

    match preflight(&config) {
        Err(ServerError::PortInUse {
            port,
            next_available_port,
        }) => {
            assert_eq!(port, 4000);
            let next = next_available_port.unwrap();
            assert!(next > 4000);
            assert!(TcpListener::bind(("127.0.0.1", next)).is_ok());
        }
        other => panic!("expected PortInUse, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_dependencies_fail_before_spawn() {
    let dir = project(false);
    let marker = dir.path().join("spawned");
    let mut config = ServerConfig::new(dir.path(), &ServerSettings::default());
    config.port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    config.start_command = vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("touch {}", marker.display()),
        "sh".to_string(),
    ];

    let err = NpmDevServerLauncher.start(&config).await.err().unwrap();
    assert!(matches!(err, ServerError::DependenciesNotInstalled { .. }));
    assert!(!marker.exists());
}
