//! Boleto Extraction Server
//!
//! Accepts a PDF by URL or upload and extracts its payment payload, either a
//! textual digit line (linha digitavel) or a QR code payload. Runs as a small
//! cluster: a supervisor process plus N worker processes sharing one listen
//! port via SO_REUSEPORT, each worker holding its own bounded thread pool.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boleto_server::config::Config;
use boleto_server::routes;
use boleto_server::state::AppState;
use boleto_server::supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boleto_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    if std::env::args().any(|arg| arg == "--worker") {
        run_server(config).await
    } else {
        tracing::info!(
            "Starting Boleto Extraction Server v{}",
            env!("CARGO_PKG_VERSION")
        );
        supervisor::run(config).await
    }
}

/// Serve HTTP in a worker process.
async fn run_server(config: Config) -> Result<()> {
    routes::health::mark_started();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;

    let state = AppState::new(config);
    let app = routes::router(state.clone());

    let listener = bind_reuse_port(addr)?;
    tracing::info!(
        slot = std::env::var("WORKER_SLOT").unwrap_or_default(),
        "worker listening on {}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(supervisor::shutdown_signal())
        .await
        .context("server error")?;

    // Let in-flight extractions finish before the process exits.
    state.shutdown().await;
    tracing::info!("worker shutdown complete");
    Ok(())
}

/// Bind the listen socket with SO_REUSEPORT so sibling worker processes can
/// share the port and let the kernel spread connections across them.
fn bind_reuse_port(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .context("failed to create socket")?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {}", addr))?;
    socket.listen(1024)?;

    let std_listener: std::net::TcpListener = socket.into();
    tokio::net::TcpListener::from_std(std_listener).context("failed to register listener")
}
