//! Process supervisor
//!
//! The parent process never serves traffic. It re-executes itself with the
//! `--worker` flag once per configured process, each child binding the shared
//! listen port with SO_REUSEPORT so the kernel load-balances connections.
//! A child that exits unexpectedly is replaced; on SIGTERM or Ctrl+C the
//! supervisor forwards SIGTERM to every child and waits out the grace period
//! before force-killing stragglers.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::signal;

use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    let mut children: Vec<Child> = Vec::with_capacity(config.cluster.processes);
    for slot in 0..config.cluster.processes {
        children.push(spawn_child(slot)?);
    }
    tracing::info!(processes = children.len(), "supervisor started");

    loop {
        tokio::select! {
            _ = shutdown_signal() => {
                tracing::info!("shutdown requested, stopping workers");
                break;
            }
            (result, index) = wait_any(&mut children) => {
                match result {
                    Ok(status) => {
                        tracing::warn!(slot = index, %status, "worker process exited, respawning");
                    }
                    Err(e) => {
                        tracing::error!(slot = index, error = %e, "failed to wait on worker, respawning");
                    }
                }
                children[index] = spawn_child(index)?;
            }
        }
    }

    terminate_children(children, Duration::from_secs(config.cluster.shutdown_grace_secs)).await;
    tracing::info!("supervisor shutdown complete");
    Ok(())
}

fn spawn_child(slot: usize) -> Result<Child> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let child = Command::new(exe)
        .arg("--worker")
        .env("WORKER_SLOT", slot.to_string())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn worker process")?;
    tracing::info!(slot, pid = child.id(), "worker process started");
    Ok(child)
}

/// Resolve when any child exits, yielding its wait result and index.
async fn wait_any(children: &mut [Child]) -> (std::io::Result<std::process::ExitStatus>, usize) {
    let waits = children
        .iter_mut()
        .map(|child| Box::pin(child.wait()))
        .collect::<Vec<_>>();
    let (result, index, _) = futures::future::select_all(waits).await;
    (result, index)
}

/// SIGTERM every child, then give the whole group one shared grace window
/// before force-killing whoever is still running.
async fn terminate_children(mut children: Vec<Child>, grace: Duration) {
    for child in &children {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
    }

    let deadline = Instant::now() + grace;
    for (index, child) in children.iter_mut().enumerate() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(slot = index, %status, "worker process stopped");
            }
            Ok(Err(e)) => {
                tracing::warn!(slot = index, error = %e, "failed waiting on worker process");
            }
            Err(_) => {
                tracing::warn!(slot = index, "worker process ignored SIGTERM, killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
