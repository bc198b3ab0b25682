//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::extract::{self, ExtractError, ExtractOptions, ExtractResult};
use crate::pool::{Job, PoolStats, WorkerPool};

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pool: WorkerPool,
    gate: AdmissionGate,
    job_timeout: Duration,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pool = WorkerPool::new(
            config.pool.size,
            Arc::new(|job: &Job| extract::extract(&job.buffer, &job.options)),
        );
        let gate = AdmissionGate::new(
            config.pool.admission_limit,
            Duration::from_millis(config.pool.admission_timeout_ms),
        );
        let job_timeout = Duration::from_millis(config.pool.job_timeout_ms);
        Self {
            config: Arc::new(config),
            pool,
            gate,
            job_timeout,
        }
    }

    /// Run one extraction job through the admission gate and worker pool.
    pub async fn extract(
        &self,
        buffer: Vec<u8>,
        options: ExtractOptions,
    ) -> std::result::Result<ExtractResult, ExtractError> {
        let _permit = self.gate.admit().await?;
        self.pool.execute(Job { buffer, options }, self.job_timeout).await
    }

    pub async fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.stats().await
    }

    pub fn slots_available(&self) -> usize {
        self.gate.available()
    }

    /// Stop accepting jobs and wait for in-flight work to finish.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Prefer;

    fn test_state() -> AppState {
        let mut config = Config::default();
        config.pool.size = 2;
        config.pool.admission_limit = 2;
        config.pool.job_timeout_ms = 5_000;
        config.pool.admission_timeout_ms = 100;
        AppState::new(config)
    }

    #[tokio::test]
    async fn test_invalid_bytes_surface_document_error() {
        let state = test_state();
        let options = ExtractOptions {
            prefer: Prefer::Auto,
            start_page: 1,
            try_all_pages: true,
        };
        let err = state
            .extract(b"not a pdf".to_vec(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Document(_)));
        state.shutdown().await;
    }
}
