//! Configuration management for the boleto extraction server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Worker threads per process.
    pub size: usize,
    /// Per-job deadline in milliseconds.
    pub job_timeout_ms: u64,
    /// Maximum jobs in flight per process, independent of pool size.
    pub admission_limit: usize,
    /// How long a request may wait at the admission gate.
    pub admission_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Worker processes to supervise.
    pub processes: usize,
    /// Grace period before a worker process is force-killed on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8081,
            },
            pool: PoolConfig {
                size: cpus,
                job_timeout_ms: 120_000,
                admission_limit: 4,
                admission_timeout_ms: 30_000,
            },
            cluster: ClusterConfig {
                processes: cpus,
                shutdown_grace_secs: 10,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
            },
            pool: PoolConfig {
                size: parse_var("POOL_SIZE", defaults.pool.size).max(1),
                job_timeout_ms: parse_var("JOB_TIMEOUT_MS", defaults.pool.job_timeout_ms),
                admission_limit: parse_var("ADMISSION_LIMIT", defaults.pool.admission_limit).max(1),
                admission_timeout_ms: parse_var(
                    "ADMISSION_TIMEOUT_MS",
                    defaults.pool.admission_timeout_ms,
                ),
            },
            cluster: ClusterConfig {
                processes: parse_var("WORKER_PROCESSES", defaults.cluster.processes).max(1),
                shutdown_grace_secs: parse_var(
                    "SHUTDOWN_GRACE_SECS",
                    defaults.cluster.shutdown_grace_secs,
                ),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.pool.job_timeout_ms, 120_000);
        assert_eq!(config.pool.admission_limit, 4);
        assert!(config.pool.size >= 1);
        assert_eq!(config.cluster.shutdown_grace_secs, 10);
    }
}
