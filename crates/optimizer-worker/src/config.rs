//! Worker configuration.

use std::net::SocketAddr;

/// Job worker and HTTP surface settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between scheduled sweeps.
    pub interval_secs: u64,
    /// Run a start-trigger sweep as soon as the worker comes up.
    pub run_on_start: bool,
    /// Jobs allowed to run at once.
    pub worker_concurrency: usize,
    /// Deadline for one job. Campaign leases never outlive it, see
    /// [`WorkerConfig::lease_ttl_secs`].
    pub job_timeout_secs: u64,
    pub bind_addr: String,
    /// Enable CORS for all origins (development only).
    pub cors_permissive: bool,
    /// Apply pending migrations before serving.
    pub run_migrations: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
            worker_concurrency: 2,
            job_timeout_secs: 900,
            bind_addr: "0.0.0.0:8080".to_string(),
            cors_permissive: false,
            run_migrations: true,
        }
    }
}

impl WorkerConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval_secs: std::env::var("OPTIMIZER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.interval_secs),
            run_on_start: std::env::var("OPTIMIZER_RUN_ON_START")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.run_on_start),
            worker_concurrency: std::env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(defaults.worker_concurrency),
            job_timeout_secs: std::env::var("JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.job_timeout_secs),
            // PORT wins when the platform injects one
            bind_addr: std::env::var("WORKER_BIND_ADDR")
                .ok()
                .or_else(|| {
                    std::env::var("PORT")
                        .ok()
                        .map(|port| format!("0.0.0.0:{}", port))
                })
                .unwrap_or(defaults.bind_addr),
            cors_permissive: std::env::var("CORS_PERMISSIVE")
                .map(|v| v == "true")
                .unwrap_or(defaults.cors_permissive),
            run_migrations: !std::env::var("SKIP_MIGRATIONS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Lease TTL bounded by the job deadline.
    ///
    /// A job cut off at its deadline drops its in-flight pass without
    /// releasing the lease, so the lease must lapse by the time the next job
    /// can start.
    pub fn lease_ttl_secs(&self, configured: u64) -> u64 {
        configured.min(self.job_timeout_secs.max(1))
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid WORKER_BIND_ADDR {}: {}", self.bind_addr, e))
    }
}
