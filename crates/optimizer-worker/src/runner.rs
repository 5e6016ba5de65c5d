//! Job runner: bounded worker pool, execution deadline and the scheduled sweep.

use optimizer::{BatchResult, BatchRunner, JobPayload, JobReason, OptimizerError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::WorkerConfig;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    #[error("Job exceeded its {secs}s deadline")]
    TimedOut { secs: u64 },

    #[error("Worker is shutting down")]
    ShuttingDown,
}

/// Runs optimization jobs, at most `worker_concurrency` at a time.
pub struct JobRunner {
    batch: BatchRunner,
    permits: Semaphore,
    job_timeout: Duration,
}

impl JobRunner {
    pub fn new(batch: BatchRunner, config: &WorkerConfig) -> Self {
        Self {
            batch,
            permits: Semaphore::new(config.worker_concurrency.max(1)),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        }
    }

    pub fn batch(&self) -> &BatchRunner {
        &self.batch
    }

    /// Run one job, waiting for a free worker slot first.
    pub async fn execute(&self, payload: &JobPayload) -> Result<BatchResult, JobError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| JobError::ShuttingDown)?;

        match tokio::time::timeout(self.job_timeout, self.batch.run(payload)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(
                    reason = %payload.reason,
                    campaign_id = ?payload.campaign_id,
                    timeout_secs = self.job_timeout.as_secs(),
                    "Optimization job timed out"
                );
                Err(JobError::TimedOut {
                    secs: self.job_timeout.as_secs(),
                })
            }
        }
    }

    /// Scheduled sweeps every `interval_secs`, with an optional start-trigger run.
    pub async fn run_schedule(self: Arc<Self>, config: WorkerConfig) {
        let mut ticker = interval(Duration::from_secs(config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        ticker.tick().await;
        if config.run_on_start {
            self.run_logged(JobPayload {
                reason: JobReason::StartTrigger,
                ..Default::default()
            })
            .await;
        }

        info!(interval_secs = config.interval_secs, "Optimization scheduler started");

        loop {
            ticker.tick().await;
            self.run_logged(JobPayload::scheduled()).await;
        }
    }

    async fn run_logged(&self, payload: JobPayload) {
        match self.execute(&payload).await {
            Ok(result) => {
                info!(
                    reason = %payload.reason,
                    processed = result.campaigns_processed,
                    failed = result.failed(),
                    "Optimization job finished"
                );
            }
            Err(e) => {
                warn!(reason = %payload.reason, error = %e, "Optimization job failed");
            }
        }
    }
}
