//! Campaign performance control loop.
//!
//! Each pass over a campaign reads one metrics snapshot and then, in order:
//! - pauses variants that spend without converting ([`evaluator`])
//! - moves budget toward the best variant and pauses the worst ([`reallocator`])
//! - asks the tips service for a fresh angle when the campaign is too expensive ([`mutation`])
//! - retires campaigns that stay unprofitable ([`lifecycle`])
//!
//! Every change goes through the [`action_logger`] so the audit log and the
//! store never disagree.

pub mod action_logger;
pub mod aggregator;
pub mod batch;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod lease;
pub mod lifecycle;
pub mod mutation;
pub mod orchestrator;
pub mod reallocator;

#[cfg(test)]
mod testing;

pub use batch::{BatchResult, BatchRunner, CampaignOutcome, CampaignResult, JobPayload, JobReason};
pub use config::{OptimizerConfig, Thresholds};
pub use error::{OptimizerError, Result};
pub use lease::{CampaignLease, MemoryLease, RedisLease};
pub use orchestrator::{CampaignOrchestrator, CampaignReport, PassOptions, PassOutcome};
