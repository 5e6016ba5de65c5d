//! Optimizer error types.

use thiserror::Error;
use uuid::Uuid;

use crate::action_logger::ActionRecord;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error(transparent)]
    Core(#[from] campaign_core::Error),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    #[error("Campaign {0} is already being evaluated by another pass")]
    LeaseHeld(Uuid),

    /// A pass failed after some of its actions were already applied.
    #[error("{source}")]
    PassInterrupted {
        source: Box<OptimizerError>,
        actions: Vec<ActionRecord>,
        insights: Vec<String>,
    },
}

impl OptimizerError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Core(campaign_core::Error::Conflict {
            message: message.into(),
        })
    }
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
