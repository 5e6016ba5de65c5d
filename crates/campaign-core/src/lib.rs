//! Campaign Core Library
//!
//! Shared types, store adapters and service clients for the campaign
//! performance control loop.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::{CampaignStore, MemoryCampaignStore};
