//! adpilot: autonomous campaign performance control loop
//!
//! This is the root crate that provides benchmark and integration test access
//! to the workspace crates. For actual functionality, use them directly:
//!
//! - `campaign-core`: domain types, PostgreSQL store, tips service client
//! - `optimizer`: evaluator, reallocator, mutation, lifecycle and batch runner
//! - `optimizer-worker`: HTTP trigger surface and scheduled sweeps

pub use campaign_core as core;
pub use optimizer;
