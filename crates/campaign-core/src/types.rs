//! Core domain types for the campaign control loop.

pub mod action;
pub mod campaign;
pub mod metrics;
pub mod variant;

pub use action::*;
pub use campaign::*;
pub use metrics::*;
pub use variant::*;
