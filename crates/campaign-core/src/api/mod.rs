//! Clients for external collaborators.

pub mod tips;

pub use tips::{CreativeTips, HttpTipsClient, TipsGenerator, TipsRequest};
