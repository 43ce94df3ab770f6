//! Competency ratings, learner portfolios, and talent search.

pub mod artifacts;
pub mod config;
pub mod domain;
pub mod error;
pub mod import;
pub mod onboarding;
pub mod portfolio;
pub mod ratings;
pub mod router;
pub mod search;
pub mod service;
pub mod store;
pub mod suggestions;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use router::lern_router;
pub use service::{LernService, ServiceError};
