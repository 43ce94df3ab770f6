//! Rating aggregation and public portfolio assembly.
//!
//! Ratings flow through three pure steps: [`aggregate_by_competency`] groups completed
//! ratings and averages them, [`filter_hidden`] drops competencies the learner keeps
//! private, and [`apply_display_order`] applies the learner's custom ordering.
//! [`PublicPortfolio::build`] runs all three for one learner.

mod aggregate;
mod ordering;
mod profile;
mod visibility;

pub use aggregate::{
    aggregate_by_competency, progress_series, CompetencyAggregate, CompetencyProgress,
    ProgressPoint,
};
pub use ordering::{apply_display_order, sort_by_display_order};
pub use profile::{LearnerSummary, PortfolioEntry, PublicPortfolio, RatingView};
pub use visibility::{filter_hidden, is_hidden};
