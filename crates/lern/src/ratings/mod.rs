//! Rating lifecycle: requests, immediate mentor ratings, and completion.

mod flow;
mod lifecycle;

pub use flow::{FlowError, RatingFlow};
pub use lifecycle::{normalize_comment, MentorRating, RatingError, RatingRequest};
