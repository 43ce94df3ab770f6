//! Records persisted in the document store and the value types they share.

mod artifact;
mod competency;
mod ids;
mod rating;
mod user;

pub use artifact::{Artifact, ArtifactFileType, MAX_ARTIFACT_SIZE};
pub use competency::{Competency, CompetencyType, RubricScale};
pub use ids::{ArtifactId, CompetencyId, OrganizationId, RatingId, UserId};
pub use rating::{InvalidScore, RaterType, Rating, RatingScore, RatingState};
pub use user::{OrgType, Organization, Role, User};

/// Document store collections backing each record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Organizations,
    Users,
    Competencies,
    Ratings,
    Artifacts,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Organizations => "organizations",
            Collection::Users => "users",
            Collection::Competencies => "competencies",
            Collection::Ratings => "ratings",
            Collection::Artifacts => "artifacts",
        }
    }

    /// Prefix used when allocating document identifiers.
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Collection::Organizations => "org",
            Collection::Users => "user",
            Collection::Competencies => "comp",
            Collection::Ratings => "rating",
            Collection::Artifacts => "artifact",
        }
    }
}
