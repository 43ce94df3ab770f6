//! Document store abstraction over the five LERN collections.

mod batch;
mod memory;
mod subscription;

pub use batch::{Document, Write, WriteBatch};
pub use memory::MemoryStore;
pub use subscription::{RatingChange, RatingEvent, RatingFilter, RatingSubscription};

use crate::domain::{
    Artifact, Collection, Competency, CompetencyId, OrganizationId, Organization, RaterType,
    Rating, RatingId, User, UserId,
};

/// Storage abstraction so the service can be exercised against any backend.
///
/// Every write goes through [`LernRepository::commit_batch`], which applies all of its
/// writes or none of them.
pub trait LernRepository: Send + Sync {
    /// Fresh document id for `collection`, never handed out twice.
    fn allocate_id(&self, collection: Collection) -> Result<String, RepositoryError>;

    fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError>;
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    /// Users holding the learner role in `org_id`.
    fn learners(&self, org_id: &OrganizationId) -> Result<Vec<User>, RepositoryError>;
    fn competency(&self, id: &CompetencyId) -> Result<Option<Competency>, RepositoryError>;
    fn competencies(&self, org_id: &OrganizationId) -> Result<Vec<Competency>, RepositoryError>;
    fn rating(&self, id: &RatingId) -> Result<Option<Rating>, RepositoryError>;
    fn ratings(&self) -> Result<Vec<Rating>, RepositoryError>;
    fn ratings_for_learner(&self, learner_id: &UserId) -> Result<Vec<Rating>, RepositoryError>;
    /// Pending ratings assigned to `rater_id`, optionally restricted to one rater type.
    fn pending_for_rater(
        &self,
        rater_id: &UserId,
        rater_type: Option<RaterType>,
    ) -> Result<Vec<Rating>, RepositoryError>;
    fn artifacts_for_learner(&self, learner_id: &UserId) -> Result<Vec<Artifact>, RepositoryError>;

    fn commit_batch(&self, batch: WriteBatch) -> Result<(), RepositoryError>;

    /// Live rating changes matching `filter`. Dropping the subscription releases it.
    fn subscribe_ratings(&self, filter: RatingFilter) -> Result<RatingSubscription, RepositoryError>;

    fn create(&self, document: Document) -> Result<(), RepositoryError> {
        self.commit_batch(WriteBatch::new().create(document))
    }

    fn update(&self, document: Document) -> Result<(), RepositoryError> {
        self.commit_batch(WriteBatch::new().update(document))
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{collection} document '{id}' already exists")]
    Conflict { collection: &'static str, id: String },
    #[error("{collection} document '{id}' not found")]
    NotFound { collection: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.name(),
            id: id.into(),
        }
    }

    pub fn conflict(collection: Collection, id: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.name(),
            id: id.into(),
        }
    }
}
