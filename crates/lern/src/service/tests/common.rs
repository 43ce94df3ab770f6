use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::artifacts::MemoryBlobStore;
use crate::config::AppContext;
use crate::domain::{
    Artifact, Collection, Competency, CompetencyId, OrgType, Organization, OrganizationId,
    RaterType, Rating, RatingId, User, UserId,
};
use crate::router::lern_router;
use crate::service::LernService;
use crate::store::{
    Document, LernRepository, MemoryStore, RatingFilter, RatingSubscription, RepositoryError,
    WriteBatch,
};
use crate::suggestions::{StaticSuggester, SuggestedRating};
use crate::testing::{competency, completed, learner, pending, timestamp};

pub(super) type MemoryService = LernService<MemoryStore, MemoryBlobStore>;

/// Two learners, three competencies, and a mix of ratings.
pub(super) fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let mut maya = learner("learner-maya");
    maya.display_name = "Maya Chen".to_string();
    maya.hidden_competency_ids = Some(vec![CompetencyId::from("comp-web-dev")]);
    maya.competency_display_order = Some(vec![
        CompetencyId::from("comp-collaboration"),
        CompetencyId::from("comp-python"),
    ]);
    let jordan = learner("learner-jordan");
    let mut educator = learner("educator-1");
    educator.roles = [crate::domain::Role::Educator].into_iter().collect();

    let batch = WriteBatch::new()
        .set(Document::Organization(Organization {
            id: OrganizationId::from("org-demo"),
            name: "Demo High School".to_string(),
            org_type: OrgType::Education,
            created_at: timestamp(),
        }))
        .set(Document::User(maya))
        .set(Document::User(jordan))
        .set(Document::User(educator))
        .set(Document::Competency(competency("comp-python")))
        .set(Document::Competency(competency("comp-web-dev")))
        .set(Document::Competency(competency("comp-collaboration")))
        .set(Document::Rating(completed("seed-1", "learner-maya", "comp-python", 3)))
        .set(Document::Rating(completed("seed-2", "learner-maya", "comp-python", 4)))
        .set(Document::Rating(completed("seed-3", "learner-maya", "comp-web-dev", 4)))
        .set(Document::Rating(completed("seed-4", "learner-maya", "comp-collaboration", 2)))
        .set(Document::Rating(completed("seed-5", "learner-jordan", "comp-python", 2)))
        .set(Document::Rating(completed("seed-6", "learner-jordan", "comp-web-dev", 3)))
        .set(Document::Rating(pending("seed-7", "learner-jordan", "comp-collaboration")));

    store.commit_batch(batch).expect("seed data commits");
    store
}

pub(super) fn suggestions() -> Vec<SuggestedRating> {
    vec![SuggestedRating {
        competency_id: CompetencyId::from("comp-python"),
        score: crate::domain::RatingScore::new(3).expect("valid score"),
        comment: "Automated a grading script".to_string(),
    }]
}

pub(super) fn build_service() -> (MemoryService, Arc<MemoryStore>, Arc<MemoryBlobStore>) {
    let store = Arc::new(seeded_store());
    let blobs = Arc::new(MemoryBlobStore::default());
    let service = LernService::new(
        store.clone(),
        blobs.clone(),
        Arc::new(StaticSuggester::new(suggestions())),
        AppContext::default(),
    );
    (service, store, blobs)
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    lern_router(Arc::new(service))
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl LernRepository for UnavailableStore {
    fn allocate_id(&self, _collection: Collection) -> Result<String, RepositoryError> {
        offline()
    }

    fn organization(&self, _id: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        offline()
    }

    fn user(&self, _id: &UserId) -> Result<Option<User>, RepositoryError> {
        offline()
    }

    fn learners(&self, _org_id: &OrganizationId) -> Result<Vec<User>, RepositoryError> {
        offline()
    }

    fn competency(&self, _id: &CompetencyId) -> Result<Option<Competency>, RepositoryError> {
        offline()
    }

    fn competencies(&self, _org_id: &OrganizationId) -> Result<Vec<Competency>, RepositoryError> {
        offline()
    }

    fn rating(&self, _id: &RatingId) -> Result<Option<Rating>, RepositoryError> {
        offline()
    }

    fn ratings(&self) -> Result<Vec<Rating>, RepositoryError> {
        offline()
    }

    fn ratings_for_learner(&self, _learner_id: &UserId) -> Result<Vec<Rating>, RepositoryError> {
        offline()
    }

    fn pending_for_rater(
        &self,
        _rater_id: &UserId,
        _rater_type: Option<RaterType>,
    ) -> Result<Vec<Rating>, RepositoryError> {
        offline()
    }

    fn artifacts_for_learner(&self, _learner_id: &UserId) -> Result<Vec<Artifact>, RepositoryError> {
        offline()
    }

    fn commit_batch(&self, _batch: WriteBatch) -> Result<(), RepositoryError> {
        offline()
    }

    fn subscribe_ratings(&self, _filter: RatingFilter) -> Result<RatingSubscription, RepositoryError> {
        offline()
    }
}

pub(super) fn unavailable_service() -> LernService<UnavailableStore, MemoryBlobStore> {
    LernService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryBlobStore::default()),
        Arc::new(StaticSuggester::default()),
        AppContext::default(),
    )
}

/// Seeded store whose batch commits can be switched off; reads always pass through.
pub(super) struct FlakyCommits {
    inner: MemoryStore,
    reject: AtomicBool,
}

impl FlakyCommits {
    pub(super) fn rejecting() -> Self {
        Self {
            inner: seeded_store(),
            reject: AtomicBool::new(true),
        }
    }

    pub(super) fn recover(&self) {
        self.reject.store(false, Ordering::SeqCst);
    }
}

impl LernRepository for FlakyCommits {
    fn allocate_id(&self, collection: Collection) -> Result<String, RepositoryError> {
        self.inner.allocate_id(collection)
    }

    fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        self.inner.organization(id)
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.user(id)
    }

    fn learners(&self, org_id: &OrganizationId) -> Result<Vec<User>, RepositoryError> {
        self.inner.learners(org_id)
    }

    fn competency(&self, id: &CompetencyId) -> Result<Option<Competency>, RepositoryError> {
        self.inner.competency(id)
    }

    fn competencies(&self, org_id: &OrganizationId) -> Result<Vec<Competency>, RepositoryError> {
        self.inner.competencies(org_id)
    }

    fn rating(&self, id: &RatingId) -> Result<Option<Rating>, RepositoryError> {
        self.inner.rating(id)
    }

    fn ratings(&self) -> Result<Vec<Rating>, RepositoryError> {
        self.inner.ratings()
    }

    fn ratings_for_learner(&self, learner_id: &UserId) -> Result<Vec<Rating>, RepositoryError> {
        self.inner.ratings_for_learner(learner_id)
    }

    fn pending_for_rater(
        &self,
        rater_id: &UserId,
        rater_type: Option<RaterType>,
    ) -> Result<Vec<Rating>, RepositoryError> {
        self.inner.pending_for_rater(rater_id, rater_type)
    }

    fn artifacts_for_learner(&self, learner_id: &UserId) -> Result<Vec<Artifact>, RepositoryError> {
        self.inner.artifacts_for_learner(learner_id)
    }

    fn commit_batch(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        if self.reject.load(Ordering::SeqCst) {
            return offline();
        }
        self.inner.commit_batch(batch)
    }

    fn subscribe_ratings(&self, filter: RatingFilter) -> Result<RatingSubscription, RepositoryError> {
        self.inner.subscribe_ratings(filter)
    }
}

pub(super) fn flaky_service() -> (
    LernService<FlakyCommits, MemoryBlobStore>,
    Arc<FlakyCommits>,
    Arc<MemoryBlobStore>,
) {
    let store = Arc::new(FlakyCommits::rejecting());
    let blobs = Arc::new(MemoryBlobStore::default());
    let service = LernService::new(
        store.clone(),
        blobs.clone(),
        Arc::new(StaticSuggester::new(suggestions())),
        AppContext::default(),
    );
    (service, store, blobs)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
