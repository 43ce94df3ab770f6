use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{
    Artifact, ArtifactId, Collection, Competency, CompetencyId, Organization, OrganizationId,
    RaterType, Rating, RatingId, User, UserId,
};

use super::batch::{Document, Write, WriteBatch};
use super::subscription::{RatingChange, RatingEvent, RatingFilter, RatingSubscription};
use super::{LernRepository, RepositoryError};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Default, Clone)]
struct Collections {
    organizations: BTreeMap<OrganizationId, Organization>,
    users: BTreeMap<UserId, User>,
    competencies: BTreeMap<CompetencyId, Competency>,
    ratings: BTreeMap<RatingId, Rating>,
    artifacts: BTreeMap<ArtifactId, Artifact>,
}

impl Collections {
    fn contains(&self, collection: Collection, id: &str) -> bool {
        match collection {
            Collection::Organizations => self.organizations.contains_key(&OrganizationId::from(id)),
            Collection::Users => self.users.contains_key(&UserId::from(id)),
            Collection::Competencies => self.competencies.contains_key(&CompetencyId::from(id)),
            Collection::Ratings => self.ratings.contains_key(&RatingId::from(id)),
            Collection::Artifacts => self.artifacts.contains_key(&ArtifactId::from(id)),
        }
    }

    fn put(&mut self, document: Document) {
        match document {
            Document::Organization(record) => {
                self.organizations.insert(record.id.clone(), record);
            }
            Document::User(record) => {
                self.users.insert(record.id.clone(), record);
            }
            Document::Competency(record) => {
                self.competencies.insert(record.id.clone(), record);
            }
            Document::Rating(record) => {
                self.ratings.insert(record.id.clone(), record);
            }
            Document::Artifact(record) => {
                self.artifacts.insert(record.id.clone(), record);
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    collections: Collections,
    sequences: HashMap<Collection, u64>,
}

/// In-process document store used by the demo, the CLI reports, and tests.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    events: broadcast::Sender<RatingEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
        }
    }

    /// Number of live rating subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&Collections) -> T) -> Result<T, RepositoryError> {
        let state = self.lock()?;
        Ok(f(&state.collections))
    }
}

impl LernRepository for MemoryStore {
    fn allocate_id(&self, collection: Collection) -> Result<String, RepositoryError> {
        let mut state = self.lock()?;
        loop {
            let sequence = state.sequences.entry(collection).or_insert(0);
            *sequence += 1;
            let id = format!("{}-{:06}", collection.id_prefix(), *sequence);
            if !state.collections.contains(collection, &id) {
                return Ok(id);
            }
        }
    }

    fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        self.read(|collections| collections.organizations.get(id).cloned())
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.read(|collections| collections.users.get(id).cloned())
    }

    fn learners(&self, org_id: &OrganizationId) -> Result<Vec<User>, RepositoryError> {
        self.read(|collections| {
            collections
                .users
                .values()
                .filter(|user| &user.org_id == org_id && user.is_learner())
                .cloned()
                .collect()
        })
    }

    fn competency(&self, id: &CompetencyId) -> Result<Option<Competency>, RepositoryError> {
        self.read(|collections| collections.competencies.get(id).cloned())
    }

    fn competencies(&self, org_id: &OrganizationId) -> Result<Vec<Competency>, RepositoryError> {
        self.read(|collections| {
            collections
                .competencies
                .values()
                .filter(|competency| &competency.org_id == org_id)
                .cloned()
                .collect()
        })
    }

    fn rating(&self, id: &RatingId) -> Result<Option<Rating>, RepositoryError> {
        self.read(|collections| collections.ratings.get(id).cloned())
    }

    fn ratings(&self) -> Result<Vec<Rating>, RepositoryError> {
        self.read(|collections| collections.ratings.values().cloned().collect())
    }

    fn ratings_for_learner(&self, learner_id: &UserId) -> Result<Vec<Rating>, RepositoryError> {
        self.read(|collections| {
            collections
                .ratings
                .values()
                .filter(|rating| &rating.learner_id == learner_id)
                .cloned()
                .collect()
        })
    }

    fn pending_for_rater(
        &self,
        rater_id: &UserId,
        rater_type: Option<RaterType>,
    ) -> Result<Vec<Rating>, RepositoryError> {
        self.read(|collections| {
            let mut pending: Vec<Rating> = collections
                .ratings
                .values()
                .filter(|rating| {
                    rating.is_pending()
                        && &rating.rater_id == rater_id
                        && rater_type.map_or(true, |kind| rating.rater_type == kind)
                })
                .cloned()
                .collect();
            pending.sort_by(|left, right| left.created_at.cmp(&right.created_at));
            pending
        })
    }

    fn artifacts_for_learner(&self, learner_id: &UserId) -> Result<Vec<Artifact>, RepositoryError> {
        self.read(|collections| {
            collections
                .artifacts
                .values()
                .filter(|artifact| &artifact.learner_id == learner_id)
                .cloned()
                .collect()
        })
    }

    fn commit_batch(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.lock()?;
        // Stage against a copy so a failing write leaves the store untouched.
        let mut staged = state.collections.clone();
        let mut events = Vec::new();

        for write in batch.into_writes() {
            let collection = write.document().collection();
            let id = write.document().id().to_string();
            let exists = staged.contains(collection, &id);

            let document = match write {
                Write::Create(_) if exists => {
                    return Err(RepositoryError::conflict(collection, id));
                }
                Write::Update(_) if !exists => {
                    return Err(RepositoryError::not_found(collection, id));
                }
                Write::Create(document) | Write::Set(document) | Write::Update(document) => {
                    document
                }
            };

            if let Document::Rating(rating) = &document {
                let change = if exists {
                    RatingChange::Updated
                } else {
                    RatingChange::Created
                };
                events.push(RatingEvent {
                    change,
                    rating: rating.clone(),
                });
            }
            staged.put(document);
        }

        state.collections = staged;

        debug!(rating_events = events.len(), "batch committed");
        // Sent under the lock so subscribers see changes in commit order.
        for event in events {
            // No receivers is fine.
            let _ = self.events.send(event);
        }
        drop(state);
        Ok(())
    }

    fn subscribe_ratings(&self, filter: RatingFilter) -> Result<RatingSubscription, RepositoryError> {
        Ok(RatingSubscription::new(self.events.subscribe(), filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RatingScore;
    use crate::testing::{competency, completed, learner, pending, timestamp};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .commit_batch(
                WriteBatch::new()
                    .set(Document::User(learner("learner-1")))
                    .set(Document::Competency(competency("A")))
                    .set(Document::Rating(pending("rating-000001", "learner-1", "A"))),
            )
            .expect("seed commits");
        store
    }

    #[test]
    fn failing_write_rolls_back_the_whole_batch() {
        let store = seeded();
        let batch = WriteBatch::new()
            .create(Document::Rating(completed("r-new", "learner-1", "A", 3)))
            .create(Document::User(learner("learner-1")));

        let error = store.commit_batch(batch).expect_err("duplicate user conflicts");

        assert!(matches!(error, RepositoryError::Conflict { collection: "users", .. }));
        assert!(store.rating(&RatingId::from("r-new")).expect("read").is_none());
    }

    #[test]
    fn update_requires_an_existing_document() {
        let store = seeded();
        let error = store
            .update(Document::Rating(completed("missing", "learner-1", "A", 2)))
            .expect_err("missing rating");
        assert!(matches!(error, RepositoryError::NotFound { collection: "ratings", .. }));
    }

    #[test]
    fn allocated_ids_skip_existing_documents() {
        let store = seeded();
        let id = store.allocate_id(Collection::Ratings).expect("id allocated");
        assert_eq!(id, "rating-000002");
        assert_eq!(
            store.allocate_id(Collection::Competencies).expect("id allocated"),
            "comp-000001"
        );
    }

    #[test]
    fn learners_exclude_other_roles_and_orgs() {
        let store = seeded();
        let mut educator = learner("educator-1");
        educator.roles = [crate::domain::Role::Educator].into_iter().collect();
        let mut elsewhere = learner("learner-2");
        elsewhere.org_id = OrganizationId::from("org-other");
        store
            .commit_batch(
                WriteBatch::new()
                    .set(Document::User(educator))
                    .set(Document::User(elsewhere)),
            )
            .expect("users saved");

        let learners = store
            .learners(&OrganizationId::from("org-demo"))
            .expect("learners load");
        assert_eq!(learners.len(), 1);
        assert_eq!(learners[0].id.as_str(), "learner-1");
    }

    #[tokio::test]
    async fn subscribers_see_matching_changes_and_release_on_drop() {
        let store = seeded();
        let mut subscription = store
            .subscribe_ratings(RatingFilter::learner(UserId::from("learner-1")))
            .expect("subscribed");
        assert_eq!(store.subscriber_count(), 1);

        store
            .create(Document::Rating(completed("r-other", "learner-2", "A", 1)))
            .expect("other learner rating saved");
        let mut rating = store
            .rating(&RatingId::from("rating-000001"))
            .expect("read")
            .expect("seeded rating");
        rating
            .complete(RatingScore::new(4).expect("valid"), None, timestamp())
            .expect("completes");
        store.update(Document::Rating(rating)).expect("rating updated");

        let event = subscription.recv().await.expect("event delivered");
        assert_eq!(event.change, RatingChange::Updated);
        assert_eq!(event.rating.id.as_str(), "rating-000001");
        assert!(subscription.try_recv().is_none());

        drop(subscription);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn concurrent_commits_are_announced_in_commit_order() {
        let store = seeded();
        let mut subscription = store
            .subscribe_ratings(RatingFilter::learner(UserId::from("learner-1")))
            .expect("subscribed");

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..20 {
                        let mut rating = completed("r-shared", "learner-1", "A", 2);
                        rating.rater_id = UserId::from(format!("educator-{writer}"));
                        store
                            .commit_batch(WriteBatch::new().set(Document::Rating(rating)))
                            .expect("rating saved");
                    }
                });
            }
        });

        let mut events = Vec::new();
        while let Some(event) = subscription.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 80);
        assert_eq!(events[0].change, RatingChange::Created);
        assert!(events[1..]
            .iter()
            .all(|event| event.change == RatingChange::Updated));

        let stored = store
            .rating(&RatingId::from("r-shared"))
            .expect("read")
            .expect("rating saved");
        assert_eq!(events[79].rating.rater_id, stored.rater_id);
    }

    #[test]
    fn pending_for_rater_filters_by_type() {
        let store = seeded();
        let self_pending = store
            .pending_for_rater(&UserId::from("learner-1"), Some(RaterType::SelfAssessment))
            .expect("query runs");
        let master_pending = store
            .pending_for_rater(&UserId::from("learner-1"), Some(RaterType::Master))
            .expect("query runs");

        assert_eq!(self_pending.len(), 1);
        assert!(master_pending.is_empty());
    }
}
