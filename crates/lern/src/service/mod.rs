//! Service facade composing the store, blob storage, and transcript suggester.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::{storage_path, ArtifactError, ArtifactUpload, BlobError, BlobStore};
use crate::config::AppContext;
use crate::domain::{
    Artifact, ArtifactId, Collection, Competency, CompetencyId, CompetencyType, RaterType, Rating,
    RatingId, RatingScore, RubricScale, User, UserId,
};
use crate::onboarding::{OnboardingBatch, OnboardingError, OnboardingRequest, OnboardingWizard};
use crate::portfolio::{progress_series, CompetencyProgress, PublicPortfolio};
use crate::ratings::{FlowError, MentorRating, RatingError, RatingFlow, RatingRequest};
use crate::search::{match_learners, validate_criteria, LearnerMatch, SearchCriterion, SearchError, SearchOptions};
use crate::store::{
    Document, LernRepository, RatingFilter, RatingSubscription, RepositoryError, WriteBatch,
};
use crate::suggestions::{RatingSuggester, SuggestedRating, SuggestionError};

/// Payload for adding a competency to the organization's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompetency {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CompetencyType,
    #[serde(default)]
    pub rubric: Option<RubricScale>,
}

/// Error raised by the LERN service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Suggestion(#[from] SuggestionError),
    #[error(transparent)]
    Rating(#[from] RatingError),
}

impl ServiceError {
    fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<SearchError> for ServiceError {
    fn from(err: SearchError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<OnboardingError> for ServiceError {
    fn from(err: OnboardingError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ArtifactError> for ServiceError {
    fn from(err: ArtifactError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<FlowError<ServiceError>> for ServiceError {
    fn from(err: FlowError<ServiceError>) -> Self {
        match err {
            FlowError::Finished => Self::Validation(err.to_string()),
            FlowError::Rating(err) => Self::Rating(err),
            FlowError::Persist(err) => err,
        }
    }
}

pub struct LernService<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
    suggester: Arc<dyn RatingSuggester>,
    context: AppContext,
    search_options: SearchOptions,
}

impl<S, B> LernService<S, B>
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        blobs: Arc<B>,
        suggester: Arc<dyn RatingSuggester>,
        context: AppContext,
    ) -> Self {
        Self {
            store,
            blobs,
            suggester,
            context,
            search_options: SearchOptions::default(),
        }
    }

    pub fn with_search_options(mut self, options: SearchOptions) -> Self {
        self.search_options = options;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn next_id(&self, collection: Collection) -> Result<String, ServiceError> {
        Ok(self.store.allocate_id(collection)?)
    }

    fn next_rating_id(&self) -> Result<RatingId, ServiceError> {
        self.next_id(Collection::Ratings).map(RatingId::new)
    }

    fn learner(&self, learner_id: &UserId) -> Result<User, ServiceError> {
        self.store
            .user(learner_id)?
            .filter(User::is_learner)
            .ok_or_else(|| ServiceError::not_found("learner", learner_id))
    }

    fn require_competency(&self, competency_id: &CompetencyId) -> Result<Competency, ServiceError> {
        self.store
            .competency(competency_id)?
            .ok_or_else(|| ServiceError::not_found("competency", competency_id))
    }

    /// Competency catalog of the configured organization.
    pub fn competencies(&self) -> Result<Vec<Competency>, ServiceError> {
        Ok(self.store.competencies(&self.context.org_id)?)
    }

    pub fn create_competency(&self, draft: NewCompetency) -> Result<Competency, ServiceError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ServiceError::Validation(
                "competency title is required".to_string(),
            ));
        }

        let competency = Competency {
            id: CompetencyId::new(self.next_id(Collection::Competencies)?),
            org_id: self.context.org_id.clone(),
            created_by: self.context.educator_id.clone(),
            title: title.to_string(),
            description: draft.description.trim().to_string(),
            kind: draft.kind,
            rubric: draft.rubric.unwrap_or_default(),
            created_at: Utc::now(),
        };

        self.store.create(Document::Competency(competency.clone()))?;
        info!(competency_id = %competency.id, "competency created");
        Ok(competency)
    }

    /// Filtered and ordered competency aggregates with evidence, as shown publicly.
    pub fn public_portfolio(&self, learner_id: &UserId) -> Result<PublicPortfolio, ServiceError> {
        let learner = self.learner(learner_id)?;
        let organization = self.store.organization(&learner.org_id)?;
        let ratings = self.store.ratings_for_learner(learner_id)?;
        let competencies = self.store.competencies(&learner.org_id)?;
        let artifacts = self.store.artifacts_for_learner(learner_id)?;

        Ok(PublicPortfolio::build(
            &learner,
            organization.as_ref(),
            &ratings,
            &competencies,
            &artifacts,
        ))
    }

    /// Running averages per competency, oldest rating first.
    pub fn progress(&self, learner_id: &UserId) -> Result<Vec<CompetencyProgress>, ServiceError> {
        let learner = self.learner(learner_id)?;
        let ratings = self.store.ratings_for_learner(learner_id)?;
        let competencies = self.store.competencies(&learner.org_id)?;
        Ok(progress_series(&ratings, &competencies))
    }

    pub fn search(&self, criteria: &[SearchCriterion]) -> Result<Vec<LearnerMatch>, ServiceError> {
        self.search_with(criteria, &self.search_options)
    }

    pub fn search_with(
        &self,
        criteria: &[SearchCriterion],
        options: &SearchOptions,
    ) -> Result<Vec<LearnerMatch>, ServiceError> {
        validate_criteria(criteria)?;

        let learners = self.store.learners(&self.context.org_id)?;
        let ratings = self.store.ratings()?;
        let competencies = self.store.competencies(&self.context.org_id)?;

        let matches = match_learners(&learners, &ratings, &competencies, criteria, options);
        info!(
            criteria = criteria.len(),
            candidates = learners.len(),
            matches = matches.len(),
            "search completed"
        );
        Ok(matches)
    }

    /// Save an educator's rating plus any self/master requests in one batch.
    pub fn add_mentor_rating(&self, rating: MentorRating) -> Result<Vec<Rating>, ServiceError> {
        self.learner(&rating.learner_id)?;
        self.require_competency(&rating.competency_id)?;
        if let Some(master_id) = &rating.master_id {
            self.require_user(master_id)?;
        }

        let ratings =
            rating.into_ratings(&self.context.educator_id, Utc::now(), || self.next_rating_id())?;
        self.commit_ratings(&ratings)?;
        Ok(ratings)
    }

    pub fn request_ratings(&self, request: RatingRequest) -> Result<Vec<Rating>, ServiceError> {
        self.learner(&request.learner_id)?;
        self.require_competency(&request.competency_id)?;
        if let Some(master_id) = &request.master_id {
            self.require_user(master_id)?;
        }

        let ratings = request.into_pending(Utc::now(), || self.next_rating_id())?;
        self.commit_ratings(&ratings)?;
        Ok(ratings)
    }

    fn require_user(&self, user_id: &UserId) -> Result<User, ServiceError> {
        self.store
            .user(user_id)?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    fn commit_ratings(&self, ratings: &[Rating]) -> Result<(), ServiceError> {
        let batch = ratings.iter().cloned().fold(WriteBatch::new(), |batch, rating| {
            batch.create(Document::Rating(rating))
        });
        self.store.commit_batch(batch)?;
        info!(count = ratings.len(), "ratings saved");
        Ok(())
    }

    /// Record a score for a pending rating.
    pub fn complete_rating(
        &self,
        rating_id: &RatingId,
        score: RatingScore,
        comment: Option<String>,
    ) -> Result<Rating, ServiceError> {
        let mut rating = self
            .store
            .rating(rating_id)?
            .ok_or_else(|| ServiceError::not_found("rating", rating_id))?;

        rating.complete(score, comment, Utc::now())?;
        self.store.update(Document::Rating(rating.clone()))?;
        info!(rating_id = %rating.id, score = score.value(), "rating completed");
        Ok(rating)
    }

    pub fn pending_for_rater(
        &self,
        rater_id: &UserId,
        rater_type: Option<RaterType>,
    ) -> Result<Vec<Rating>, ServiceError> {
        Ok(self.store.pending_for_rater(rater_id, rater_type)?)
    }

    /// Snapshot of the rater's pending ratings to work through one at a time.
    pub fn start_rating_flow(
        &self,
        rater_id: &UserId,
        rater_type: Option<RaterType>,
    ) -> Result<RatingFlow, ServiceError> {
        Ok(RatingFlow::start(self.pending_for_rater(rater_id, rater_type)?))
    }

    /// Complete the flow's current rating and persist it; the flow advances only on success.
    pub fn submit_in_flow(
        &self,
        flow: &mut RatingFlow,
        score: RatingScore,
        comment: Option<String>,
    ) -> Result<Rating, ServiceError> {
        let rating = flow.submit(score, comment, Utc::now(), |rating| {
            self.store
                .update(Document::Rating(rating.clone()))
                .map_err(ServiceError::from)
        })?;
        info!(rating_id = %rating.id, position = flow.position(), total = flow.len(), "flow rating saved");
        Ok(rating)
    }

    pub fn update_visibility(
        &self,
        learner_id: &UserId,
        hidden_competency_ids: Vec<CompetencyId>,
    ) -> Result<User, ServiceError> {
        let mut learner = self.learner(learner_id)?;
        learner.hidden_competency_ids = Some(dedup(hidden_competency_ids));
        self.store.update(Document::User(learner.clone()))?;
        info!(learner_id = %learner.id, "visibility updated");
        Ok(learner)
    }

    pub fn update_display_order(
        &self,
        learner_id: &UserId,
        display_order: Vec<CompetencyId>,
    ) -> Result<User, ServiceError> {
        let mut learner = self.learner(learner_id)?;
        learner.competency_display_order = Some(dedup(display_order));
        self.store.update(Document::User(learner.clone()))?;
        info!(learner_id = %learner.id, "display order updated");
        Ok(learner)
    }

    /// Suggested ratings for a transcript, limited to the organization's catalog.
    pub async fn analyze_transcript(
        &self,
        transcript: &str,
    ) -> Result<Vec<SuggestedRating>, ServiceError> {
        let catalog = self.competencies()?;
        let suggestions = self
            .suggester
            .suggest(transcript, &catalog)
            .await
            .map_err(|err| {
                warn!(error = %err, "transcript analysis failed");
                err
            })?;
        Ok(suggestions)
    }

    /// Create the learner and their reviewed ratings atomically.
    pub fn onboard_learner(&self, request: OnboardingRequest) -> Result<OnboardingBatch, ServiceError> {
        let mut wizard = request.into_wizard()?;
        self.complete_onboarding(&mut wizard)
    }

    /// Submit a wizard sitting at the review step.
    pub fn complete_onboarding(
        &self,
        wizard: &mut OnboardingWizard,
    ) -> Result<OnboardingBatch, ServiceError> {
        for competency_id in wizard
            .drafts()
            .iter()
            .filter_map(|draft| draft.competency_id.as_ref())
        {
            self.require_competency(competency_id)?;
        }

        let learner_id = UserId::new(self.next_id(Collection::Users)?);
        let batch = wizard.finish(
            learner_id,
            &self.context,
            Utc::now(),
            || self.next_rating_id(),
            |batch| {
                self.store
                    .commit_batch(batch.clone().into_write_batch())
                    .map_err(ServiceError::from)
            },
        )?;

        info!(
            learner_id = %batch.learner.id,
            ratings = batch.ratings.len(),
            "learner onboarded"
        );
        Ok(batch)
    }

    /// Store the file, then record the artifact against the learner.
    pub fn upload_artifact(&self, upload: ArtifactUpload) -> Result<Artifact, ServiceError> {
        let file_type = upload.validate()?;
        self.learner(&upload.learner_id)?;
        for competency_id in &upload.competency_ids {
            self.require_competency(competency_id)?;
        }

        let now = Utc::now();
        let id = ArtifactId::new(self.next_id(Collection::Artifacts)?);
        let path = storage_path(&upload.learner_id, &upload.file_name, now);
        let file_url = self.blobs.put(&path, &upload.bytes, file_type.content_type())?;

        let artifact = Artifact {
            id,
            learner_id: upload.learner_id,
            uploaded_by: upload.uploaded_by,
            file_url,
            file_type,
            file_size: upload.bytes.len() as u64,
            file_name: upload.file_name.trim().to_string(),
            competency_ids: dedup(upload.competency_ids),
            created_at: now,
        };

        if let Err(err) = self.store.create(Document::Artifact(artifact.clone())) {
            // Without a record nothing points at the file.
            if let Err(cleanup) = self.blobs.delete(&path) {
                warn!(%path, error = %cleanup, "orphaned artifact blob");
            }
            return Err(err.into());
        }
        info!(artifact_id = %artifact.id, %path, size = artifact.file_size, "artifact uploaded");
        Ok(artifact)
    }

    /// Live rating changes; dropping the subscription releases it.
    pub fn watch_ratings(&self, filter: RatingFilter) -> Result<RatingSubscription, ServiceError> {
        Ok(self.store.subscribe_ratings(filter)?)
    }
}

fn dedup(ids: Vec<CompetencyId>) -> Vec<CompetencyId> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
