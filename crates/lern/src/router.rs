use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::artifacts::{ArtifactUpload, BlobStore};
use crate::domain::{CompetencyId, RaterType, RatingId, RatingScore, UserId, MAX_ARTIFACT_SIZE};
use crate::onboarding::OnboardingRequest;
use crate::ratings::{MentorRating, RatingError, RatingRequest};
use crate::search::{HiddenPolicy, SearchCriterion, SearchOptions};
use crate::service::{LernService, NewCompetency, ServiceError};
use crate::store::{LernRepository, RepositoryError};
use crate::suggestions::SuggestionError;

/// Router builder exposing the LERN JSON API under `/api/v1`.
pub fn lern_router<S, B>(service: Arc<LernService<S, B>>) -> Router
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/competencies",
            get(list_competencies_handler::<S, B>).post(create_competency_handler::<S, B>),
        )
        .route("/api/v1/learners", post(onboard_handler::<S, B>))
        .route(
            "/api/v1/learners/:learner_id/portfolio",
            get(portfolio_handler::<S, B>),
        )
        .route(
            "/api/v1/learners/:learner_id/progress",
            get(progress_handler::<S, B>),
        )
        .route(
            "/api/v1/learners/:learner_id/artifacts",
            post(upload_artifact_handler::<S, B>)
                .layer(DefaultBodyLimit::max(MAX_ARTIFACT_SIZE as usize + 1)),
        )
        .route("/api/v1/learner/visibility", post(visibility_handler::<S, B>))
        .route(
            "/api/v1/learner/display-order",
            post(display_order_handler::<S, B>),
        )
        .route("/api/v1/search", post(search_handler::<S, B>))
        .route("/api/v1/ratings", post(mentor_rating_handler::<S, B>))
        .route(
            "/api/v1/ratings/requests",
            post(request_ratings_handler::<S, B>),
        )
        .route(
            "/api/v1/ratings/:rating_id/complete",
            post(complete_rating_handler::<S, B>),
        )
        .route(
            "/api/v1/raters/:rater_id/pending",
            get(pending_handler::<S, B>),
        )
        .route(
            "/api/v1/analyze-transcript",
            post(analyze_transcript_handler::<S, B>),
        )
        .with_state(service)
}

/// HTTP status for each service failure.
pub fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Repository(RepositoryError::NotFound { .. }) => StatusCode::NOT_FOUND,
        ServiceError::Repository(RepositoryError::Conflict { .. }) => StatusCode::CONFLICT,
        ServiceError::Repository(RepositoryError::Unavailable(_)) | ServiceError::Blob(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ServiceError::Rating(RatingError::AlreadyCompleted(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Rating(RatingError::NothingRequested) => StatusCode::BAD_REQUEST,
        ServiceError::Suggestion(SuggestionError::EmptyTranscript)
        | ServiceError::Suggestion(SuggestionError::EmptyCatalog) => StatusCode::BAD_REQUEST,
        ServiceError::Suggestion(SuggestionError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Suggestion(SuggestionError::Transport(_))
        | ServiceError::Suggestion(SuggestionError::MalformedResponse(_)) => StatusCode::BAD_GATEWAY,
    }
}

pub(crate) fn error_response(error: ServiceError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(error = %error, status = status.as_u16(), "request failed");
    } else {
        warn!(error = %error, status = status.as_u16(), "request rejected");
    }

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Malformed bodies are a plain 400 rather than axum's default 422.
fn read_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        let payload = json!({ "error": rejection.body_text() });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

pub(crate) async fn list_competencies_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.competencies())
}

pub(crate) async fn create_competency_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<NewCompetency>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    match read_json(payload) {
        Ok(draft) => respond(StatusCode::CREATED, service.create_competency(draft)),
        Err(response) => response,
    }
}

pub(crate) async fn portfolio_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    Path(learner_id): Path<String>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.public_portfolio(&UserId::new(learner_id)),
    )
}

pub(crate) async fn progress_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    Path(learner_id): Path<String>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.progress(&UserId::new(learner_id)))
}

pub(crate) async fn onboard_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<OnboardingRequest>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    let request = match read_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match service.onboard_learner(request) {
        Ok(batch) => {
            let payload = json!({
                "learner": batch.learner,
                "ratings": batch.ratings,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VisibilityUpdate {
    learner_id: UserId,
    hidden_competency_ids: Vec<CompetencyId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DisplayOrderUpdate {
    learner_id: UserId,
    display_order: Vec<CompetencyId>,
}

pub(crate) async fn visibility_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<VisibilityUpdate>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    let update = match read_json(payload) {
        Ok(update) => update,
        Err(response) => return response,
    };

    match service.update_visibility(&update.learner_id, update.hidden_competency_ids) {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn display_order_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<DisplayOrderUpdate>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    let update = match read_json(payload) {
        Ok(update) => update,
        Err(response) => return response,
    };

    match service.update_display_order(&update.learner_id, update.display_order) {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequest {
    criteria: Vec<SearchCriterion>,
    #[serde(default)]
    hidden_policy: Option<HiddenPolicy>,
}

pub(crate) async fn search_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    let request = match read_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let result = match request.hidden_policy {
        Some(hidden_policy) => {
            service.search_with(&request.criteria, &SearchOptions { hidden_policy })
        }
        None => service.search(&request.criteria),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn mentor_rating_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<MentorRating>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    match read_json(payload) {
        Ok(rating) => respond(StatusCode::CREATED, service.add_mentor_rating(rating)),
        Err(response) => response,
    }
}

pub(crate) async fn request_ratings_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<RatingRequest>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    match read_json(payload) {
        Ok(request) => respond(StatusCode::CREATED, service.request_ratings(request)),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompleteRating {
    score: RatingScore,
    #[serde(default)]
    comment: Option<String>,
}

pub(crate) async fn complete_rating_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    Path(rating_id): Path<String>,
    payload: Result<Json<CompleteRating>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    match read_json(payload) {
        Ok(body) => respond(
            StatusCode::OK,
            service.complete_rating(&RatingId::new(rating_id), body.score, body.comment),
        ),
        Err(response) => response,
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PendingQuery {
    #[serde(default)]
    rater_type: Option<RaterType>,
}

pub(crate) async fn pending_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    Path(rater_id): Path<String>,
    Query(query): Query<PendingQuery>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.pending_for_rater(&UserId::new(rater_id), query.rater_type),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptRequest {
    transcript: String,
}

pub(crate) async fn analyze_transcript_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    let request = match read_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match service.analyze_transcript(&request.transcript).await {
        Ok(suggestions) => {
            (StatusCode::OK, Json(json!({ "suggestions": suggestions }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    file_name: String,
    /// Comma separated.
    competency_ids: String,
    #[serde(default)]
    uploaded_by: Option<UserId>,
}

pub(crate) async fn upload_artifact_handler<S, B>(
    State(service): State<Arc<LernService<S, B>>>,
    Path(learner_id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response
where
    S: LernRepository + 'static,
    B: BlobStore + 'static,
{
    let uploaded_by = query
        .uploaded_by
        .unwrap_or_else(|| service.context().educator_id.clone());
    let competency_ids = query
        .competency_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(CompetencyId::from)
        .collect();

    let upload = ArtifactUpload {
        learner_id: UserId::new(learner_id),
        uploaded_by,
        file_name: query.file_name,
        competency_ids,
        bytes: body.to_vec(),
    };

    respond(StatusCode::CREATED, service.upload_artifact(upload))
}
