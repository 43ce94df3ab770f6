use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::artifacts::MemoryBlobStore;
use crate::router::{portfolio_handler, status_for};
use crate::service::ServiceError;
use crate::store::RepositoryError;
use crate::suggestions::SuggestionError;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn portfolio_route_returns_visible_competencies() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(get("/api/v1/learners/learner-maya/portfolio"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let ids: Vec<&str> = payload["competencies"]
        .as_array()
        .expect("competency list")
        .iter()
        .filter_map(|entry| entry["competency_id"].as_str())
        .collect();
    assert_eq!(ids, vec!["comp-collaboration", "comp-python"]);
}

#[tokio::test]
async fn progress_route_returns_running_averages() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(get("/api/v1/learners/learner-maya/progress"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let python = payload
        .as_array()
        .expect("series list")
        .iter()
        .find(|series| series["competency_id"] == "comp-python")
        .expect("python series");
    let averages: Vec<f64> = python["points"]
        .as_array()
        .expect("points")
        .iter()
        .filter_map(|point| point["running_average"].as_f64())
        .collect();
    assert_eq!(averages, vec![3.0, 3.5]);
}

#[tokio::test]
async fn portfolio_handler_returns_not_found_for_unknown_learner() {
    let (service, _, _) = build_service();
    let response = portfolio_handler(State(Arc::new(service)), Path("ghost".to_string())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().is_some_and(|error| error.contains("ghost")));
}

#[tokio::test]
async fn portfolio_handler_returns_internal_error_when_store_is_down() {
    let response = portfolio_handler::<UnavailableStore, MemoryBlobStore>(
        State(Arc::new(unavailable_service())),
        Path("learner-maya".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn search_route_matches_thresholds() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/search",
            json!({ "criteria": [{ "competency_id": "comp-python", "min_rating": 3.0 }] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let matches = payload.as_array().expect("match list");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["learner"]["id"], "learner-maya");
    assert_eq!(matches[0]["matched_competencies"][0]["average"], 3.5);
}

#[tokio::test]
async fn search_route_rejects_empty_criteria() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json("/api/v1/search", json!({ "criteria": [] })))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn visibility_route_rejects_malformed_payloads() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/learner/visibility",
            json!({ "learnerId": "learner-maya", "hiddenCompetencyIds": "comp-python" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn display_order_route_saves_order() {
    let (service, store, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/learner/display-order",
            json!({ "learnerId": "learner-jordan", "displayOrder": ["comp-web-dev", "comp-python"] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await, json!({ "success": true }));
    let stored = crate::store::LernRepository::user(
        store.as_ref(),
        &crate::domain::UserId::from("learner-jordan"),
    )
    .expect("read")
    .expect("user exists");
    assert_eq!(
        stored
            .competency_display_order
            .expect("order saved")
            .len(),
        2
    );
}

#[tokio::test]
async fn completing_a_rating_twice_is_unprocessable() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let first = router
        .clone()
        .oneshot(post_json(
            "/api/v1/ratings/seed-7/complete",
            json!({ "score": 3, "comment": "Led the retro" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(post_json(
            "/api/v1/ratings/seed-7/complete",
            json!({ "score": 1 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn out_of_scale_score_is_a_bad_request() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/ratings/seed-7/complete",
            json!({ "score": 5 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_route_filters_by_rater_type() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(get("/api/v1/raters/learner-jordan/pending?rater_type=self"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    assert_eq!(payload[0]["status"], "pending");
}

#[tokio::test]
async fn onboarding_route_creates_learner() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/learners",
            json!({
                "display_name": "Sam Rivera",
                "email": "sam@demo.edu",
                "ratings": [{ "competency_id": "comp-collaboration", "score": 4 }]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["learner"]["display_name"], "Sam Rivera");
    assert_eq!(payload["ratings"][0]["rater_type"], "mentor");
}

#[tokio::test]
async fn transcript_route_wraps_suggestions() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/analyze-transcript",
            json!({ "transcript": "Automated grading in Python" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["suggestions"][0]["competency_id"], "comp-python");
}

#[tokio::test]
async fn artifact_route_accepts_raw_bodies() {
    let (service, _, blobs) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::post(
                "/api/v1/learners/learner-maya/artifacts?file_name=demo.png&competency_ids=comp-python,comp-web-dev",
            )
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(vec![0x89, b'P', b'N', b'G']))
            .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["file_type"], "png");
    assert_eq!(payload["competency_ids"], json!(["comp-python", "comp-web-dev"]));
    assert_eq!(blobs.len(), 1);
}

#[test]
fn status_mapping_covers_upstream_failures() {
    assert_eq!(
        status_for(&ServiceError::Suggestion(SuggestionError::MalformedResponse(
            "not json".to_string()
        ))),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        status_for(&ServiceError::Suggestion(SuggestionError::NotConfigured)),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        status_for(&ServiceError::Repository(RepositoryError::Conflict {
            collection: "users",
            id: "user-000001".to_string(),
        })),
        StatusCode::CONFLICT
    );
}
