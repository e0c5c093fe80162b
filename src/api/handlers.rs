//! HTTP request handlers for the gateway.
//!
//! This module contains the handler functions for all API endpoints.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WizardDefinition;
use crate::error::AdminError;
use crate::grading::{GradingAggregator, GradingSummary};
use crate::models::Batch;
use crate::wizard::lookup::load_list;
use crate::wizard::{StagedForm, SubmissionOutcome, batches_for_department};

use super::request::{BatchQuery, SubmitRequest, ValidateRequest, session_from_headers};
use super::response::{ApiError, ApiErrorResponse, BatchOptions, ValidateResponse};
use super::state::AppState;

type ApiResult<T> = Result<T, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/wizards/:kind", get(wizard_handler))
        .route("/wizards/:kind/validate", post(validate_handler))
        .route("/wizards/:kind/submit", post(submit_handler))
        .route("/lookup/batches", get(batches_handler))
        .route("/attempts/:id/summary", get(summary_handler))
        .route("/attempts/:id/regrade", post(regrade_handler))
        .with_state(state)
}

/// Turns a handler result into a response, logging failures.
fn respond<T: Serialize>(correlation_id: Uuid, started: Instant, result: ApiResult<T>) -> Response {
    match result {
        Ok(body) => {
            info!(
                correlation_id = %correlation_id,
                duration_us = started.elapsed().as_micros(),
                "Request completed"
            );
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(error) => {
            warn!(
                correlation_id = %correlation_id,
                status = error.status.as_u16(),
                code = %error.error.code,
                message = %error.error.message,
                "Request failed"
            );
            error.into_response()
        }
    }
}

/// Unwraps a JSON body, mapping rejections to 400 responses.
fn read_json<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            let error = match rejection {
                JsonRejection::JsonDataError(err) => {
                    let body_text = err.body_text();
                    if body_text.contains("missing field") {
                        ApiError::new("VALIDATION_ERROR", body_text)
                    } else {
                        ApiError::malformed_json(body_text)
                    }
                }
                JsonRejection::JsonSyntaxError(err) => {
                    ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
                }
                JsonRejection::MissingJsonContentType(_) => {
                    ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
                }
                _ => ApiError::malformed_json("Failed to parse request body"),
            };
            Err(ApiErrorResponse::bad_request(error))
        }
    }
}

/// Handler for GET /wizards/:kind.
///
/// Returns the wizard definition so the front end can render its steps.
async fn wizard_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    info!(correlation_id = %correlation_id, kind = %kind, "Fetching wizard definition");
    respond(correlation_id, started, wizard_definition(&state, &kind, &headers))
}

fn wizard_definition(state: &AppState, kind: &str, headers: &HeaderMap) -> ApiResult<WizardDefinition> {
    let context = session_from_headers(headers)?;
    let wizard = state.config().wizard(kind)?;
    if !wizard.allows(context.role) {
        return Err(AdminError::Forbidden {
            role: context.role,
            action: format!("use the {kind} wizard"),
        }
        .into());
    }
    Ok(wizard.as_ref().clone())
}

/// Handler for POST /wizards/:kind/validate.
///
/// Checks one step of a client-held draft without saving anything.
async fn validate_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    info!(correlation_id = %correlation_id, kind = %kind, "Validating wizard step");
    respond(correlation_id, started, validate_step(&state, &kind, &headers, payload))
}

fn validate_step(
    state: &AppState,
    kind: &str,
    headers: &HeaderMap,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> ApiResult<ValidateResponse> {
    let context = session_from_headers(headers)?;
    let request = read_json(payload)?;
    let wizard = state.config().wizard(kind)?;

    if wizard.step(request.step).is_none() {
        return Err(ApiErrorResponse::bad_request(ApiError::with_details(
            "INVALID_STEP",
            format!("Step {} does not exist", request.step),
            format!("The {kind} wizard has {} steps", wizard.step_count()),
        )));
    }

    let form = StagedForm::new(wizard, context)?.with_draft(request.draft);
    let errors = form.check_step(request.step);
    if !errors.is_empty() {
        return Err(AdminError::ValidationFailed {
            step: request.step,
            errors,
        }
        .into());
    }

    Ok(ValidateResponse {
        step: request.step,
        valid: true,
    })
}

/// Handler for POST /wizards/:kind/submit.
///
/// Validates every step, then creates (or updates, when `entity_id` is
/// given) the entity and its related record.
async fn submit_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    info!(correlation_id = %correlation_id, kind = %kind, "Processing submission");
    respond(correlation_id, started, submit(&state, &kind, &headers, payload).await)
}

async fn submit(
    state: &AppState,
    kind: &str,
    headers: &HeaderMap,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<SubmissionOutcome> {
    let context = session_from_headers(headers)?;
    let request = read_json(payload)?;
    let wizard = state.config().wizard(kind)?;

    let mut form = StagedForm::new(wizard, context)?.with_draft(request.draft);
    if let Some(id) = request.entity_id {
        form = form.with_entity_id(id);
    }
    Ok(form.submit(state.backend()).await?)
}

/// Handler for GET /lookup/batches.
///
/// Returns the batches of a department. A failed load yields an empty list
/// with a warning notice rather than an error.
async fn batches_handler(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    info!(
        correlation_id = %correlation_id,
        department = query.department.as_deref().unwrap_or("<all>"),
        "Looking up batches"
    );
    respond(correlation_id, started, batch_options(&state, &query, &headers).await)
}

async fn batch_options(
    state: &AppState,
    query: &BatchQuery,
    headers: &HeaderMap,
) -> ApiResult<BatchOptions> {
    session_from_headers(headers)?;
    let endpoints = &state.config().client().reference;

    let mut notices = Vec::new();
    let all: Vec<Batch> = load_list(
        state.backend(),
        &endpoints.batches,
        "batches",
        &mut notices,
    )
    .await;

    let batches = match query.department.as_deref().filter(|d| !d.is_empty()) {
        Some(department) => batches_for_department(&all, department)
            .into_iter()
            .cloned()
            .collect(),
        None => all,
    };
    Ok(BatchOptions { batches, notices })
}

/// Handler for GET /attempts/:id/summary.
async fn summary_handler(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    info!(correlation_id = %correlation_id, attempt = %attempt_id, "Fetching grading summary");
    respond(correlation_id, started, grading_summary(&state, &attempt_id, &headers, false).await)
}

/// Handler for POST /attempts/:id/regrade.
///
/// Asks the backend to recompute objective grades and returns the new
/// summary.
async fn regrade_handler(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    info!(correlation_id = %correlation_id, attempt = %attempt_id, "Regrading attempt");
    respond(correlation_id, started, grading_summary(&state, &attempt_id, &headers, true).await)
}

async fn grading_summary(
    state: &AppState,
    attempt_id: &str,
    headers: &HeaderMap,
    regrade: bool,
) -> ApiResult<GradingSummary> {
    let context = session_from_headers(headers)?;
    let mut grading = GradingAggregator::load(state.backend(), context, attempt_id).await?;
    if regrade {
        grading.regrade(state.backend()).await?;
    }
    Ok(grading.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::backend::{InMemoryBackend, Operation};
    use crate::config::ConfigLoader;

    fn create_test_state(backend: Arc<InMemoryBackend>) -> AppState {
        let config = ConfigLoader::load("./config/university").expect("Failed to load config");
        AppState::new(config, backend)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_get_wizard_definition() {
        let router = create_router(create_test_state(Arc::new(InMemoryBackend::new())));
        let (status, body) = send(
            router,
            Request::builder()
                .uri("/wizards/student")
                .header("x-actor-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "student");
        assert_eq!(body["steps"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_wizard_is_404() {
        let router = create_router(create_test_state(Arc::new(InMemoryBackend::new())));
        let (status, body) = send(
            router,
            Request::builder()
                .uri("/wizards/alumni")
                .header("x-actor-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "WIZARD_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let router = create_router(create_test_state(Arc::new(InMemoryBackend::new())));
        let (status, body) = send(
            router,
            Request::builder()
                .method("POST")
                .uri("/wizards/student/submit")
                .header("x-actor-role", "admin")
                .header("Content-Type", "application/json")
                .body(Body::from("{invalid json"))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_submit_without_role_makes_no_calls() {
        let backend = Arc::new(InMemoryBackend::new());
        let router = create_router(create_test_state(backend.clone()));
        let (status, body) = send(
            router,
            Request::builder()
                .method("POST")
                .uri("/wizards/staff/submit")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"draft": {}}).to_string()))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
        assert!(backend.calls_of(Operation::Create).is_empty());
    }
}
