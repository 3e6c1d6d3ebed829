use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CreateIntegrationRequest, IntegrationResponse, UpdateIntegrationRequest};
use crate::services::IntegrationService;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Business operations, wired with their store, cache and breakers.
    pub service: IntegrationService,
}

type Created = (StatusCode, [(header::HeaderName, String); 1], Json<IntegrationResponse>);

/// Health check endpoint.
///
/// Returns the service status, version and the state of every circuit breaker.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-bank-integration",
            "version": env!("CARGO_PKG_VERSION"),
            "circuits": state.service.resilience().states(),
        })),
    )
}

/// GET /v1/bank/findAll
///
/// Lists every registered record. An unavailable store yields an empty list.
#[utoipa::path(
    get,
    path = "/v1/bank/findAll",
    tag = "bank",
    responses((status = 200, description = "All registered records", body = [IntegrationResponse]))
)]
pub async fn find_all(State(state): State<Arc<AppState>>) -> Json<Vec<IntegrationResponse>> {
    tracing::info!("getAll executed");

    let records = state.service.find_all().await;
    Json(records.into_iter().map(IntegrationResponse::from).collect())
}

/// GET /v1/bank/findById/:id
#[utoipa::path(
    get,
    path = "/v1/bank/findById/{id}",
    tag = "bank",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record found", body = IntegrationResponse),
        (status = 404, description = "No record with this id")
    )
)]
pub async fn find_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<IntegrationResponse>, AppError> {
    tracing::info!("findById executed {}", id);

    state
        .service
        .find_by_id(&id)
        .await
        .map(|record| Json(record.into()))
        .ok_or_else(|| AppError::NotFound(format!("Record with id {} not found", id)))
}

/// GET /v1/bank/findByIdentityDni/:dni
#[utoipa::path(
    get,
    path = "/v1/bank/findByIdentityDni/{dni}",
    tag = "bank",
    params(("dni" = String, Path, description = "Identity document number")),
    responses(
        (status = 200, description = "Record found", body = IntegrationResponse),
        (status = 404, description = "No record with this identity document")
    )
)]
pub async fn find_by_identity_dni(
    State(state): State<Arc<AppState>>,
    Path(dni): Path<String>,
) -> Result<Json<IntegrationResponse>, AppError> {
    tracing::info!("findByIdentityDni executed {}", dni);

    state
        .service
        .find_by_identity_dni(&dni)
        .await
        .map(|record| Json(record.into()))
        .ok_or_else(|| AppError::NotFound(format!("Record with identity document {} not found", dni)))
}

/// POST /v1/bank/
///
/// Registers a new record. The registration date is set to today.
#[utoipa::path(
    post,
    path = "/v1/bank/",
    tag = "bank",
    request_body = CreateIntegrationRequest,
    responses(
        (status = 201, description = "Record created", body = IntegrationResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Record could not be stored"),
        (status = 409, description = "Identity document already registered")
    )
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateIntegrationRequest>, JsonRejection>,
) -> Result<Created, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("create executed {:?}", request);

    let record = request.validate()?;
    let stored = state
        .service
        .create(record)
        .await?
        .ok_or_else(|| AppError::NotFound("Record could not be stored".to_string()))?;

    Ok(created(&state.config, stored.into()))
}

/// PUT /v1/bank/:id
///
/// Replaces the supplied fields of a record. `id` and `dateRegister` never change.
#[utoipa::path(
    put,
    path = "/v1/bank/{id}",
    tag = "bank",
    params(("id" = String, Path, description = "Record id")),
    request_body = UpdateIntegrationRequest,
    responses(
        (status = 201, description = "Record updated", body = IntegrationResponse),
        (status = 400, description = "Invalid payload or no record with this id"),
        (status = 409, description = "Identity document already registered")
    )
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateIntegrationRequest>, JsonRejection>,
) -> Result<Created, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("updateById executed {}:{:?}", id, request);

    let patch = request.validate()?;
    let stored = state
        .service
        .update(&id, patch)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Record with id {} could not be updated", id)))?;

    Ok(created(&state.config, stored.into()))
}

/// DELETE /v1/bank/:id
#[utoipa::path(
    delete,
    path = "/v1/bank/{id}",
    tag = "bank",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "No record with this id")
    )
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("deleteById executed {}", id);

    state
        .service
        .delete(&id)
        .await
        .map(|_| StatusCode::OK)
        .ok_or_else(|| AppError::NotFound(format!("Record with id {} not found", id)))
}

fn created(config: &Config, body: IntegrationResponse) -> Created {
    let location = format!("{}/bankIntegration/{}", config.public_base_url, body.id);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body))
}
