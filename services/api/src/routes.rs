use crate::infra::{AppState, EngineState};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use homecare_engine::billing::{InvoiceRequest, InvoicingError};
use homecare_engine::domain::{
    BusinessId, CareTask, Caregiver, Client, ClientId, GpsReading, InvoiceId, Shift, ShiftId,
    Visit, VisitId,
};
use homecare_engine::evv::{Clock, EvvError, VerificationServiceError};
use homecare_engine::matching::{AssignmentError, AssignmentWindow};
use homecare_engine::repository::{InvoiceRepository, RepositoryError, ShiftRepository};
use homecare_engine::scheduling::{
    ClientNeed, DateRange, ScheduleHorizon, ScheduleSuggestion, SchedulingError,
    ServiceRequirement,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionRequest {
    pub(crate) client: Client,
    pub(crate) start: NaiveDateTime,
    pub(crate) end: NaiveDateTime,
    #[serde(default)]
    pub(crate) caregivers: Option<Vec<Caregiver>>,
    #[serde(default)]
    pub(crate) shifts: Option<Vec<Shift>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum SuggestionResponse {
    Ok {
        suggestions: Vec<ScheduleSuggestion>,
    },
    NoSuggestion {
        best_score: Option<i32>,
        threshold: i32,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConflictRequest {
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
    #[serde(default)]
    pub(crate) now: Option<NaiveDateTime>,
    #[serde(default)]
    pub(crate) caregivers: Option<Vec<Caregiver>>,
    #[serde(default)]
    pub(crate) shifts: Option<Vec<Shift>>,
    #[serde(default)]
    pub(crate) requirements: Option<Vec<ServiceRequirement>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignRequest {
    pub(crate) task: CareTask,
    #[serde(default)]
    pub(crate) window: Option<AssignmentWindow>,
    #[serde(default)]
    pub(crate) caregivers: Option<Vec<Caregiver>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ClockRequest {
    #[serde(default)]
    pub(crate) gps: Option<GpsReading>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateInvoicesRequest {
    #[serde(default)]
    pub(crate) business_id: Option<BusinessId>,
    pub(crate) visit_ids: Vec<VisitId>,
    #[serde(default)]
    pub(crate) issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) visits: Option<Vec<Visit>>,
}

/// Engine failures translated into HTTP responses.
#[derive(Debug)]
pub(crate) enum ApiError {
    Verification(VerificationServiceError),
    Assignment(AssignmentError),
    Invoicing(InvoicingError),
    Repository(RepositoryError),
    ShiftNotFound(ShiftId),
    InvoiceNotFound(InvoiceId),
    UnknownClient(ClientId),
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Verification(err) => write!(f, "{}", err),
            ApiError::Assignment(err) => write!(f, "{}", err),
            ApiError::Invoicing(err) => write!(f, "{}", err),
            ApiError::Repository(err) => write!(f, "{}", err),
            ApiError::ShiftNotFound(id) => write!(f, "shift {} not found", id),
            ApiError::InvoiceNotFound(id) => write!(f, "invoice {} not found", id),
            ApiError::UnknownClient(id) => write!(f, "client {} is not on file", id),
            ApiError::InvalidRange { start, end } => {
                write!(f, "date range end {} precedes start {}", end, start)
            }
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Verification(VerificationServiceError::ShiftNotFound(_))
            | ApiError::ShiftNotFound(_) => (StatusCode::NOT_FOUND, "shift_not_found"),
            ApiError::InvoiceNotFound(_) => (StatusCode::NOT_FOUND, "invoice_not_found"),
            ApiError::UnknownClient(_) => (StatusCode::NOT_FOUND, "client_not_found"),
            ApiError::Verification(VerificationServiceError::Evv(err)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, evv_code(err))
            }
            ApiError::Verification(VerificationServiceError::Repository(err))
            | ApiError::Assignment(AssignmentError::Repository(err))
            | ApiError::Invoicing(InvoicingError::Repository(err))
            | ApiError::Repository(err) => repository_status(err),
            ApiError::Assignment(AssignmentError::AlreadyAssigned(_)) => {
                (StatusCode::CONFLICT, "already_assigned")
            }
            ApiError::Assignment(AssignmentError::NoEligibleCaregiver(_)) => {
                (StatusCode::OK, "no_suggestion")
            }
            ApiError::InvalidRange { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_range"),
        }
    }
}

fn evv_code(error: &EvvError) -> &'static str {
    match error {
        EvvError::LocationUnavailable => "location_unavailable",
        EvvError::InvalidStateTransition { .. } => "invalid_state_transition",
        EvvError::CheckOutBeforeCheckIn { .. } => "check_out_before_check_in",
        EvvError::ClientMismatch { .. } => "client_mismatch",
    }
}

fn repository_status(error: &RepositoryError) -> (StatusCode, &'static str) {
    match error {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        RepositoryError::Conflict => (StatusCode::CONFLICT, "conflict"),
        RepositoryError::StaleStatus { .. } => (StatusCode::CONFLICT, "stale_status"),
        RepositoryError::DuplicateInvoice { .. } => (StatusCode::CONFLICT, "duplicate_invoice"),
        RepositoryError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        let body = Json(json!({ "error": self.to_string(), "code": code }));
        (status, body).into_response()
    }
}

impl From<VerificationServiceError> for ApiError {
    fn from(value: VerificationServiceError) -> Self {
        Self::Verification(value)
    }
}

impl From<AssignmentError> for ApiError {
    fn from(value: AssignmentError) -> Self {
        Self::Assignment(value)
    }
}

impl From<InvoicingError> for ApiError {
    fn from(value: InvoicingError) -> Self {
        Self::Invoicing(value)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

pub(crate) fn engine_router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route("/api/v1/schedule/suggestions", post(suggestions_endpoint))
        .route("/api/v1/schedule/conflicts", post(conflicts_endpoint))
        .route("/api/v1/tasks/assign", post(assign_endpoint))
        .route("/api/v1/shifts/:shift_id", get(shift_endpoint))
        .route("/api/v1/shifts/:shift_id/clock-in", post(clock_in_endpoint))
        .route("/api/v1/shifts/:shift_id/clock-out", post(clock_out_endpoint))
        .route("/api/v1/shifts/:shift_id/missed", post(mark_missed_endpoint))
        .route("/api/v1/shifts/:shift_id/cancel", post(cancel_endpoint))
        .route("/api/v1/invoices/generate", post(generate_invoices_endpoint))
        .route("/api/v1/invoices/:invoice_id", get(invoice_endpoint))
        .with_state(state)
}

pub(crate) fn with_engine_routes(state: Arc<EngineState>) -> Router {
    engine_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn suggestions_endpoint(
    State(state): State<Arc<EngineState>>,
    Json(payload): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let shifts = match payload.shifts {
        Some(shifts) => shifts,
        None => state.shifts.all()?,
    };
    let caregivers = payload.caregivers.unwrap_or_else(|| state.caregivers.clone());
    let need = ClientNeed {
        client: payload.client,
        start: payload.start,
        end: payload.end,
    };

    let response = match state.scorer.suggest(&need, &caregivers, &shifts) {
        Ok(suggestions) => SuggestionResponse::Ok { suggestions },
        Err(SchedulingError::NoEligibleCaregiver {
            best_score,
            threshold,
        }) => SuggestionResponse::NoSuggestion {
            best_score,
            threshold,
        },
    };
    Ok(Json(response))
}

pub(crate) async fn conflicts_endpoint(
    State(state): State<Arc<EngineState>>,
    Json(payload): Json<ConflictRequest>,
) -> Result<Response, ApiError> {
    let range = DateRange::new(payload.start, payload.end).ok_or(ApiError::InvalidRange {
        start: payload.start,
        end: payload.end,
    })?;
    let shifts = match payload.shifts {
        Some(shifts) => shifts,
        None => state.shifts.all()?,
    };
    let caregivers = payload.caregivers.unwrap_or_else(|| state.caregivers.clone());
    let requirements = payload
        .requirements
        .unwrap_or_else(|| state.requirements.clone());
    let now = payload.now.unwrap_or_else(|| state.clock.now());

    let horizon = ScheduleHorizon {
        range,
        shifts: &shifts,
        caregivers: &caregivers,
        requirements: &requirements,
    };
    let report = state.detector.detect(&horizon, now);
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub(crate) async fn assign_endpoint(
    State(state): State<Arc<EngineState>>,
    Json(payload): Json<AssignRequest>,
) -> Result<Response, ApiError> {
    let caregivers = payload.caregivers.unwrap_or_else(|| state.caregivers.clone());
    match state
        .assignments
        .auto_assign(&payload.task, &caregivers, payload.window)
    {
        Ok(outcome) => Ok((StatusCode::CREATED, Json(outcome)).into_response()),
        Err(AssignmentError::NoEligibleCaregiver(task_id)) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "no_suggestion", "task_id": task_id })),
        )
            .into_response()),
        Err(other) => Err(other.into()),
    }
}

fn load_shift(state: &EngineState, shift_id: &ShiftId) -> Result<Shift, ApiError> {
    state
        .shifts
        .fetch(shift_id)?
        .ok_or_else(|| ApiError::ShiftNotFound(shift_id.clone()))
}

fn client_for(state: &EngineState, shift: &Shift) -> Result<Client, ApiError> {
    state
        .clients
        .get(&shift.client_id)
        .cloned()
        .ok_or_else(|| ApiError::UnknownClient(shift.client_id.clone()))
}

pub(crate) async fn shift_endpoint(
    State(state): State<Arc<EngineState>>,
    Path(shift_id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    load_shift(&state, &ShiftId::new(shift_id)).map(Json)
}

pub(crate) async fn clock_in_endpoint(
    State(state): State<Arc<EngineState>>,
    Path(shift_id): Path<String>,
    Json(payload): Json<ClockRequest>,
) -> Result<Json<Shift>, ApiError> {
    let shift_id = ShiftId::new(shift_id);
    let client = client_for(&state, &load_shift(&state, &shift_id)?)?;
    let shift = state.verification.clock_in(&shift_id, &client, payload.gps)?;
    Ok(Json(shift))
}

pub(crate) async fn clock_out_endpoint(
    State(state): State<Arc<EngineState>>,
    Path(shift_id): Path<String>,
    Json(payload): Json<ClockRequest>,
) -> Result<Json<Shift>, ApiError> {
    let shift_id = ShiftId::new(shift_id);
    let client = client_for(&state, &load_shift(&state, &shift_id)?)?;
    let shift = state.verification.clock_out(&shift_id, &client, payload.gps)?;
    Ok(Json(shift))
}

pub(crate) async fn mark_missed_endpoint(
    State(state): State<Arc<EngineState>>,
    Path(shift_id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    let shift = state.verification.mark_missed(&ShiftId::new(shift_id))?;
    Ok(Json(shift))
}

pub(crate) async fn cancel_endpoint(
    State(state): State<Arc<EngineState>>,
    Path(shift_id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    let shift = state.verification.cancel(&ShiftId::new(shift_id))?;
    Ok(Json(shift))
}

pub(crate) async fn generate_invoices_endpoint(
    State(state): State<Arc<EngineState>>,
    Json(payload): Json<GenerateInvoicesRequest>,
) -> Result<Response, ApiError> {
    let request = InvoiceRequest {
        business_id: payload
            .business_id
            .unwrap_or_else(|| state.business_id.clone()),
        visit_ids: payload.visit_ids,
        issued_on: payload
            .issued_on
            .unwrap_or_else(|| state.clock.now().date()),
    };
    let visits = payload.visits.unwrap_or_else(|| state.visits.clone());

    let batch = state.invoicing.generate(&request, &visits, &state.rates)?;
    let status = if batch.invoices.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(batch)).into_response())
}

pub(crate) async fn invoice_endpoint(
    State(state): State<Arc<EngineState>>,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Response, ApiError> {
    let invoice = state
        .invoices
        .fetch(&invoice_id)?
        .ok_or(ApiError::InvoiceNotFound(invoice_id))?;
    Ok((StatusCode::OK, Json(invoice)).into_response())
}
