//! JSON endpoints for quoting, booking and ticket status updates.
//!
//! - `POST /api/v1/quotes`: price a repair without booking it
//! - `POST /api/v1/bookings`: open a ticket with a fresh quote
//! - `GET  /api/v1/bookings/{ticket_id}`: read a ticket
//! - `POST /api/v1/bookings/{ticket_id}/status`: move a ticket to a new status
//! - `POST /api/v1/bookings/{ticket_id}/quote`: replace an expired or stale quote

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reviva_core::{
    ActorId, ApplicationError, BookingService, ContextFactors, CreateBookingRequest, CustomerId,
    DeviceId, InterfaceError, Quote, QuoteEngine, QuoteRequest, ReissueQuoteRequest,
    RepairTicket, RepairTypeId, TicketId, TicketRepository, TicketStatus, UpdateStatusRequest,
    UrgencyLevel, WorkflowAction,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

pub struct ApiState<E, R> {
    booking: Arc<BookingService<E, R>>,
}

impl<E, R> Clone for ApiState<E, R> {
    fn clone(&self) -> Self {
        Self { booking: Arc::clone(&self.booking) }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuoteBody {
    pub device_id: String,
    pub repair_type_id: String,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    #[serde(default)]
    pub context: ContextFactors,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub customer_id: String,
    pub device_id: String,
    pub repair_type_id: String,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    #[serde(default)]
    pub context: ContextFactors,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
    pub actor_id: String,
    pub notes: Option<String>,
    #[serde(default = "default_notify")]
    pub notify_customer: bool,
    pub expected_version: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReissueQuoteBody {
    pub actor_id: String,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    #[serde(default)]
    pub context: ContextFactors,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub ticket: RepairTicket,
    pub actions: Vec<WorkflowAction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: Option<String>,
    pub retryable: bool,
    pub correlation_id: String,
}

fn default_urgency() -> String {
    UrgencyLevel::Standard.as_str().to_string()
}

fn default_notify() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    error: InterfaceError,
    retryable: bool,
}

impl ApiError {
    fn application(error: ApplicationError, correlation_id: &str) -> Self {
        let retryable = error.is_retryable();
        warn!(
            event_name = "system.server.request_failed",
            correlation_id,
            retryable,
            error = %error,
            "booking request failed"
        );
        Self { error: error.into_interface(correlation_id), retryable }
    }

    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        let message = message.into();
        warn!(
            event_name = "system.server.request_rejected",
            correlation_id,
            error = %message,
            "booking request rejected"
        );
        Self {
            error: InterfaceError::BadRequest {
                message,
                correlation_id: correlation_id.to_string(),
            },
            retryable: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // storage and configuration details stay in the logs
        let detail = match &self.error {
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => None,
            other => Some(other.message().to_string()),
        };
        let correlation_id = self.error.correlation_id().to_string();
        let body = ErrorBody {
            error: self.error.user_message().to_string(),
            detail,
            retryable: self.retryable,
            correlation_id: correlation_id.clone(),
        };

        (status, [(CORRELATION_HEADER, correlation_id)], Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router<E, R>(booking: Arc<BookingService<E, R>>) -> Router
where
    E: QuoteEngine + 'static,
    R: TicketRepository + 'static,
{
    Router::new()
        .route("/api/v1/quotes", post(calculate_quote::<E, R>))
        .route("/api/v1/bookings", post(create_booking::<E, R>))
        .route("/api/v1/bookings/{ticket_id}", get(get_ticket::<E, R>))
        .route("/api/v1/bookings/{ticket_id}/status", post(update_status::<E, R>))
        .route("/api/v1/bookings/{ticket_id}/quote", post(reissue_quote::<E, R>))
        .with_state(ApiState { booking })
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

fn parse_urgency(value: &str, correlation_id: &str) -> Result<UrgencyLevel, ApiError> {
    value
        .parse::<UrgencyLevel>()
        .map_err(|error| ApiError::application(error.into(), correlation_id))
}

fn require_actor(value: String, correlation_id: &str) -> Result<ActorId, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request("actor_id must not be empty", correlation_id));
    }
    Ok(ActorId(value))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn calculate_quote<E, R>(
    State(state): State<ApiState<E, R>>,
    headers: HeaderMap,
    Json(body): Json<QuoteBody>,
) -> Result<Json<Quote>, ApiError>
where
    E: QuoteEngine + 'static,
    R: TicketRepository + 'static,
{
    let correlation_id = correlation_id(&headers);
    let request = QuoteRequest {
        device_id: DeviceId(body.device_id),
        repair_type_id: RepairTypeId(body.repair_type_id),
        urgency: parse_urgency(&body.urgency, &correlation_id)?,
        context: body.context,
    };

    state
        .booking
        .calculate_quote(&request)
        .map(Json)
        .map_err(|error| ApiError::application(error, &correlation_id))
}

async fn create_booking<E, R>(
    State(state): State<ApiState<E, R>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<RepairTicket>), ApiError>
where
    E: QuoteEngine + 'static,
    R: TicketRepository + 'static,
{
    let correlation_id = correlation_id(&headers);
    if body.customer_id.trim().is_empty() {
        return Err(ApiError::bad_request("customer_id must not be empty", &correlation_id));
    }
    let request = CreateBookingRequest {
        customer_id: CustomerId(body.customer_id),
        device_id: DeviceId(body.device_id),
        repair_type_id: RepairTypeId(body.repair_type_id),
        urgency: parse_urgency(&body.urgency, &correlation_id)?,
        context: body.context,
    };

    let ticket = state
        .booking
        .create_booking(request, &correlation_id)
        .await
        .map_err(|error| ApiError::application(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn get_ticket<E, R>(
    State(state): State<ApiState<E, R>>,
    Path(ticket_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RepairTicket>, ApiError>
where
    E: QuoteEngine + 'static,
    R: TicketRepository + 'static,
{
    let correlation_id = correlation_id(&headers);
    state
        .booking
        .get_ticket(&TicketId(ticket_id))
        .await
        .map(Json)
        .map_err(|error| ApiError::application(error, &correlation_id))
}

async fn update_status<E, R>(
    State(state): State<ApiState<E, R>>,
    Path(ticket_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<StatusUpdateResponse>, ApiError>
where
    E: QuoteEngine + 'static,
    R: TicketRepository + 'static,
{
    let correlation_id = correlation_id(&headers);
    let target = TicketStatus::parse(&body.status).ok_or_else(|| {
        ApiError::bad_request(format!("unknown ticket status `{}`", body.status), &correlation_id)
    })?;
    let actor = require_actor(body.actor_id, &correlation_id)?;

    let mut request = UpdateStatusRequest::new(TicketId(ticket_id), target, actor);
    if let Some(notes) = body.notes {
        request = request.with_notes(notes);
    }
    if let Some(version) = body.expected_version {
        request = request.expecting_version(version);
    }
    if !body.notify_customer {
        request = request.without_notification();
    }

    let outcome = state
        .booking
        .update_status(request, &correlation_id)
        .await
        .map_err(|error| ApiError::application(error, &correlation_id))?;
    Ok(Json(StatusUpdateResponse { ticket: outcome.ticket, actions: outcome.actions }))
}

async fn reissue_quote<E, R>(
    State(state): State<ApiState<E, R>>,
    Path(ticket_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ReissueQuoteBody>,
) -> Result<Json<RepairTicket>, ApiError>
where
    E: QuoteEngine + 'static,
    R: TicketRepository + 'static,
{
    let correlation_id = correlation_id(&headers);
    let request = ReissueQuoteRequest {
        ticket_id: TicketId(ticket_id),
        urgency: parse_urgency(&body.urgency, &correlation_id)?,
        context: body.context,
        actor: require_actor(body.actor_id, &correlation_id)?,
    };

    state
        .booking
        .reissue_quote(request, &correlation_id)
        .await
        .map(Json)
        .map_err(|error| ApiError::application(error, &correlation_id))
}
