//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booking_core::{
    entitlements_for, Booking, BookingError, BookingRequest, BookingUsage, Entitlements, Plan,
    Salon, SalonId,
};
use booking_payments::{CheckoutRequest, PaymentError, ReconcileOutcome};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub webhook_signature_enforced: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<u32>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            count: None,
            quota: None,
        }),
    )
}

/// Public view of a salon; billing references stay server-side
#[derive(Debug, Serialize)]
pub struct SalonResponse {
    pub id: SalonId,
    pub slug: String,
    pub name: String,
    pub plan: Plan,
    pub entitlements: Entitlements,
}

impl From<Salon> for SalonResponse {
    fn from(salon: Salon) -> Self {
        Self {
            entitlements: entitlements_for(salon.plan),
            id: salon.id,
            slug: salon.slug,
            name: salon.name,
            plan: salon.plan,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan: Plan,
    pub entitlements: Entitlements,
}

/// Checkout body as sent by the pricing page
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub salon_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub pending_plan: Plan,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

// ============================================================================
// Error Mapping
// ============================================================================

fn booking_error(err: BookingError) -> ApiError {
    let message = err.user_message();
    match err {
        BookingError::Validation { field, .. } => {
            tracing::debug!(field, error = %message, "Booking request rejected");
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
        }
        BookingError::LimitReached { count, quota, .. } => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: message,
                code: "BOOKING_LIMIT_REACHED".into(),
                count: Some(count),
                quota: Some(quota),
            }),
        ),
        BookingError::SalonNotFound(_) => api_error(StatusCode::NOT_FOUND, "SALON_NOT_FOUND", message),
        BookingError::BookingNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND", message)
        }
        other => {
            tracing::error!(error = %other, retryable = other.is_retryable(), "Booking store error");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message)
        }
    }
}

fn payment_error(err: &PaymentError) -> ApiError {
    let (status, code) = match err {
        PaymentError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELDS"),
        PaymentError::InvalidPlan(_) => (StatusCode::BAD_REQUEST, "INVALID_PLAN"),
        PaymentError::AlreadyOnPlan(_) => (StatusCode::CONFLICT, "ALREADY_ON_PLAN"),
        PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::Stripe(_) => (StatusCode::BAD_GATEWAY, "CHECKOUT_ERROR"),
        PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_ERROR"),
    };
    api_error(status, code, err.user_message())
}

async fn find_salon(state: &AppState, salon_ref: &str) -> Result<Salon, ApiError> {
    state
        .store
        .get_salon_by_id_or_slug(salon_ref)
        .await
        .map_err(booking_error)?
        .ok_or_else(|| booking_error(BookingError::SalonNotFound(salon_ref.to_string())))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.checkout.is_some(),
        webhook_signature_enforced: state.reconciler.signature_policy().is_enforced(),
    })
}

/// Public salon lookup by id or slug
pub async fn get_salon(
    State(state): State<AppState>,
    Path(salon_ref): Path<String>,
) -> Result<Json<SalonResponse>, ApiError> {
    let salon = find_salon(&state, &salon_ref).await?;
    Ok(Json(salon.into()))
}

/// Current plan, polled by the dashboard after checkout
pub async fn get_plan(
    State(state): State<AppState>,
    Path(salon_ref): Path<String>,
) -> Result<Json<PlanResponse>, ApiError> {
    let salon = find_salon(&state, &salon_ref).await?;
    let plan = state
        .store
        .get_salon_plan(&salon.id)
        .await
        .map_err(booking_error)?;

    Ok(Json(PlanResponse {
        plan,
        entitlements: entitlements_for(plan),
    }))
}

/// Active bookings against the plan quota
pub async fn get_usage(
    State(state): State<AppState>,
    Path(salon_ref): Path<String>,
) -> Result<Json<BookingUsage>, ApiError> {
    let usage = state.admission.usage(&salon_ref).await.map_err(booking_error)?;
    Ok(Json(usage))
}

/// Submit a booking from the public page
pub async fn create_booking(
    State(state): State<AppState>,
    Path(salon_ref): Path<String>,
    Json(payload): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let booking = state
        .admission
        .try_admit(&salon_ref, &payload)
        .await
        .map_err(booking_error)?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Owner booking list
pub async fn list_bookings(
    State(state): State<AppState>,
    Path(salon_ref): Path<String>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = state
        .admission
        .list_bookings(&salon_ref)
        .await
        .map_err(booking_error)?;
    Ok(Json(bookings))
}

/// Owner deletes a booking
pub async fn delete_booking(
    State(state): State<AppState>,
    Path((salon_ref, booking_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .admission
        .delete_booking(&salon_ref, booking_id)
        .await
        .map_err(booking_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create Stripe checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let checkout = state.checkout.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })?;

    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(plan_id), Some(user_id), Some(salon_ref)) = (
        present(payload.plan_id),
        present(payload.user_id),
        present(payload.salon_id),
    ) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "MISSING_FIELDS",
            "Missing required fields: planId, userId, salonId",
        ));
    };

    let plan = Plan::parse(&plan_id).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_PLAN",
            format!("Unknown plan: {plan_id}"),
        )
    })?;

    let salon = find_salon(&state, &salon_ref).await?;
    if salon.plan == plan {
        return Err(payment_error(&PaymentError::AlreadyOnPlan(plan)));
    }

    let session = checkout
        .create_checkout(CheckoutRequest {
            plan,
            salon_id: salon.id,
            user_id,
            user_email: payload.user_email,
        })
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Checkout error");
            payment_error(&e)
        })?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.checkout_url,
        pending_plan: session.pending_plan,
    }))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let outcome = state.reconciler.handle(&body, signature).await.map_err(|e| {
        tracing::warn!(error = %e, "Webhook signature failed");
        payment_error(&e)
    })?;

    if let ReconcileOutcome::Applied { salon_id, .. } = &outcome {
        tracing::debug!(salon_id = %salon_id, "Webhook applied");
    }

    Ok(Json(WebhookAck { received: true }))
}
