//! # Request Handlers
//!
//! Axum request handlers for checkout, purchase verification, signed
//! downloads, lead intake and Stripe webhooks.

use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use drop_core::{
    build_download_links, now_millis, CheckoutItem, CheckoutOrder, DownloadLink, DownloadNotice,
    DownloadRequest, DropError, IntakeForm, PurchaseConfirmation, StoreError,
};
use drop_stripe::WebhookEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// Checkout `source` metadata identifying this storefront
pub const CHECKOUT_SOURCE: &str = "journals-samples";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Prices to purchase
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
}

/// Create checkout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    /// Checkout URL (redirect the buyer here)
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifySessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A paid purchase and its download links
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    pub success: bool,
    pub order_id: String,
    pub email: Option<String>,
    pub total: i64,
    pub currency: Option<String>,
    pub downloads: Vec<DownloadLink>,
}

#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub success: bool,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn drop_error_to_response(err: DropError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match &err {
        DropError::SessionNotFound { .. } => "Session not found".to_string(),
        DropError::PaymentIncomplete { .. } => "Payment not completed".to_string(),
        DropError::ProviderError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    api_error(status, message)
}

/// Unwrap a JSON body, answering malformed input with an `ErrorResponse`
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        api_error(rejection.status(), "Invalid request body")
    })
}

/// Response type for a served asset, from its key's extension
fn content_type_for(resource_key: &str) -> &'static str {
    let is_zip = std::path::Path::new(resource_key)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}

/// Stripe ids are `[A-Za-z0-9_]`; anything else never reaches the API path
fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 255
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "sample-drop",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a hosted checkout for the requested prices
#[instrument(skip(state, payload))]
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let request = json_body(payload)?;
    if request.items.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No items provided"));
    }
    if request.items.iter().any(|i| i.price_id.is_empty() || i.quantity == 0) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid checkout item"));
    }

    let order = CheckoutOrder::new(request.items, state.success_url(), state.cancel_url())
        .with_metadata("source", CHECKOUT_SOURCE);

    info!(
        "Creating checkout: {} items via {}",
        order.items.len(),
        state.payments.provider_name()
    );

    let session = state.payments.create_checkout(&order).await.map_err(|e| {
        error!("Failed to create checkout: {}", e);
        drop_error_to_response(e)
    })?;

    info!("Created checkout session: {}", session.session_id);

    Ok(Json(CreateCheckoutResponse {
        url: session.checkout_url,
        session_id: session.session_id,
    }))
}

/// Confirm a finished checkout and hand back signed download links
#[instrument(skip(state, query))]
pub async fn verify_session(
    State(state): State<AppState>,
    Query(query): Query<VerifySessionQuery>,
) -> Result<Json<VerifySessionResponse>, ApiError> {
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing session_id"))?;

    if !is_valid_session_id(&session_id) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid session_id"));
    }

    let confirmation = state
        .payments
        .retrieve_session(&session_id)
        .await
        .map_err(|e| {
            warn!("Session lookup failed: {}", e);
            drop_error_to_response(e)
        })?;

    let downloads = build_download_links(&confirmation, &state.catalog, &state.issuer, now_millis())
        .map_err(drop_error_to_response)?;

    info!(
        "Verified session {}: {} downloads",
        confirmation.session_id,
        downloads.len()
    );

    Ok(Json(VerifySessionResponse {
        success: true,
        order_id: confirmation.order_number(),
        email: confirmation.customer_email,
        total: confirmation.amount_total,
        currency: confirmation.currency,
        downloads,
    }))
}

/// Stream a purchased asset to the holder of a valid signed link
#[instrument(skip(state, query))]
pub async fn download(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let request = DownloadRequest::from_query(query.as_deref().unwrap_or_default());

    let authorized = state.verifier.verify(&request).map_err(|rejection| {
        info!(reason = rejection.as_str(), "Download link rejected");
        let status =
            StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        api_error(status, rejection.to_string())
    })?;

    let asset = match state.store.fetch(&authorized.resource_key).await {
        Ok(Some(asset)) => asset,
        Ok(None) => {
            warn!("Signed link for missing asset: {}", authorized.resource_key);
            return Err(api_error(StatusCode::NOT_FOUND, "File not found"));
        }
        Err(StoreError::InvalidKey(key)) => {
            warn!("Signed link for unusable storage key: {}", key);
            return Err(api_error(StatusCode::NOT_FOUND, "File not found"));
        }
        Err(e) => {
            error!("Asset store {} failed: {}", state.store.backend_name(), e);
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Download failed. Please try again or contact support.",
            ));
        }
    };

    info!(
        "Serving {} ({} bytes) for session {}",
        authorized.resource_key, asset.size, authorized.purchase_reference
    );

    let filename = authorized.filename().replace(['"', '\\'], "_");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&authorized.resource_key))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CONTENT_LENGTH, asset.size)
        .header(header::CACHE_CONTROL, "private, no-cache")
        .body(Body::from_stream(asset.stream))
        .map_err(|e| {
            error!("Failed to build download response: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Download failed. Please try again or contact support.",
            )
        })
}

/// Validate a lead-intake form and forward it to the studio inbox
#[instrument(skip(state, payload))]
pub async fn intake(
    State(state): State<AppState>,
    payload: Result<Json<IntakeForm>, JsonRejection>,
) -> Result<Json<IntakeResponse>, ApiError> {
    let submission = json_body(payload)?
        .validate(Utc::now())
        .map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.to_string()))?;

    let notifier = state.notifier.as_ref().ok_or_else(|| {
        error!("RESEND_API_KEY not configured");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Email service not configured. Please contact us directly at {}",
                state.config.intake_to
            ),
        )
    })?;

    notifier.send_intake(&submission).await.map_err(|e| {
        error!("Failed to forward intake: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send notification. Please try again or contact us directly.",
        )
    })?;

    info!("Intake received: service={}", submission.service.as_str());

    Ok(Json(IntakeResponse {
        success: true,
        message: "Intake received successfully!".to_string(),
    }))
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let verifier = state.webhooks.as_ref().ok_or_else(|| {
        error!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Stripe webhooks not configured")
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing Stripe-Signature header"))?;

    let event = verifier.verify(&body, signature).map_err(|e| {
        error!("Webhook verification failed: {}", e);
        drop_error_to_response(e)
    })?;

    match event {
        WebhookEvent::CheckoutCompleted(confirmation) => {
            fulfill_by_email(&state, &confirmation).await;
        }
        WebhookEvent::Ignored(event_type) => {
            debug!("Unhandled webhook event: {}", event_type);
        }
    }

    Ok(StatusCode::OK)
}

/// Email a completed purchase its links. Failures are logged, never returned,
/// so Stripe does not retry a delivered event.
async fn fulfill_by_email(state: &AppState, confirmation: &PurchaseConfirmation) {
    info!(
        "Checkout completed: session={}, amount={}",
        confirmation.session_id, confirmation.amount_total
    );

    if !confirmation.is_paid() {
        info!(
            "Session {} not paid yet ({}), nothing to send",
            confirmation.session_id,
            confirmation.payment_status.as_str()
        );
        return;
    }

    let links = match build_download_links(confirmation, &state.catalog, &state.issuer, now_millis()) {
        Ok(links) if links.is_empty() => {
            warn!("Session {} unlocked no downloads", confirmation.session_id);
            return;
        }
        Ok(links) => links,
        Err(e) => {
            error!("Failed to issue links for {}: {}", confirmation.session_id, e);
            return;
        }
    };

    let Some(recipient) = confirmation.customer_email.clone() else {
        warn!("Session {} has no customer email", confirmation.session_id);
        return;
    };

    let Some(notifier) = &state.notifier else {
        warn!("Email disabled, download links for {} not sent", confirmation.session_id);
        return;
    };

    let notice = DownloadNotice {
        recipient,
        order_number: confirmation.order_number(),
        links,
    };

    if let Err(e) = notifier.send_downloads(&notice).await {
        error!("Failed to email download links for {}: {}", confirmation.session_id, e);
    }
}
