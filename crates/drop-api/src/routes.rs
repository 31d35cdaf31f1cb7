//! # Routes
//!
//! Axum router configuration for the download API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health, / - Health check
/// - POST /api/checkout - Create a hosted checkout
/// - GET  /api/verify-session - Confirm payment, return download links
/// - GET  /api/download - Stream an asset for a signed link
/// - POST /api/intake - Lead-intake form
/// - POST /webhook/stripe - Stripe webhook (emails download links)
pub fn create_router(state: AppState) -> Router {
    // The storefront is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route("/verify-session", get(handlers::verify_session))
        .route("/download", get(handlers::download))
        .route("/intake", post(handlers::intake));

    // Webhook routes (raw body, signature checked)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
