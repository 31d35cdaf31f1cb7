//! # Error Types
//!
//! Typed error handling for the sample-drop engine.
//! Checkout, fulfillment and notification operations return `Result<T, DropError>`.
//! Download link verification has its own narrower taxonomy, [`LinkRejection`].

use thiserror::Error;

/// Core error type for checkout, fulfillment and collaborator calls
#[derive(Debug, Error)]
pub enum DropError {
    /// Configuration errors (missing keys, invalid catalog)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Checkout session unknown to the payment provider
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Session exists but has not been paid
    #[error("Payment not completed for session {session_id} (status: {status})")]
    PaymentIncomplete { session_id: String, status: String },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a collaborator
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Email provider rejected or failed to send a message
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DropError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            DropError::Configuration(_) => 500,
            DropError::InvalidRequest(_) => 400,
            DropError::SessionNotFound { .. } => 404,
            DropError::PaymentIncomplete { .. } => 400,
            DropError::ProviderError { .. } => 502,
            DropError::NetworkError(_) => 503,
            DropError::WebhookVerificationFailed(_) => 401,
            DropError::WebhookParseError(_) => 400,
            DropError::Notification(_) => 502,
            DropError::Serialization(_) => 500,
            DropError::Internal(_) => 500,
        }
    }
}

/// Result type alias for fallible engine operations
pub type DropResult<T> = Result<T, DropError>;

/// Why a presented download link was refused.
///
/// Variants are ordered the way the verifier checks them: a malformed link is
/// reported before an expired one, and an expired one before a forged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkRejection {
    /// A field is missing, empty or unparseable
    #[error("Invalid download link")]
    InvalidRequest,

    /// The link was genuine but its validity window has passed
    #[error("Download link expired. Please check your email for a new link.")]
    Expired,

    /// The signature does not match the presented fields
    #[error("Invalid download link")]
    Forbidden,
}

impl LinkRejection {
    pub fn status_code(&self) -> u16 {
        match self {
            LinkRejection::InvalidRequest => 400,
            LinkRejection::Expired => 410,
            LinkRejection::Forbidden => 403,
        }
    }

    /// Stable machine-readable tag
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRejection::InvalidRequest => "invalid_request",
            LinkRejection::Expired => "expired",
            LinkRejection::Forbidden => "forbidden",
        }
    }
}

/// Asset storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
