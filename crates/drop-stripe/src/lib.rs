//! # drop-stripe
//!
//! Stripe payment gateway for sample-drop-rs.
//!
//! - **StripeGateway** implements `drop_core::PaymentGateway` on top of the
//!   Checkout Sessions API: hosted checkout creation and session retrieval
//!   with expanded line items.
//! - **StripeWebhookVerifier** checks `Stripe-Signature` headers and turns
//!   `checkout.session.completed` events into purchase confirmations.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use drop_core::{CheckoutItem, CheckoutOrder, PaymentGateway};
//! use drop_stripe::StripeGateway;
//!
//! let gateway = StripeGateway::from_env()?;
//!
//! let order = CheckoutOrder::new(
//!     vec![CheckoutItem::new("price_123", 1)],
//!     "https://example.com/success?session_id={CHECKOUT_SESSION_ID}",
//!     "https://example.com/samples",
//! );
//! let session = gateway.create_checkout(&order).await?;
//!
//! // Redirect the buyer to session.checkout_url
//! ```

pub mod checkout;
pub mod config;
pub mod session;
pub mod webhook;

// Re-exports
pub use checkout::StripeGateway;
pub use config::StripeConfig;
pub use session::StripeSession;
pub use webhook::{StripeWebhookVerifier, WebhookEvent};
