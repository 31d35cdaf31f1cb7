//! # drop-api
//!
//! HTTP API layer for sample-drop-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Checkout and session verification backed by Stripe
//! - Signed, expiring downloads streamed from the asset store
//! - Lead-intake form forwarding and purchase emails via Resend
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/checkout` | Create checkout session |
//! | GET | `/api/verify-session` | Verify payment, get download links |
//! | GET | `/api/download` | Download with a signed link |
//! | POST | `/api/intake` | Submit intake form |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod email;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod storage;

pub use email::ResendNotifier;
pub use routes::create_router;
pub use state::{AppConfig, AppState};
pub use storage::FsAssetStore;
