//! # drop-core
//!
//! Core types and traits for the sample-drop download engine.
//!
//! This crate provides:
//! - `signing` - HMAC-SHA256 primitive with URL-safe signatures
//! - `LinkIssuer` and `LinkVerifier` for stateless, expiring download links
//! - `DownloadCatalog` mapping purchased prices to stored assets
//! - `build_download_links` to fulfil a paid purchase
//! - `PaymentGateway`, `AssetStore` and `Notifier` collaborator traits
//! - `IntakeForm` validation for the lead-intake endpoint
//! - `DropError` and `LinkRejection` for typed error handling
//!
//! ## Example
//!
//! ```rust
//! use drop_core::{DownloadSecret, LinkIssuer, LinkVerifier};
//!
//! let secret = DownloadSecret::new("s3cret");
//! let token = LinkIssuer::new(secret.clone()).issue("samples/demo.zip", "cs_test_123");
//!
//! // Later, on the download endpoint
//! let authorized = LinkVerifier::new(secret).verify(&token.to_request()).unwrap();
//! assert_eq!(authorized.resource_key, "samples/demo.zip");
//! ```

pub mod catalog;
pub mod collab;
pub mod error;
pub mod fulfillment;
pub mod intake;
pub mod link;
pub mod order;
pub mod signing;

// Re-exports for convenience
pub use catalog::{CatalogEntry, DownloadCatalog};
pub use collab::{
    AssetStore, AssetStream, BoxedAssetStore, BoxedNotifier, BoxedPaymentGateway, Notifier,
    PaymentGateway, StoredAsset,
};
pub use error::{DropError, DropResult, LinkRejection, StoreError};
pub use fulfillment::{build_download_links, DownloadLink, DownloadNotice};
pub use intake::{IntakeForm, IntakeRejection, IntakeSubmission, Service};
pub use link::{
    now_millis, Authorized, DownloadRequest, DownloadToken, LinkIssuer, LinkVerifier,
    DOWNLOAD_PATH, LINK_VALIDITY_HOURS,
};
pub use order::{CheckoutItem, CheckoutOrder, CheckoutSession, PaymentStatus, PurchaseConfirmation};
pub use signing::DownloadSecret;
