//! # Collaborator Traits
//!
//! The engine only issues and verifies links. Everything around it is a
//! collaborator behind one of these traits:
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │  PaymentGateway  │   │    AssetStore    │   │     Notifier     │
//! │  create_checkout │   │      fetch       │   │  send_downloads  │
//! │ retrieve_session │   │                  │   │   send_intake    │
//! └────────▲─────────┘   └────────▲─────────┘   └────────▲─────────┘
//!          │                      │                      │
//!   StripeGateway          FsAssetStore           ResendNotifier
//! ```

use crate::error::{DropResult, StoreError};
use crate::fulfillment::DownloadNotice;
use crate::intake::IntakeSubmission;
use crate::order::{CheckoutOrder, CheckoutSession, PurchaseConfirmation};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Payment provider: creates hosted checkouts and reports on them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout session and return the redirect URL.
    async fn create_checkout(&self, order: &CheckoutOrder) -> DropResult<CheckoutSession>;

    /// Look up a checkout session by id.
    ///
    /// Unknown sessions are `DropError::SessionNotFound`.
    async fn retrieve_session(&self, session_id: &str) -> DropResult<PurchaseConfirmation>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Byte stream of a stored asset
pub type AssetStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// An asset found in storage
pub struct StoredAsset {
    /// Length in bytes
    pub size: u64,
    pub stream: AssetStream,
}

impl std::fmt::Debug for StoredAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredAsset")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Object storage holding the downloadable assets
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Open an asset for streaming. `Ok(None)` when the key does not exist.
    async fn fetch(&self, resource_key: &str) -> Result<Option<StoredAsset>, StoreError>;

    /// Backend name (for logging)
    fn backend_name(&self) -> &'static str;
}

/// Outbound email. Delivery is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a buyer their download links
    async fn send_downloads(&self, notice: &DownloadNotice) -> DropResult<()>;

    /// Forward a lead-intake submission to the studio inbox
    async fn send_intake(&self, submission: &IntakeSubmission) -> DropResult<()>;
}

pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
pub type BoxedAssetStore = Arc<dyn AssetStore>;
pub type BoxedNotifier = Arc<dyn Notifier>;
