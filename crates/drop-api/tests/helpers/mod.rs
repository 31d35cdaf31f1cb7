//! Shared fixtures for router integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use drop_api::{create_router, AppConfig, AppState, FsAssetStore};
use drop_core::{
    CatalogEntry, CheckoutOrder, CheckoutSession, DownloadCatalog, DownloadNotice, DownloadSecret,
    DropError, DropResult, IntakeSubmission, Notifier, PaymentGateway, PaymentStatus,
    PurchaseConfirmation,
};
use drop_stripe::StripeWebhookVerifier;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SECRET: &str = "integration-test-secret";
pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const VOICE_PRICE: &str = "price_voice";
pub const VOICE_KEY: &str = "samples/human-voice-vol-1.zip";
pub const VOICE_BYTES: &[u8] = b"PK\x03\x04 pretend this is a zip";
pub const README_KEY: &str = "samples/readme.txt";
pub const README_BYTES: &[u8] = b"unzip, then drag the folder into your DAW";

/// Payment gateway answering from a fixed set of sessions
#[derive(Default)]
pub struct FakeGateway {
    pub sessions: HashMap<String, PurchaseConfirmation>,
    pub orders: Mutex<Vec<CheckoutOrder>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout(&self, order: &CheckoutOrder) -> DropResult<CheckoutSession> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(CheckoutSession {
            session_id: "cs_test_created".to_string(),
            checkout_url: "https://checkout.stripe.test/c/pay/cs_test_created".to_string(),
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> DropResult<PurchaseConfirmation> {
        self.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| DropError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Notifier that records what it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    pub downloads: Mutex<Vec<DownloadNotice>>,
    pub intakes: Mutex<Vec<IntakeSubmission>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_downloads(&self, notice: &DownloadNotice) -> DropResult<()> {
        if self.fail {
            return Err(DropError::Notification("mail server down".to_string()));
        }
        self.downloads.lock().unwrap().push(notice.clone());
        Ok(())
    }

    async fn send_intake(&self, submission: &IntakeSubmission) -> DropResult<()> {
        if self.fail {
            return Err(DropError::Notification("mail server down".to_string()));
        }
        self.intakes.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

pub fn paid_session(session_id: &str, items: &[&str], amount_total: i64) -> PurchaseConfirmation {
    PurchaseConfirmation {
        session_id: session_id.to_string(),
        payment_status: PaymentStatus::Paid,
        amount_total,
        currency: Some("usd".to_string()),
        customer_email: Some("buyer@example.com".to_string()),
        items: items.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn catalog() -> DownloadCatalog {
    DownloadCatalog::new()
        .with_entry(CatalogEntry::new(
            VOICE_PRICE,
            "human voice (vol. 1)",
            VOICE_KEY,
            "~484 MB",
        ))
        .with_fallback(CatalogEntry::new(
            "",
            "human voice (vol. 1)",
            VOICE_KEY,
            "~484 MB",
        ))
}

pub fn config(asset_root: &std::path::Path) -> AppConfig {
    let root = asset_root.display().to_string();
    AppConfig::from_lookup(|key| match key {
        "DOWNLOAD_SECRET" => Some(SECRET.to_string()),
        "SITE_URL" => Some("https://journals.example".to_string()),
        "ASSET_ROOT" => Some(root.clone()),
        _ => None,
    })
    .unwrap()
}

pub struct TestApp {
    pub server: TestServer,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub secret: DownloadSecret,
    _assets: TempDir,
}

pub struct TestAppBuilder {
    gateway: FakeGateway,
    notifier: Option<RecordingNotifier>,
    webhooks: bool,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            gateway: FakeGateway::default(),
            notifier: Some(RecordingNotifier::default()),
            webhooks: true,
        }
    }

    pub fn with_session(mut self, confirmation: PurchaseConfirmation) -> Self {
        self.gateway
            .sessions
            .insert(confirmation.session_id.clone(), confirmation);
        self
    }

    pub fn without_email(mut self) -> Self {
        self.notifier = None;
        self
    }

    pub fn with_failing_email(mut self) -> Self {
        self.notifier = Some(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        self
    }

    pub fn without_webhooks(mut self) -> Self {
        self.webhooks = false;
        self
    }

    pub fn build(self) -> TestApp {
        let assets = tempfile::tempdir().unwrap();
        let sample_dir = assets.path().join("samples");
        std::fs::create_dir_all(&sample_dir).unwrap();
        std::fs::write(assets.path().join(VOICE_KEY), VOICE_BYTES).unwrap();
        std::fs::write(assets.path().join(README_KEY), README_BYTES).unwrap();

        let email_enabled = self.notifier.is_some();
        let gateway = Arc::new(self.gateway);
        let notifier = Arc::new(self.notifier.unwrap_or_default());
        let email: Option<Arc<dyn Notifier>> = if email_enabled {
            Some(notifier.clone())
        } else {
            None
        };

        let mut state = AppState::from_parts(
            config(assets.path()),
            catalog(),
            gateway.clone(),
            Arc::new(FsAssetStore::new(assets.path())),
            email,
        );
        if self.webhooks {
            state = state.with_webhook_verifier(StripeWebhookVerifier::new(WEBHOOK_SECRET));
        }

        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        TestApp {
            server,
            gateway,
            notifier,
            secret: DownloadSecret::new(SECRET),
            _assets: assets,
        }
    }
}
