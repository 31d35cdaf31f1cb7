//! # Resend Email Notifier
//!
//! Sends download links to buyers and intake submissions to the studio
//! inbox through the Resend HTTP API.

use async_trait::async_trait;
use drop_core::{DownloadNotice, DropError, DropResult, IntakeSubmission, Notifier};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

const DEFAULT_API_BASE_URL: &str = "https://api.resend.com";

/// Notifier backed by Resend
pub struct ResendNotifier {
    api_key: String,
    api_base_url: String,
    from: String,
    intake_to: String,
    /// Prefix for the relative download paths in buyer email
    site_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    text: &'a str,
}

impl ResendNotifier {
    pub fn new(
        api_key: impl Into<String>,
        from: impl Into<String>,
        intake_to: impl Into<String>,
        site_url: impl Into<String>,
    ) -> DropResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| DropError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            from: from.into(),
            intake_to: intake_to.into(),
            site_url: site_url.into(),
            client,
        })
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    async fn send(&self, email: &SendEmail<'_>) -> DropResult<()> {
        let url = format!("{}/emails", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| DropError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Resend API error: status={}, body={}", status, body);
            return Err(DropError::Notification(format!("Resend returned {}", status)));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    #[instrument(skip(self, notice), fields(order = %notice.order_number, links = notice.links.len()))]
    async fn send_downloads(&self, notice: &DownloadNotice) -> DropResult<()> {
        let subject = format!("Your downloads (order {})", notice.order_number);
        let text = notice.render_text(&self.site_url);

        self.send(&SendEmail {
            from: &self.from,
            to: vec![notice.recipient.as_str()],
            reply_to: None,
            subject: &subject,
            text: &text,
        })
        .await?;

        info!("Download links emailed");
        Ok(())
    }

    #[instrument(skip(self, submission), fields(service = submission.service.as_str()))]
    async fn send_intake(&self, submission: &IntakeSubmission) -> DropResult<()> {
        let subject = submission.subject();
        let text = submission.render_text();

        self.send(&SendEmail {
            from: &self.from,
            to: vec![self.intake_to.as_str()],
            reply_to: Some(&submission.email),
            subject: &subject,
            text: &text,
        })
        .await?;

        info!("Intake forwarded");
        Ok(())
    }
}
