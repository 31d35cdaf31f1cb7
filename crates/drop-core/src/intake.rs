//! # Lead Intake
//!
//! Validation and sanitization of the mixing/mastering intake form.
//! A valid submission is forwarded to the studio inbox through a `Notifier`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

const MAX_NAME: usize = 200;
const MAX_EMAIL: usize = 254;
const MAX_PHONE: usize = 30;
const MAX_SERVICE: usize = 50;
const MAX_LINK: usize = 2000;
const MAX_NOTES: usize = 5000;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

// Common typos of .com and gmail
static EMAIL_TYPO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.con$|\.cmo$|\.ocm$|@gmial\.|@gamil\.|@gmai\.)").expect("valid regex")
});

static HAS_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("valid regex"));

static BLOCKED_LINK: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // Local and private networks
        Regex::new(r"(?i)^(localhost|127\.|192\.168\.|10\.|172\.(1[6-9]|2[0-9]|3[01])\.)")
            .expect("valid regex"),
        // Executables
        Regex::new(r"(?i)\.(exe|bat|cmd|sh|ps1|msi|dll|scr)$").expect("valid regex"),
        // Script injection
        Regex::new(r"(?i)<script|javascript:|data:").expect("valid regex"),
    ]
});

/// Requested service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Mix,
    Master,
    Both,
}

impl Service {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mix" => Some(Service::Mix),
            "master" => Some(Service::Master),
            "both" => Some(Service::Both),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Mix => "mix",
            Service::Master => "master",
            Service::Both => "both",
        }
    }
}

/// Why an intake form was refused. Messages are shown to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntakeRejection {
    #[error("Missing required fields: name, email, service, and link are required.")]
    MissingFields,

    #[error("Invalid email address format.")]
    InvalidEmail,

    #[error("Please double-check your email address for typos.")]
    SuspiciousEmail,

    #[error("Please provide a valid URL for your streaming link.")]
    InvalidLink,

    #[error("This URL type is not allowed. Please provide a link to Spotify, SoundCloud, Google Drive, Dropbox, etc.")]
    BlockedLink,

    #[error("Invalid service selection.")]
    InvalidService,
}

/// Intake form as posted by the browser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntakeForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A validated, sanitized intake submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: Service,
    pub link: Url,
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

impl IntakeForm {
    /// Validate and sanitize, checking in this order: required fields, email
    /// shape, email typos, link, service.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<IntakeSubmission, IntakeRejection> {
        let (Some(name), Some(email), Some(service), Some(link)) = (
            present(&self.name),
            present(&self.email),
            present(&self.service),
            present(&self.link),
        ) else {
            return Err(IntakeRejection::MissingFields);
        };

        let name = clean(name, MAX_NAME);
        let email = clean(email, MAX_EMAIL).to_lowercase();
        let phone = clean(self.phone.as_deref().unwrap_or_default(), MAX_PHONE);
        let service = clean(service, MAX_SERVICE);
        let link = clean(link, MAX_LINK);
        let notes = clean(self.notes.as_deref().unwrap_or_default(), MAX_NOTES);

        if !EMAIL_SHAPE.is_match(&email) {
            return Err(IntakeRejection::InvalidEmail);
        }
        if EMAIL_TYPO.is_match(&email) {
            return Err(IntakeRejection::SuspiciousEmail);
        }

        let link = parse_streaming_link(&link)?;
        let service = Service::parse(&service).ok_or(IntakeRejection::InvalidService)?;

        Ok(IntakeSubmission {
            name,
            email,
            phone,
            service,
            link,
            notes,
            submitted_at: now,
        })
    }
}

impl IntakeSubmission {
    pub fn subject(&self) -> String {
        format!("🎧 New Intake: {} - {}", self.name, self.service.as_str())
    }

    /// Plain-text email body for the studio inbox
    pub fn render_text(&self) -> String {
        let rule = "═".repeat(39);
        let phone = if self.phone.is_empty() {
            "(not provided)"
        } else {
            self.phone.as_str()
        };
        let notes = if self.notes.is_empty() {
            "(none)"
        } else {
            self.notes.as_str()
        };

        format!(
            "New Intake Form Submission\n{rule}\n\nName: {}\nEmail: {}\nPhone: {}\nService: {}\nStreaming Link: {}\n\nNotes:\n{}\n\n{rule}\nSubmitted: {}",
            self.name,
            self.email,
            phone,
            self.service.as_str(),
            self.link,
            notes,
            self.submitted_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        )
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// Trim and cap at `max` characters
fn clean(value: &str, max: usize) -> String {
    value.trim().chars().take(max).collect()
}

fn parse_streaming_link(raw: &str) -> Result<Url, IntakeRejection> {
    let candidate = if HAS_SCHEME.is_match(raw) {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&candidate).map_err(|_| IntakeRejection::InvalidLink)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(IntakeRejection::InvalidLink);
    }

    let host = url.host_str().unwrap_or_default();
    let blocked = BLOCKED_LINK
        .iter()
        .any(|p| p.is_match(host) || p.is_match(url.as_str()));
    if blocked {
        return Err(IntakeRejection::BlockedLink);
    }

    Ok(url)
}
