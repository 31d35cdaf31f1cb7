//! # Signed Download Links
//!
//! A download link is a self-contained capability: the asset key, the purchase
//! it belongs to, an expiry instant and an HMAC over those three fields.
//! Nothing is stored server-side; validity is a function of the link and the
//! secret alone.
//!
//! ```text
//! /api/download?file=<resource_key>&session=<purchase_reference>&expires=<epoch_millis>&sig=<signature>
//! ```

use crate::error::LinkRejection;
use crate::signing::{self, DownloadSecret};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// Path of the download endpoint links point at
pub const DOWNLOAD_PATH: &str = "/api/download";

/// How long an issued link stays valid, in hours
pub const LINK_VALIDITY_HOURS: i64 = 24;

/// Separator of the canonical message.
/// Catalog keys and purchase references never contain it.
pub const FIELD_SEPARATOR: char = ':';

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// The exact string that is signed for a link
pub fn canonical_message(resource_key: &str, purchase_reference: &str, expires_at: &str) -> String {
    format!(
        "{resource_key}{sep}{purchase_reference}{sep}{expires_at}",
        sep = FIELD_SEPARATOR
    )
}

/// A signed, self-contained authorization to download one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadToken {
    pub resource_key: String,
    pub purchase_reference: String,
    /// Milliseconds since the Unix epoch after which the token is void
    pub expires_at: i64,
    pub signature: String,
}

impl DownloadToken {
    /// Query string in the download endpoint's wire format.
    ///
    /// Parameter order is fixed: `file`, `session`, `expires`, `sig`.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("file", &self.resource_key)
            .append_pair("session", &self.purchase_reference)
            .append_pair("expires", &self.expires_at.to_string())
            .append_pair("sig", &self.signature)
            .finish()
    }

    /// Relative URL of the download endpoint for this token
    pub fn url(&self) -> String {
        format!("{}?{}", DOWNLOAD_PATH, self.query_string())
    }

    /// The fields as they would arrive on the download endpoint
    pub fn to_request(&self) -> DownloadRequest {
        DownloadRequest {
            file: Some(self.resource_key.clone()),
            session: Some(self.purchase_reference.clone()),
            expires: Some(self.expires_at.to_string()),
            sig: Some(self.signature.clone()),
        }
    }
}

/// Produces signed download links
#[derive(Debug, Clone)]
pub struct LinkIssuer {
    secret: DownloadSecret,
}

impl LinkIssuer {
    pub fn new(secret: DownloadSecret) -> Self {
        Self { secret }
    }

    /// Issue a link valid for [`LINK_VALIDITY_HOURS`] from now
    pub fn issue(&self, resource_key: &str, purchase_reference: &str) -> DownloadToken {
        self.issue_at(resource_key, purchase_reference, now_millis())
    }

    /// Issue a link as if the current time were `now_ms`
    pub fn issue_at(
        &self,
        resource_key: &str,
        purchase_reference: &str,
        now_ms: i64,
    ) -> DownloadToken {
        let expires_at = now_ms + Duration::hours(LINK_VALIDITY_HOURS).num_milliseconds();
        let message = canonical_message(resource_key, purchase_reference, &expires_at.to_string());

        DownloadToken {
            resource_key: resource_key.to_string(),
            purchase_reference: purchase_reference.to_string(),
            expires_at,
            signature: signing::sign(&self.secret, &message),
        }
    }
}

/// Download link fields as presented by a client.
///
/// Every field is optional here because the verifier, not the extractor,
/// decides what a malformed link means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub sig: Option<String>,
}

impl DownloadRequest {
    /// Parse from a raw query string (with or without a leading `?`)
    pub fn from_query(query: &str) -> Self {
        let mut request = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "file" => &mut request.file,
                "session" => &mut request.session,
                "expires" => &mut request.expires,
                "sig" => &mut request.sig,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        request
    }
}

/// A link that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub resource_key: String,
    pub purchase_reference: String,
    pub expires_at: i64,
}

impl Authorized {
    /// Last path segment of the resource key, used as the download filename
    pub fn filename(&self) -> &str {
        self.resource_key
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_key)
    }
}

/// Decides whether a presented download link is genuine and current
#[derive(Debug, Clone)]
pub struct LinkVerifier {
    secret: DownloadSecret,
}

impl LinkVerifier {
    pub fn new(secret: DownloadSecret) -> Self {
        Self { secret }
    }

    /// Verify against the current time
    pub fn verify(&self, request: &DownloadRequest) -> Result<Authorized, LinkRejection> {
        self.verify_at(request, now_millis())
    }

    /// Verify as if the current time were `now_ms`.
    ///
    /// Checks run in order and stop at the first failure: completeness,
    /// expiry, signature.
    pub fn verify_at(
        &self,
        request: &DownloadRequest,
        now_ms: i64,
    ) -> Result<Authorized, LinkRejection> {
        let (Some(file), Some(session), Some(expires), Some(sig)) = (
            non_empty(&request.file),
            non_empty(&request.session),
            non_empty(&request.expires),
            non_empty(&request.sig),
        ) else {
            return Err(LinkRejection::InvalidRequest);
        };

        let expires_at: i64 = expires
            .parse()
            .map_err(|_| LinkRejection::InvalidRequest)?;

        if now_ms > expires_at {
            return Err(LinkRejection::Expired);
        }

        // Signed over the presented text, not a re-rendered integer
        let message = canonical_message(file, session, expires);
        if !signing::verify(&self.secret, &message, sig) {
            return Err(LinkRejection::Forbidden);
        }

        Ok(Authorized {
            resource_key: file.to_string(),
            purchase_reference: session.to_string(),
            expires_at,
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}
