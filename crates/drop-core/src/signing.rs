//! # Link Signing
//!
//! HMAC-SHA256 over an arbitrary message, rendered as URL-safe base64 without
//! padding so a signature travels as a single query-string value.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Development secret used by early deployments of the download endpoint.
///
/// It is only recognised here so startup can refuse or flag it.
pub const INSECURE_DEFAULT_SECRET: &str = "dev-secret-change-me";

/// Server-held key for download links
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadSecret(String);

impl DownloadSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when this is the well-known development secret
    pub fn is_insecure_default(&self) -> bool {
        self.0 == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for DownloadSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DownloadSecret(***)")
    }
}

fn mac_for(secret: &DownloadSecret, message: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac
}

/// Sign `message` and return the URL-safe, unpadded base64 signature
pub fn sign(secret: &DownloadSecret, message: &str) -> String {
    URL_SAFE_NO_PAD.encode(mac_for(secret, message).finalize().into_bytes())
}

/// Check `candidate` against the signature of `message`.
///
/// The candidate must be canonical unpadded URL-safe base64; the tag
/// comparison is constant time.
pub fn verify(secret: &DownloadSecret, message: &str, candidate: &str) -> bool {
    let Ok(tag) = URL_SAFE_NO_PAD.decode(candidate) else {
        return false;
    };
    mac_for(secret, message).verify_slice(&tag).is_ok()
}
