//! # drop-wasm
//!
//! WebAssembly bindings for sample-drop-rs.
//!
//! Lets an edge runtime (Cloudflare Workers, Deno, a browser worker) issue
//! and check the same signed download links as the native server:
//! - `issue_download_url` signs a link for a purchased asset
//! - `check_download_query` decides what the download endpoint should answer
//!
//! The clock is `Date.now()` from the host.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { issue_download_url, check_download_query } from 'sample-drop-wasm';
//!
//! await init();
//!
//! const url = issue_download_url(env.DOWNLOAD_SECRET, 'samples/pack.zip', session.id);
//!
//! const check = check_download_query(env.DOWNLOAD_SECRET, new URL(request.url).search);
//! if (check.status !== 200) {
//!   return Response.json({ error: check.error }, { status: check.status });
//! }
//! const object = await env.SAMPLES_BUCKET.get(check.resource_key);
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use drop_core::link::FIELD_SEPARATOR;
use drop_core::{DownloadRequest, DownloadSecret, LinkIssuer, LinkVerifier};
use wasm_bindgen::prelude::*;

/// Outcome of checking a download query string
#[derive(Debug, Clone, PartialEq, Eq)]
#[wasm_bindgen(getter_with_clone)]
pub struct DownloadCheck {
    /// HTTP status the download endpoint should answer with
    pub status: u16,
    /// `ok`, `invalid_request`, `expired` or `forbidden`
    pub reason: String,
    /// Message for the client when rejected
    pub error: Option<String>,
    /// Storage key to serve when accepted
    pub resource_key: Option<String>,
    /// Suggested download filename when accepted
    pub filename: Option<String>,
}

/// Sign a download URL valid for 24 hours from now
#[wasm_bindgen]
pub fn issue_download_url(
    secret: &str,
    resource_key: &str,
    session_id: &str,
) -> Result<String, JsValue> {
    issue_download_url_at(secret, resource_key, session_id, js_now())
        .map_err(|e| JsValue::from_str(&e))
}

/// Check a download query string (with or without the leading `?`)
#[wasm_bindgen]
pub fn check_download_query(secret: &str, query: &str) -> Result<DownloadCheck, JsValue> {
    check_download_query_at(secret, query, js_now()).map_err(|e| JsValue::from_str(&e))
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_now() -> i64 {
    js_sys::Date::now() as i64
}

fn secret_from(secret: &str) -> Result<DownloadSecret, String> {
    let secret = DownloadSecret::new(secret);
    if secret.is_empty() {
        return Err("Download secret is empty".to_string());
    }
    Ok(secret)
}

fn issue_download_url_at(
    secret: &str,
    resource_key: &str,
    session_id: &str,
    now_ms: i64,
) -> Result<String, String> {
    let secret = secret_from(secret)?;

    for (field, value) in [("resource_key", resource_key), ("session_id", session_id)] {
        if value.is_empty() || value.contains(FIELD_SEPARATOR) {
            return Err(format!("Invalid {}: {:?}", field, value));
        }
    }

    Ok(LinkIssuer::new(secret)
        .issue_at(resource_key, session_id, now_ms)
        .url())
}

fn check_download_query_at(secret: &str, query: &str, now_ms: i64) -> Result<DownloadCheck, String> {
    let verifier = LinkVerifier::new(secret_from(secret)?);
    let request = DownloadRequest::from_query(query);

    Ok(match verifier.verify_at(&request, now_ms) {
        Ok(authorized) => DownloadCheck {
            status: 200,
            reason: "ok".to_string(),
            error: None,
            filename: Some(authorized.filename().to_string()),
            resource_key: Some(authorized.resource_key),
        },
        Err(rejection) => DownloadCheck {
            status: rejection.status_code(),
            reason: rejection.as_str().to_string(),
            error: Some(rejection.to_string()),
            resource_key: None,
            filename: None,
        },
    })
}
