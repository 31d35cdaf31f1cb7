//! # Fulfillment
//!
//! Turns a paid purchase into signed download links, one per purchased asset.

use crate::catalog::{CatalogEntry, DownloadCatalog};
use crate::error::{DropError, DropResult};
use crate::link::{LinkIssuer, FIELD_SEPARATOR};
use crate::order::PurchaseConfirmation;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A download link as shown to the buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub name: String,
    pub size: String,
    pub url: String,
}

/// Download links addressed to a buyer, handed to a `Notifier`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadNotice {
    pub recipient: String,
    pub order_number: String,
    pub links: Vec<DownloadLink>,
}

impl DownloadNotice {
    /// Plain-text email body listing the links.
    ///
    /// `base_url` turns the relative link paths into absolute ones.
    pub fn render_text(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        let mut body = format!(
            "Thanks for your purchase! (order {})\n\nYour downloads:\n\n",
            self.order_number
        );
        for link in &self.links {
            body.push_str(&format!(
                "{} ({})\n{}{}\n\n",
                link.name, link.size, base, link.url
            ));
        }
        body.push_str("Links expire 24 hours after purchase.");
        body
    }
}

/// Issue one link per purchased catalog item.
///
/// Unmapped price ids are skipped. When nothing maps and the purchase had a
/// positive total, the catalog's fallback entry (if any) is issued instead.
pub fn build_download_links(
    confirmation: &PurchaseConfirmation,
    catalog: &DownloadCatalog,
    issuer: &LinkIssuer,
    now_ms: i64,
) -> DropResult<Vec<DownloadLink>> {
    if !confirmation.is_paid() {
        return Err(DropError::PaymentIncomplete {
            session_id: confirmation.session_id.clone(),
            status: confirmation.payment_status.as_str().to_string(),
        });
    }

    if confirmation.session_id.is_empty() || confirmation.session_id.contains(FIELD_SEPARATOR) {
        return Err(DropError::InvalidRequest(format!(
            "Unusable purchase reference: {:?}",
            confirmation.session_id
        )));
    }

    let issue = |entry: &CatalogEntry| DownloadLink {
        name: entry.name.clone(),
        size: entry.size.clone(),
        url: issuer
            .issue_at(&entry.resource_key, &confirmation.session_id, now_ms)
            .url(),
    };

    let mut links = Vec::new();
    for price_id in &confirmation.items {
        match catalog.get(price_id) {
            Some(entry) => links.push(issue(entry)),
            None => debug!("No download mapped for price {}", price_id),
        }
    }

    if links.is_empty() && confirmation.amount_total > 0 {
        if let Some(fallback) = &catalog.fallback {
            warn!(
                session_id = %confirmation.session_id,
                "No catalog items matched a paid purchase, issuing fallback link"
            );
            links.push(issue(fallback));
        }
    }

    Ok(links)
}
