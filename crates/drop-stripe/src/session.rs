//! # Stripe Checkout Session Objects
//!
//! The subset of Stripe's checkout session object the engine reads, shared by
//! session retrieval and the `checkout.session.completed` webhook.

use drop_core::{PaymentStatus, PurchaseConfirmation};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    /// Present when retrieved with `expand[]=line_items`
    #[serde(default)]
    pub line_items: Option<LineItemList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemList {
    #[serde(default)]
    pub data: Vec<LineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub price: Option<PriceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRef {
    pub id: String,
}

impl StripeSession {
    /// Purchased price ids: the `items` metadata written at checkout, or the
    /// expanded line items when the metadata is absent.
    pub fn purchased_items(&self) -> Vec<String> {
        let from_metadata = self
            .metadata
            .as_ref()
            .map(PurchaseConfirmation::items_from_metadata)
            .unwrap_or_default();
        if !from_metadata.is_empty() {
            return from_metadata;
        }

        self.line_items
            .iter()
            .flat_map(|list| list.data.iter())
            .filter_map(|item| item.price.as_ref().map(|p| p.id.clone()))
            .collect()
    }

    pub fn into_confirmation(self) -> PurchaseConfirmation {
        let items = self.purchased_items();
        let customer_email = self
            .customer_details
            .and_then(|cd| cd.email)
            .or(self.customer_email);

        PurchaseConfirmation {
            session_id: self.id,
            payment_status: PaymentStatus::parse(self.payment_status.as_deref().unwrap_or("unknown")),
            amount_total: self.amount_total.unwrap_or(0),
            currency: self.currency,
            customer_email,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confirmation_from_metadata() {
        let session: StripeSession = serde_json::from_value(json!({
            "id": "cs_test_123",
            "payment_status": "paid",
            "amount_total": 1500,
            "currency": "usd",
            "customer_email": null,
            "customer_details": { "email": "buyer@example.com" },
            "metadata": { "source": "journals-samples", "items": "[\"price_voice\"]" }
        }))
        .unwrap();

        let confirmation = session.into_confirmation();
        assert!(confirmation.is_paid());
        assert_eq!(confirmation.items, vec!["price_voice".to_string()]);
        assert_eq!(confirmation.customer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(confirmation.amount_total, 1500);
    }

    #[test]
    fn test_items_fall_back_to_line_items() {
        let session: StripeSession = serde_json::from_value(json!({
            "id": "cs_test_123",
            "payment_status": "paid",
            "customer_email": "fallback@example.com",
            "metadata": {},
            "line_items": { "data": [
                { "price": { "id": "price_a" } },
                { "price": null }
            ]}
        }))
        .unwrap();

        let confirmation = session.into_confirmation();
        assert_eq!(confirmation.items, vec!["price_a".to_string()]);
        assert_eq!(confirmation.customer_email.as_deref(), Some("fallback@example.com"));
        assert_eq!(confirmation.amount_total, 0);
    }

    #[test]
    fn test_unknown_status() {
        let session: StripeSession = serde_json::from_value(json!({ "id": "cs_1" })).unwrap();
        let confirmation = session.into_confirmation();
        assert!(!confirmation.is_paid());
        assert_eq!(confirmation.payment_status.as_str(), "unknown");
    }
}
