//! # Order Types
//!
//! Checkout requests sent to the payment provider and the purchase
//! confirmations it hands back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the purchased price ids as a JSON array
pub const ITEMS_METADATA_KEY: &str = "items";

/// Metadata key identifying where the checkout came from
pub const SOURCE_METADATA_KEY: &str = "source";

/// A line in a checkout request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    /// Provider price id
    pub price_id: String,
    /// Quantity
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl CheckoutItem {
    pub fn new(price_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            price_id: price_id.into(),
            quantity,
        }
    }
}

/// An order to be checked out with the payment provider
#[derive(Debug, Clone)]
pub struct CheckoutOrder {
    pub items: Vec<CheckoutItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

impl CheckoutOrder {
    /// Build an order, recording the purchased price ids in metadata
    pub fn new(
        items: Vec<CheckoutItem>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        let price_ids: Vec<&str> = items.iter().map(|i| i.price_id.as_str()).collect();
        let mut metadata = HashMap::new();
        // A Vec<&str> always serializes
        metadata.insert(
            ITEMS_METADATA_KEY.to_string(),
            serde_json::to_string(&price_ids).unwrap_or_else(|_| "[]".to_string()),
        );

        Self {
            items,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            metadata,
        }
    }

    /// Builder: add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A checkout session created by the payment provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session id
    pub session_id: String,
    /// Hosted checkout page to redirect the customer to
    pub checkout_url: String,
}

/// Payment state of a checkout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "paid" => PaymentStatus::Paid,
            "unpaid" => PaymentStatus::Unpaid,
            "no_payment_required" => PaymentStatus::NoPaymentRequired,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::NoPaymentRequired => "no_payment_required",
            PaymentStatus::Other(s) => s,
        }
    }
}

/// What the payment provider reports about a finished checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseConfirmation {
    /// Provider session id; doubles as the purchase reference in links
    pub session_id: String,
    pub payment_status: PaymentStatus,
    /// Amount in the smallest currency unit
    pub amount_total: i64,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    /// Purchased price ids
    pub items: Vec<String>,
}

impl PurchaseConfirmation {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Short customer-facing order number: last 8 chars of the session id, upper-cased
    pub fn order_number(&self) -> String {
        let chars: Vec<char> = self.session_id.chars().collect();
        let start = chars.len().saturating_sub(8);
        chars[start..].iter().collect::<String>().to_uppercase()
    }

    /// Parse price ids out of the `items` metadata value.
    ///
    /// Malformed metadata yields no items rather than an error.
    pub fn items_from_metadata(metadata: &HashMap<String, String>) -> Vec<String> {
        metadata
            .get(ITEMS_METADATA_KEY)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default()
    }
}
