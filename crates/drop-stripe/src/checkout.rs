//! # Stripe Checkout Sessions
//!
//! Implementation of the Stripe Checkout Sessions API: creating hosted
//! checkouts for catalog prices and retrieving them once the buyer returns.

use crate::config::StripeConfig;
use crate::session::StripeSession;
use async_trait::async_trait;
use drop_core::{
    CheckoutOrder, CheckoutSession, DropError, DropResult, PaymentGateway, PurchaseConfirmation,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe Checkout gateway
///
/// Uses Stripe's hosted checkout page for payments.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> DropResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| DropError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> DropResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Form parameters for `POST /v1/checkout/sessions`
    fn form_params(order: &CheckoutOrder) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();

        for (i, item) in order.items.iter().enumerate() {
            params.push((format!("line_items[{}][price]", i), item.price_id.clone()));
            params.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        params.push(("mode".to_string(), "payment".to_string()));
        params.push(("success_url".to_string(), order.success_url.clone()));
        params.push(("cancel_url".to_string(), order.cancel_url.clone()));
        params.push(("allow_promotion_codes".to_string(), "true".to_string()));
        params.push(("customer_creation".to_string(), "always".to_string()));

        let mut metadata: Vec<_> = order.metadata.iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        params
    }

    /// Turn a non-2xx Stripe response into a provider error
    fn provider_error(status: StatusCode, body: &str) -> DropError {
        error!("Stripe API error: status={}, body={}", status, body);

        let message = serde_json::from_str::<StripeErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        DropError::ProviderError {
            provider: PROVIDER.to_string(),
            message,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, order), fields(items = order.items.len()))]
    async fn create_checkout(&self, order: &CheckoutOrder) -> DropResult<CheckoutSession> {
        if order.is_empty() {
            return Err(DropError::InvalidRequest("No items provided".to_string()));
        }

        let params = Self::form_params(order);
        debug!("Creating Stripe checkout session: {} items", order.items.len());

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(&params)
            .send()
            .await
            .map_err(|e| DropError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DropError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::provider_error(status, &body));
        }

        let session: StripeSession = serde_json::from_str(&body).map_err(|e| {
            DropError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        let checkout_url = session.url.ok_or_else(|| {
            DropError::ProviderError {
                provider: PROVIDER.to_string(),
                message: "Checkout session has no url".to_string(),
            }
        })?;

        info!("Created Stripe checkout session: id={}", session.id);

        Ok(CheckoutSession {
            session_id: session.id,
            checkout_url,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> DropResult<PurchaseConfirmation> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );

        let response = self
            .client
            .get(&url)
            .query(&[("expand[]", "line_items")])
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| DropError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DropError::NetworkError(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(DropError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(Self::provider_error(status, &body));
        }

        let session: StripeSession = serde_json::from_str(&body).map_err(|e| {
            DropError::Serialization(format!("Failed to parse Stripe session: {}", e))
        })?;

        debug!(
            "Retrieved Stripe session: id={}, status={:?}",
            session.id, session.payment_status
        );

        Ok(session.into_confirmation())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use drop_core::CheckoutItem;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> CheckoutOrder {
        CheckoutOrder::new(
            vec![CheckoutItem::new("price_voice", 1), CheckoutItem::new("price_drums", 2)],
            "https://journals.example/success?session_id={CHECKOUT_SESSION_ID}",
            "https://journals.example/samples",
        )
        .with_metadata("source", "journals-samples")
    }

    async fn gateway(server: &MockServer) -> StripeGateway {
        StripeGateway::new(StripeConfig::new("sk_test_abc").with_api_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_form_params() {
        let params = StripeGateway::form_params(&order());
        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("line_items[0][price]"), Some("price_voice"));
        assert_eq!(get("line_items[1][quantity]"), Some("2"));
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("allow_promotion_codes"), Some("true"));
        assert_eq!(get("customer_creation"), Some("always"));
        assert_eq!(get("metadata[source]"), Some("journals-samples"));
        assert_eq!(get("metadata[items]"), Some(r#"["price_voice","price_drums"]"#));
    }

    #[tokio::test]
    async fn test_create_checkout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(body_string_contains("mode=payment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_new",
                "url": "https://checkout.stripe.com/c/pay/cs_test_new"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = gateway(&server).await.create_checkout(&order()).await.unwrap();
        assert_eq!(session.session_id, "cs_test_new");
        assert_eq!(session.checkout_url, "https://checkout.stripe.com/c/pay/cs_test_new");
    }

    #[tokio::test]
    async fn test_create_checkout_surfaces_stripe_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "No such price: 'price_voice'", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server).await.create_checkout(&order()).await.unwrap_err();
        match err {
            DropError::ProviderError { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "No such price: 'price_voice'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_order_is_rejected_locally() {
        let server = MockServer::start().await;
        let empty = CheckoutOrder::new(vec![], "https://a/success", "https://a/cancel");
        let err = gateway(&server).await.create_checkout(&empty).await.unwrap_err();
        assert!(matches!(err, DropError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_retrieve_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_paid"))
            .and(query_param("expand[]", "line_items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_paid",
                "payment_status": "paid",
                "amount_total": 1500,
                "currency": "usd",
                "customer_details": { "email": "buyer@example.com" },
                "metadata": { "items": "[\"price_voice\"]" }
            })))
            .mount(&server)
            .await;

        let confirmation = gateway(&server)
            .await
            .retrieve_session("cs_test_paid")
            .await
            .unwrap();
        assert!(confirmation.is_paid());
        assert_eq!(confirmation.items, vec!["price_voice".to_string()]);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "message": "No such checkout.session: 'cs_missing'" }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .retrieve_session("cs_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, DropError::SessionNotFound { .. }));
    }
}
