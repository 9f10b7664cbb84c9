use std::collections::HashMap;

use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: Option<String>,
    success_url: String,
    cancel_url: String,
    portal_return_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub api_version: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: Option<String>,
    pub status: Option<String>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

impl StripeSubscription {
    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }
}

/// Identifiers handed back to the client after a Checkout Session is created.
#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub session_id: String,
    pub url: String,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: Option<String>,
        success_url: String,
        cancel_url: String,
        portal_return_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
            portal_return_url,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (
            stripe_error_type,
            stripe_error_code,
            stripe_error_param,
            stripe_error_message,
            stripe_decline_code,
        ) = match serde_json::from_str::<StripeErrorEnvelope>(&body) {
            Ok(envelope) => {
                let details = envelope.error;
                (
                    details.type_,
                    details.code,
                    details.param,
                    details.message,
                    details.decline_code,
                )
            }
            Err(_) => (None, None, None, None, None),
        };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            stripe_decline_code = ?stripe_decline_code,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Creates a Stripe customer carrying the local user id in its metadata.
    pub async fn create_customer(&self, email: &str, name: &str, user_id: Uuid) -> Result<String> {
        // See Stripe customer docs: https://stripe.com/docs/api/customers/create
        let body = [
            ("email", email.to_string()),
            ("name", name.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let resp = self
            .http
            .post("https://api.stripe.com/v1/customers")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Creates a subscription-mode Checkout Session and returns its id and URL.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<CheckoutSessionInfo> {
        // Stripe Checkout docs:
        // https://stripe.com/docs/payments/checkout
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            (
                "payment_method_types[0]".to_string(),
                "card".to_string(),
            ),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        if let Some(customer) = customer_id {
            body.push(("customer".to_string(), customer));
        }

        if let Some(user_id) = metadata.get("user_id") {
            body.push((
                "subscription_data[metadata][user_id]".to_string(),
                user_id.clone(),
            ));
        }

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .http
            .post("https://api.stripe.com/v1/checkout/sessions")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: Option<String>,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let session_id = parsed
            .id
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session id is missing"))?;
        let url = parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))?;

        Ok(CheckoutSessionInfo { session_id, url })
    }

    /// Creates a Billing Portal session for self-service subscription management.
    pub async fn create_portal_session(&self, customer_id: &str) -> Result<String> {
        // https://stripe.com/docs/api/customer_portal/sessions/create
        let body = [
            ("customer", customer_id.to_string()),
            ("return_url", self.portal_return_url.clone()),
        ];

        let resp = self
            .http
            .post("https://api.stripe.com/v1/billing_portal/sessions")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create portal session").await?;

        #[derive(Deserialize)]
        struct PortalResp {
            url: Option<String>,
        }

        let parsed: PortalResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Billing Portal URL is missing"))
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    ///
    /// With no webhook secret configured the payload is parsed without
    /// verification; production startup refuses that configuration, so the
    /// fallback only ever runs against local or development traffic.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        let Some(webhook_secret) = self.webhook_secret.as_deref() else {
            warn!("stripe webhook secret not configured; accepting payload unverified");
            let event: StripeEvent = serde_json::from_slice(payload)?;
            return Ok(event);
        };

        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in stripe-signature"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let provided = hex::decode(signature)?;
        mac.verify_slice(&provided)
            .map_err(|_| anyhow::anyhow!("invalid webhook signature"))?;

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(format!(
                "https://api.stripe.com/v1/subscriptions/{}",
                subscription_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        let subscription: StripeSubscription = resp.json().await?;
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK_SECRET: &str = "whsec_test_secret";

    fn client_with_secret(webhook_secret: Option<&str>) -> StripeClient {
        StripeClient::new(
            "sk_test_123".to_string(),
            webhook_secret.map(|s| s.to_string()),
            "https://app.example.com?success=true".to_string(),
            "https://app.example.com?canceled=true".to_string(),
            "https://app.example.com".to_string(),
        )
    }

    fn sign(payload: &[u8], timestamp: &str, secret: &str) -> String {
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn event_payload() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "mode": "subscription",
                    "subscription": "sub_123",
                    "customer": "cus_123",
                    "metadata": { "user_id": "8a2a4f3e-52a0-4f0c-9f7d-0d8f1f6f8b11", "plan": "monthly" }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_valid_signature() {
        let client = client_with_secret(Some(WEBHOOK_SECRET));
        let payload = event_payload();
        let signature = sign(&payload, "1700000000", WEBHOOK_SECRET);
        let header = format!("t=1700000000,v1={}", signature);

        let event = client
            .verify_webhook_signature(&payload, &header)
            .expect("valid signature should verify");
        assert_eq!(event.type_, "checkout.session.completed");
    }

    #[test]
    fn rejects_signature_from_wrong_secret() {
        let client = client_with_secret(Some(WEBHOOK_SECRET));
        let payload = event_payload();
        let signature = sign(&payload, "1700000000", "whsec_other_secret");
        let header = format!("t=1700000000,v1={}", signature);

        assert!(client.verify_webhook_signature(&payload, &header).is_err());
    }

    #[test]
    fn rejects_header_without_signature_parts() {
        let client = client_with_secret(Some(WEBHOOK_SECRET));
        let payload = event_payload();

        assert!(client.verify_webhook_signature(&payload, "t=1700000000").is_err());
        assert!(client.verify_webhook_signature(&payload, "v1=deadbeef").is_err());
        assert!(client.verify_webhook_signature(&payload, "").is_err());
    }

    #[test]
    fn parses_unverified_when_secret_not_configured() {
        let client = client_with_secret(None);
        let payload = event_payload();

        let event = client
            .verify_webhook_signature(&payload, "")
            .expect("unverified parse should succeed without a secret");
        assert_eq!(event.type_, "checkout.session.completed");
    }

    #[test]
    fn extracts_checkout_session_from_event() {
        let client = client_with_secret(None);
        let payload = event_payload();
        let event = client.verify_webhook_signature(&payload, "").unwrap();

        let session = StripeClient::extract_checkout_session(&event).expect("session parses");
        assert_eq!(session.subscription.as_deref(), Some("sub_123"));
        assert_eq!(session.customer.as_deref(), Some("cus_123"));
        let metadata = session.metadata.unwrap();
        assert_eq!(metadata.get("plan").map(String::as_str), Some("monthly"));
    }

    #[test]
    fn period_end_falls_back_to_first_item() {
        let subscription: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_123",
            "status": "active",
            "items": { "data": [ { "current_period_end": 1764547200 } ] }
        }))
        .unwrap();

        assert_eq!(subscription.period_end(), Some(1764547200));
    }
}
