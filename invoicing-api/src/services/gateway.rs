//! Payment gateway client.
//!
//! Creates hosted payment links for issued invoices and verifies the
//! HMAC signature on incoming webhook events.

use crate::config::GatewayConfig;
use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Client for the payment gateway's payment link API.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
}

/// Request to create a payment link.
#[derive(Debug, Serialize)]
pub struct CreatePaymentLinkRequest {
    /// Amount in smallest currency unit.
    pub amount: u64,
    pub currency: String,
    pub description: String,
    /// Reference ID for tracking (the invoice number).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<PaymentLinkCustomer>,
}

#[derive(Debug, Serialize)]
pub struct PaymentLinkCustomer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Response from payment link creation.
#[derive(Debug, Deserialize)]
pub struct PaymentLink {
    /// Gateway payment link ID.
    pub id: String,
    /// Hosted checkout URL.
    pub short_url: String,
    pub amount: u64,
    pub currency: String,
    pub status: String,
}

/// Gateway API error response.
#[derive(Debug, Deserialize)]
pub struct GatewayApiError {
    pub error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GatewayErrorDetail {
    pub code: String,
    pub description: String,
}

/// Webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment_link: Option<WebhookLinkEntity>,
    pub payment: Option<WebhookPaymentEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookLinkEntity {
    pub entity: PaymentLinkEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkEntity {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: PaymentEntity,
}

/// Payment entity carried in webhook payloads.
#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    /// Amount in smallest currency unit.
    pub amount: u64,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub created_at: u64,
}

impl PaymentEntity {
    /// Amount in major currency units.
    pub fn amount_decimal(&self) -> Decimal {
        Decimal::from(self.amount) / Decimal::from(100)
    }
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if the gateway is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Create a hosted payment link.
    ///
    /// `amount` is in major currency units and is converted to the smallest
    /// unit for the gateway.
    pub async fn create_payment_link(
        &self,
        amount: Decimal,
        currency: &str,
        description: &str,
        reference_id: Option<String>,
        customer: Option<PaymentLinkCustomer>,
    ) -> Result<PaymentLink> {
        if !self.is_configured() {
            return Err(anyhow!("Payment gateway credentials not configured"));
        }

        let minor_units = (amount * Decimal::from(100))
            .trunc()
            .to_u64()
            .ok_or_else(|| anyhow!("Invoice total out of range for gateway"))?;

        let request = CreatePaymentLinkRequest {
            amount: minor_units,
            currency: currency.to_string(),
            description: description.to_string(),
            reference_id,
            customer,
        };

        let url = format!("{}/payment_links", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Gateway create_payment_link response");

        if status.is_success() {
            let link: PaymentLink = serde_json::from_str(&body)?;
            tracing::info!(
                link_id = %link.id,
                amount = link.amount,
                currency = %link.currency,
                "Payment link created"
            );
            Ok(link)
        } else {
            let error: GatewayApiError =
                serde_json::from_str(&body).unwrap_or_else(|_| GatewayApiError {
                    error: GatewayErrorDetail {
                        code: "UNKNOWN".to_string(),
                        description: body.clone(),
                    },
                });
            tracing::error!(
                code = %error.error.code,
                description = %error.error.description,
                "Payment link creation failed"
            );
            Err(anyhow!(
                "Gateway error: {} - {}",
                error.error.code,
                error.error.description
            ))
        }
    }

    /// Cancel a payment link, e.g. when its invoice is voided.
    pub async fn cancel_payment_link(&self, link_id: &str) -> Result<()> {
        if !self.is_configured() {
            return Err(anyhow!("Payment gateway credentials not configured"));
        }

        let url = format!("{}/payment_links/{}/cancel", self.config.api_base_url, link_id);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .send()
            .await?;

        if response.status().is_success() {
            tracing::info!(link_id = %link_id, "Payment link cancelled");
            Ok(())
        } else {
            let body = response.text().await?;
            Err(anyhow!("Failed to cancel payment link: {}", body))
        }
    }

    /// Verify a webhook signature.
    ///
    /// The signature is `HMAC-SHA256(request_body, webhook_secret)`,
    /// hex-encoded. Comparison is constant-time.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<bool> {
        let expected = self.compute_signature(body, self.config.webhook_secret.expose_secret())?;

        let is_valid = bool::from(expected.as_bytes().ct_eq(signature.as_bytes()));

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Parse a webhook event from the raw request body.
    pub fn parse_webhook_event(&self, body: &[u8]) -> Result<WebhookEvent> {
        let event: WebhookEvent = serde_json::from_slice(body)?;
        Ok(event)
    }

    /// Compute HMAC-SHA256 signature, hex-encoded.
    fn compute_signature(&self, payload: &[u8], secret: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("Invalid key length"))?;
        mac.update(payload);
        let result = mac.finalize();
        Ok(hex::encode(result.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            key_id: "gw_test_123".to_string(),
            key_secret: Secret::new("test_secret".to_string()),
            webhook_secret: Secret::new("webhook_secret".to_string()),
            api_base_url: "https://api.gateway.test/v1".to_string(),
        }
    }

    #[test]
    fn test_is_configured() {
        let client = GatewayClient::new(test_config());
        assert!(client.is_configured());

        let empty_config = GatewayConfig {
            key_id: "".to_string(),
            key_secret: Secret::new("".to_string()),
            webhook_secret: Secret::new("".to_string()),
            api_base_url: "".to_string(),
        };
        let client = GatewayClient::new(empty_config);
        assert!(!client.is_configured());
    }

    #[test]
    fn test_webhook_signature_verification() {
        let client = GatewayClient::new(test_config());

        let body = br#"{"event":"payment_link.paid"}"#;
        let expected = client.compute_signature(body, "webhook_secret").unwrap();

        assert!(client.verify_webhook_signature(body, &expected).unwrap());
    }

    #[test]
    fn test_invalid_webhook_signature() {
        let client = GatewayClient::new(test_config());

        let body = br#"{"event":"payment_link.paid"}"#;
        assert!(!client.verify_webhook_signature(body, "deadbeef").unwrap());
    }

    #[test]
    fn test_parse_webhook_event() {
        let client = GatewayClient::new(test_config());

        let body = br#"{
            "event": "payment_link.paid",
            "payload": {
                "payment_link": {"entity": {"id": "plink_123", "status": "paid"}},
                "payment": {"entity": {
                    "id": "pay_456",
                    "amount": 10050,
                    "currency": "EUR",
                    "status": "captured",
                    "method": "card",
                    "created_at": 1700000000
                }}
            },
            "created_at": 1700000000
        }"#;

        let event = client.parse_webhook_event(body).unwrap();
        assert_eq!(event.event, "payment_link.paid");
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.id, "pay_456");
        assert_eq!(payment.amount_decimal(), Decimal::new(10050, 2));
    }
}
