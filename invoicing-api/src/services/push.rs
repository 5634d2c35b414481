//! Push notifications for payment events.
//!
//! Sends an FCM message to each device registered for the company when an
//! invoice gets paid. Delivery is best effort; failures are logged and
//! never fail the calling request.

use crate::config::PushConfig;
use platform_core::error::AppError;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Clone)]
pub struct PushService {
    config: PushConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct FcmRequest {
    message: FcmMessage,
}

#[derive(Debug, Serialize)]
struct FcmMessage {
    token: String,
    notification: FcmNotification,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct FcmNotification {
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    name: Option<String>,
    #[serde(default)]
    error: Option<FcmError>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct FcmError {
    code: i32,
    message: String,
    status: String,
}

impl PushService {
    pub fn new(config: PushConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.project_id.is_empty()
    }

    /// Send one notification to one device token.
    pub async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: Option<HashMap<String, String>>,
    ) -> Result<(), AppError> {
        if !self.is_enabled() {
            info!("Push disabled, notification not sent");
            return Ok(());
        }

        let request = FcmRequest {
            message: FcmMessage {
                token: device_token.to_string(),
                notification: FcmNotification {
                    title: title.to_string(),
                    body: body.to_string(),
                },
                data,
            },
        };

        let url = format!(
            "{}/{}/messages:send",
            self.config.api_url, self.config.project_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("Failed to connect to FCM: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BadGateway(format!(
                "FCM returned status {}: {}",
                status, body
            )));
        }

        let fcm_response: FcmResponse = response
            .json()
            .await
            .map_err(|e| AppError::BadGateway(format!("Failed to parse FCM response: {}", e)))?;

        if let Some(error) = fcm_response.error {
            return Err(AppError::BadGateway(format!(
                "FCM error ({}): {}",
                error.status, error.message
            )));
        }

        info!(message = ?fcm_response.name, "Push notification sent");

        Ok(())
    }

    /// Notify every registered device that an invoice was paid. Individual
    /// delivery failures are logged and swallowed.
    pub async fn notify_invoice_paid(
        &self,
        device_tokens: &[String],
        invoice_number: &str,
        amount: &str,
        currency: &str,
    ) {
        let title = "Invoice paid".to_string();
        let body = format!("Invoice {} was paid: {} {}", invoice_number, amount, currency);

        let mut data = HashMap::new();
        data.insert("invoice_number".to_string(), invoice_number.to_string());

        for token in device_tokens {
            if let Err(e) = self.send(token, &title, &body, Some(data.clone())).await {
                warn!(error = %e, "Push delivery failed for one device");
            }
        }
    }
}
