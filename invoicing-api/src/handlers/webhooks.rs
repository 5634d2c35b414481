//! Payment gateway webhook.
//!
//! The body is consumed raw so the signature is verified over the exact
//! bytes the gateway signed. Unknown events and replays are acknowledged
//! with 200 so the gateway stops retrying; only a bad signature is
//! rejected.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use platform_core::error::AppError;
use serde_json::json;
use tracing::{info, warn};

use crate::models::{CreatePayment, PaymentMethod};
use crate::services::database::PaymentOutcome;
use crate::services::metrics::{INVOICES_TOTAL, PAYMENTS_TOTAL, WEBHOOK_EVENTS_TOTAL};
use crate::startup::AppState;

const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// POST /api/webhooks/gateway
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature")))?;

    if !state.gateway.verify_webhook_signature(&body, signature)? {
        WEBHOOK_EVENTS_TOTAL
            .with_label_values(&["invalid_signature"])
            .inc();
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = state
        .gateway
        .parse_webhook_event(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed webhook payload: {}", e)))?;

    if event.event != "payment_link.paid" {
        info!(event = %event.event, "Ignoring webhook event");
        WEBHOOK_EVENTS_TOTAL.with_label_values(&["ignored"]).inc();
        return Ok((StatusCode::OK, Json(json!({ "status": "ignored" }))));
    }

    let link = event
        .payload
        .payment_link
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Event is missing payment link")))?
        .entity;
    let payment = event
        .payload
        .payment
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Event is missing payment entity")))?
        .entity;

    let invoice = match state.db.find_invoice_by_payment_link(&link.id).await? {
        Some(invoice) => invoice,
        None => {
            // Link belongs to no invoice we know; acknowledge so the
            // gateway stops retrying.
            warn!(link_id = %link.id, "Webhook for unknown payment link");
            WEBHOOK_EVENTS_TOTAL.with_label_values(&["ignored"]).inc();
            return Ok((StatusCode::OK, Json(json!({ "status": "ignored" }))));
        }
    };

    let paid_date = DateTime::<Utc>::from_timestamp(payment.created_at as i64, 0)
        .unwrap_or_else(Utc::now)
        .date_naive();

    let input = CreatePayment {
        company_id: invoice.company_id,
        invoice_id: invoice.invoice_id,
        amount: payment.amount_decimal(),
        method: PaymentMethod::Gateway,
        gateway_payment_id: Some(payment.id.clone()),
        reference: Some(link.id.clone()),
        paid_date,
    };

    // An event the invoice can no longer accept (already paid, voided, or
    // the amount exceeds what is due) is acknowledged, not erred: the
    // gateway would retry anything else.
    let outcome = match state.db.record_payment(&input).await {
        Ok(outcome) => outcome,
        Err(AppError::BadRequest(reason)) | Err(AppError::NotFound(reason)) => {
            warn!(
                link_id = %link.id,
                invoice_id = %invoice.invoice_id,
                reason = %reason,
                "Gateway payment not applicable"
            );
            WEBHOOK_EVENTS_TOTAL.with_label_values(&["ignored"]).inc();
            return Ok((StatusCode::OK, Json(json!({ "status": "ignored" }))));
        }
        Err(e) => return Err(e),
    };

    match outcome {
        PaymentOutcome::Applied(recorded) => {
            WEBHOOK_EVENTS_TOTAL.with_label_values(&["applied"]).inc();
            PAYMENTS_TOTAL.with_label_values(&["gateway"]).inc();
            info!(
                payment_id = %recorded.payment_id,
                invoice_id = %invoice.invoice_id,
                "Gateway payment applied"
            );

            let now_paid = state
                .db
                .get_invoice(invoice.company_id, invoice.invoice_id)
                .await?
                .map(|i| i.status == "paid")
                .unwrap_or(false);
            if now_paid {
                INVOICES_TOTAL.with_label_values(&["paid"]).inc();
            }

            notify_devices(&state, &invoice, &recorded.amount.to_string()).await;

            Ok((StatusCode::OK, Json(json!({ "status": "applied" }))))
        }
        PaymentOutcome::Replayed => {
            WEBHOOK_EVENTS_TOTAL.with_label_values(&["replayed"]).inc();
            Ok((StatusCode::OK, Json(json!({ "status": "replayed" }))))
        }
    }
}

/// Push a "paid" notification to the tenant's devices, best effort.
async fn notify_devices(state: &AppState, invoice: &crate::models::Invoice, amount: &str) {
    if !state.push.is_enabled() {
        return;
    }

    let devices = match state.db.list_devices(invoice.company_id).await {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "Failed to load devices for push");
            return;
        }
    };

    let tokens: Vec<String> = devices.into_iter().map(|d| d.token).collect();
    if tokens.is_empty() {
        return;
    }

    let invoice_number = invoice
        .invoice_number
        .clone()
        .unwrap_or_else(|| invoice.invoice_id.to_string());

    state
        .push
        .notify_invoice_paid(&tokens, &invoice_number, amount, &invoice.currency)
        .await;
}
