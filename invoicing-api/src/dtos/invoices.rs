use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invoice, InvoiceItem, InvoiceStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,

    #[validate(nested)]
    #[validate(length(min = 1, message = "Invoice needs at least one line item"))]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    /// Optional product reference; price and description may come from the
    /// catalog or be given inline.
    pub product_id: Option<Uuid>,

    pub description: Option<String>,

    pub quantity: Decimal,

    pub unit_price: Option<Decimal>,

    /// Tax rate as a percentage, 0 to 100.
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub client_id: Option<Uuid>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,

    /// Replaces the whole line item set when present.
    #[validate(nested)]
    pub items: Option<Vec<InvoiceItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    /// Defaults to today.
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Invoice as returned to clients: stored fields plus the derived status.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub effective_status: InvoiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceItem>>,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, items: Option<Vec<InvoiceItem>>) -> Self {
        let effective_status = invoice.effective_status(Utc::now().date_naive());
        Self {
            invoice,
            effective_status,
            items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SendInvoiceResponse {
    pub invoice: InvoiceResponse,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link_url: Option<String>,
}
