//! Invoice and line item models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
///
/// `Overdue` is never stored; it is derived at read time from an issued or
/// partially paid invoice whose due date has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Void,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => InvoiceStatus::Issued,
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            "void" => InvoiceStatus::Void,
            "overdue" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Invoice document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: Option<String>,
    pub status: String,
    pub currency: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub notes: Option<String>,
    pub payment_link_id: Option<String>,
    pub payment_link_url: Option<String>,
    pub pdf_key: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub issued_utc: Option<DateTime<Utc>>,
    pub voided_utc: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Status as reported to clients: issued/partially paid invoices past
    /// their due date read as overdue.
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        let stored = InvoiceStatus::from_string(&self.status);
        match stored {
            InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid => match self.due_date {
                Some(due) if due < today => InvoiceStatus::Overdue,
                _ => stored,
            },
            other => other,
        }
    }
}

/// Line item attached to an invoice. Price, tax rate, and description are
/// snapshotted from the product at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub company_id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub line_subtotal: Decimal,
    pub line_tax: Decimal,
    pub line_total: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a draft invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<CreateInvoiceItem>,
}

/// Input for one line item.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
}

impl CreateInvoiceItem {
    /// Line amounts, computed server-side. Tax rate is a percentage.
    pub fn amounts(&self) -> (Decimal, Decimal, Decimal) {
        let subtotal = self.quantity * self.unit_price;
        let tax = subtotal * self.tax_rate / Decimal::ONE_HUNDRED;
        (subtotal, tax, subtotal + tax)
    }
}

/// Input for updating a draft invoice. Supplying `items` replaces the whole
/// line item set.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub client_id: Option<Uuid>,
    pub currency: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<CreateInvoiceItem>>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    /// Restrict to invoices overdue as of this date. Overdue is derived,
    /// never stored, so it cannot go through the status column.
    pub overdue_before: Option<NaiveDate>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn line_amounts_apply_percentage_tax() {
        let item = CreateInvoiceItem {
            product_id: None,
            description: "Consulting".to_string(),
            quantity: dec("2"),
            unit_price: dec("150.00"),
            tax_rate: dec("20"),
        };
        let (subtotal, tax, total) = item.amounts();
        assert_eq!(subtotal, dec("300.00"));
        assert_eq!(tax, dec("60.00"));
        assert_eq!(total, dec("360.00"));
    }

    #[test]
    fn zero_tax_rate_means_no_tax() {
        let item = CreateInvoiceItem {
            product_id: None,
            description: "Exempt".to_string(),
            quantity: dec("1"),
            unit_price: dec("99.99"),
            tax_rate: Decimal::ZERO,
        };
        let (subtotal, tax, total) = item.amounts();
        assert_eq!(subtotal, dec("99.99"));
        assert_eq!(tax, Decimal::ZERO);
        assert_eq!(total, dec("99.99"));
    }

    #[test]
    fn issued_invoice_past_due_reads_as_overdue() {
        let invoice = sample_invoice("issued", Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()));
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(invoice.effective_status(today), InvoiceStatus::Overdue);
    }

    #[test]
    fn paid_invoice_never_reads_as_overdue() {
        let invoice = sample_invoice("paid", Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()));
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(invoice.effective_status(today), InvoiceStatus::Paid);
    }

    #[test]
    fn issued_invoice_due_today_is_not_overdue() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let invoice = sample_invoice("issued", Some(today));
        assert_eq!(invoice.effective_status(today), InvoiceStatus::Issued);
    }

    fn sample_invoice(status: &str, due_date: Option<NaiveDate>) -> Invoice {
        Invoice {
            invoice_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            invoice_number: Some("INV-000001".to_string()),
            status: status.to_string(),
            currency: "EUR".to_string(),
            issue_date: None,
            due_date,
            subtotal: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            total: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            amount_due: Decimal::ZERO,
            notes: None,
            payment_link_id: None,
            payment_link_url: None,
            pdf_key: None,
            created_utc: Utc::now(),
            issued_utc: None,
            voided_utc: None,
        }
    }
}
