//! Payment recording and invoice settlement.

use super::Database;
use crate::models::{CreatePayment, Invoice, Payment};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "payment_id, company_id, invoice_id, amount, currency, method, \
     gateway_payment_id, reference, paid_date, created_utc";

/// Result of applying a payment to an invoice.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// Payment recorded and the invoice balance updated.
    Applied(Payment),
    /// A payment with this gateway payment id already exists. The webhook
    /// path treats this as a successful no-op.
    Replayed,
}

impl Database {
    /// Record a payment against an invoice and update its balance.
    ///
    /// The invoice row is locked for the duration of the transaction so two
    /// concurrent payments cannot both settle the same outstanding amount.
    #[instrument(skip(self, input), fields(company_id = %input.company_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(&self, input: &CreatePayment) -> Result<PaymentOutcome, AppError> {
        let timer = Self::timer("record_payment");

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        // Replay check comes first: a duplicate gateway payment is a no-op
        // even when the invoice has since been settled.
        if let Some(gateway_payment_id) = &input.gateway_payment_id {
            let exists: Option<i32> = sqlx::query_scalar(
                "SELECT 1 FROM payments WHERE gateway_payment_id = $1",
            )
            .bind(gateway_payment_id)
            .fetch_optional(self.pool())
            .await?;
            if exists.is_some() {
                warn!(
                    gateway_payment_id = %gateway_payment_id,
                    "Duplicate gateway payment ignored"
                );
                return Ok(PaymentOutcome::Replayed);
            }
        }

        let mut tx = self.pool().begin().await?;

        let invoice: Option<Invoice> = sqlx::query_as(
            r#"
            SELECT invoice_id, company_id, client_id, invoice_number, status, currency,
                   issue_date, due_date, subtotal, tax_total, total, amount_paid, amount_due,
                   notes, payment_link_id, payment_link_url, pdf_key,
                   created_utc, issued_utc, voided_utc
            FROM invoices
            WHERE company_id = $1 AND invoice_id = $2
            FOR UPDATE
            "#,
        )
        .bind(input.company_id)
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await?;

        let invoice = invoice.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if invoice.status != "issued" && invoice.status != "partially_paid" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payments can only be recorded against issued invoices"
            )));
        }

        if input.amount > invoice.amount_due {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment of {} exceeds outstanding amount {}",
                input.amount,
                invoice.amount_due
            )));
        }

        let inserted = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                payment_id, company_id, invoice_id, amount, currency, method,
                gateway_payment_id, reference, paid_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (gateway_payment_id) DO NOTHING
            RETURNING {PAYMENT_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(&invoice.currency)
        .bind(input.method.as_str())
        .bind(&input.gateway_payment_id)
        .bind(&input.reference)
        .bind(input.paid_date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = inserted else {
            // A replayed webhook for an already-recorded gateway payment.
            tx.rollback().await?;
            warn!(
                gateway_payment_id = ?input.gateway_payment_id,
                "Duplicate gateway payment ignored"
            );
            return Ok(PaymentOutcome::Replayed);
        };

        let new_paid = invoice.amount_paid + input.amount;
        let new_due = invoice.amount_due - input.amount;
        let new_status = if new_due.is_zero() { "paid" } else { "partially_paid" };

        sqlx::query(
            r#"
            UPDATE invoices
            SET amount_paid = $3, amount_due = $4, status = $5
            WHERE company_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(input.company_id)
        .bind(input.invoice_id)
        .bind(new_paid)
        .bind(new_due)
        .bind(new_status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            invoice_id = %input.invoice_id,
            status = new_status,
            "Payment recorded"
        );

        Ok(PaymentOutcome::Applied(payment))
    }

    /// Payments recorded against an invoice, newest first.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn list_payments(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = Self::timer("list_payments");

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE company_id = $1 AND invoice_id = $2
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(company_id)
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await?;

        timer.observe_duration();

        Ok(payments)
    }
}
