//! Invoice lifecycle operations.

use super::Database;
use crate::models::{
    CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, ListInvoicesFilter, UpdateInvoice,
};
use chrono::NaiveDate;
use platform_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, company_id, client_id, invoice_number, status, \
     currency, issue_date, due_date, subtotal, tax_total, total, amount_paid, amount_due, \
     notes, payment_link_id, payment_link_url, pdf_key, created_utc, issued_utc, voided_utc";

const ITEM_COLUMNS: &str = "item_id, invoice_id, company_id, product_id, description, quantity, \
     unit_price, tax_rate, line_subtotal, line_tax, line_total, sort_order, created_utc";

impl Database {
    /// Create a new draft invoice with its line items. Totals are computed
    /// here, never taken from the request.
    #[instrument(skip(self, input), fields(company_id = %input.company_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = Self::timer("create_invoice");

        // Client must exist in this tenant.
        let client = self.get_client(input.company_id, input.client_id).await?;
        if client.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }

        let mut tx = self.pool().begin().await?;

        let invoice_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_id, company_id, client_id, status, currency, due_date, notes)
            VALUES ($1, $2, $3, 'draft', $4, $5, $6)
            "#,
        )
        .bind(invoice_id)
        .bind(input.company_id)
        .bind(input.client_id)
        .bind(&input.currency)
        .bind(input.due_date)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, invoice_id, input.company_id, &input.items).await?;
        let invoice = recompute_totals(&mut tx, input.company_id, invoice_id).await?;

        tx.commit().await?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, "Draft invoice created");

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = Self::timer("get_invoice");

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE company_id = $1 AND invoice_id = $2",
        ))
        .bind(company_id)
        .bind(invoice_id)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Line items for an invoice.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn get_invoice_items(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM invoice_items
            WHERE company_id = $1 AND invoice_id = $2
            ORDER BY sort_order, created_utc
            "#,
        ))
        .bind(company_id)
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await?;

        Ok(items)
    }

    /// List invoices for a company.
    #[instrument(skip(self, filter), fields(company_id = %company_id))]
    pub async fn list_invoices(
        &self,
        company_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = Self::timer("list_invoices");

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {INVOICE_COLUMNS}
                FROM invoices
                WHERE company_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::date IS NULL
                       OR (status IN ('issued', 'partially_paid') AND due_date < $3))
                  AND ($4::uuid IS NULL OR client_id = $4)
                  AND ($5::date IS NULL OR issue_date >= $5)
                  AND ($6::date IS NULL OR issue_date <= $6)
                  AND invoice_id > $7
                ORDER BY invoice_id
                LIMIT $8
                "#,
            ))
            .bind(company_id)
            .bind(&status_str)
            .bind(filter.overdue_before)
            .bind(filter.client_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {INVOICE_COLUMNS}
                FROM invoices
                WHERE company_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::date IS NULL
                       OR (status IN ('issued', 'partially_paid') AND due_date < $3))
                  AND ($4::uuid IS NULL OR client_id = $4)
                  AND ($5::date IS NULL OR issue_date >= $5)
                  AND ($6::date IS NULL OR issue_date <= $6)
                ORDER BY invoice_id
                LIMIT $7
                "#,
            ))
            .bind(company_id)
            .bind(&status_str)
            .bind(filter.overdue_before)
            .bind(filter.client_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update a draft invoice. Supplying items replaces the whole set.
    #[instrument(skip(self, input), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = Self::timer("update_invoice");

        let existing = self.get_invoice(company_id, invoice_id).await?;
        match existing {
            Some(inv) if inv.status == "draft" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft invoices can be updated"
                )))
            }
            None => return Ok(None),
        };

        if let Some(client_id) = input.client_id {
            if self.get_client(company_id, client_id).await?.is_none() {
                return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
            }
        }

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET client_id = COALESCE($3, client_id),
                currency = COALESCE($4, currency),
                due_date = COALESCE($5, due_date),
                notes = COALESCE($6, notes)
            WHERE company_id = $1 AND invoice_id = $2 AND status = 'draft'
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .bind(input.client_id)
        .bind(&input.currency)
        .bind(input.due_date)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        if let Some(items) = &input.items {
            sqlx::query("DELETE FROM invoice_items WHERE company_id = $1 AND invoice_id = $2")
                .bind(company_id)
                .bind(invoice_id)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, invoice_id, company_id, items).await?;
        }

        let invoice = recompute_totals(&mut tx, company_id, invoice_id).await?;

        tx.commit().await?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, "Draft invoice updated");

        Ok(Some(invoice))
    }

    /// Delete a draft invoice.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = Self::timer("delete_invoice");

        let result = sqlx::query(
            "DELETE FROM invoices WHERE company_id = $1 AND invoice_id = $2 AND status = 'draft'",
        )
        .bind(company_id)
        .bind(invoice_id)
        .execute(self.pool())
        .await?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Draft invoice deleted");
        }

        Ok(deleted)
    }

    /// Issue a draft invoice: assign the next gapless number for the
    /// company and stamp the issue date.
    ///
    /// Incrementing the per-company counter takes the row lock, so two
    /// concurrent issues cannot mint the same number, and a rolled-back
    /// issue never leaves a gap.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn issue_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = Self::timer("issue_invoice");

        let existing = self.get_invoice(company_id, invoice_id).await?;
        match existing {
            Some(inv) if inv.status == "draft" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft invoices can be issued"
                )))
            }
            None => return Ok(None),
        };

        let items = self.get_invoice_items(company_id, invoice_id).await?;
        if items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot issue an invoice without line items"
            )));
        }

        let mut tx = self.pool().begin().await?;

        let (prefix, seq): (String, i64) = sqlx::query_as(
            r#"
            UPDATE companies
            SET next_invoice_seq = next_invoice_seq + 1
            WHERE company_id = $1
            RETURNING invoice_prefix, next_invoice_seq - 1
            "#,
        )
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        let invoice_number = format_invoice_number(&prefix, seq);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET invoice_number = $3,
                status = 'issued',
                issue_date = $4,
                due_date = COALESCE($5, due_date),
                issued_utc = NOW(),
                amount_due = total
            WHERE company_id = $1 AND invoice_id = $2 AND status = 'draft'
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(invoice_id)
        .bind(&invoice_number)
        .bind(issue_date)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice_number,
            "Invoice issued"
        );

        Ok(Some(invoice))
    }

    /// Void an issued invoice with no recorded payments.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn void_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = Self::timer("void_invoice");

        let existing = self.get_invoice(company_id, invoice_id).await?;
        match existing {
            Some(inv) if inv.status == "issued" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only issued invoices can be voided"
                )))
            }
            None => return Ok(None),
        };

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'void',
                voided_utc = NOW(),
                amount_due = 0
            WHERE company_id = $1 AND invoice_id = $2 AND status = 'issued'
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(invoice_id)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, "Invoice voided");
        }

        Ok(invoice)
    }

    /// Attach a payment link to an invoice.
    #[instrument(skip(self, link_url), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn set_payment_link(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        link_id: &str,
        link_url: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET payment_link_id = $3, payment_link_url = $4
            WHERE company_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .bind(link_id)
        .bind(link_url)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Remember where the rendered PDF was stored.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn set_pdf_key(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        pdf_key: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE invoices SET pdf_key = $3 WHERE company_id = $1 AND invoice_id = $2",
        )
        .bind(company_id)
        .bind(invoice_id)
        .bind(pdf_key)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Resolve an invoice from a gateway payment link id. Webhooks arrive
    /// without tenant context, so this lookup is global.
    #[instrument(skip(self))]
    pub async fn find_invoice_by_payment_link(
        &self,
        payment_link_id: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE payment_link_id = $1",
        ))
        .bind(payment_link_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(invoice)
    }
}

/// Format a sequential invoice number, e.g. `INV-000042`.
pub fn format_invoice_number(prefix: &str, seq: i64) -> String {
    format!("{}-{:06}", prefix, seq)
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    company_id: Uuid,
    items: &[CreateInvoiceItem],
) -> Result<(), AppError> {
    for (idx, item) in items.iter().enumerate() {
        let (subtotal, tax, total) = item.amounts();
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                item_id, invoice_id, company_id, product_id, description, quantity,
                unit_price, tax_rate, line_subtotal, line_tax, line_total, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(company_id)
        .bind(item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.tax_rate)
        .bind(subtotal)
        .bind(tax)
        .bind(total)
        .bind(idx as i32)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Re-derive invoice totals from its line items inside the transaction.
async fn recompute_totals(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    invoice_id: Uuid,
) -> Result<Invoice, AppError> {
    let conn: &mut PgConnection = &mut *tx;

    let (subtotal, tax_total): (Decimal, Decimal) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(line_subtotal), 0), COALESCE(SUM(line_tax), 0)
        FROM invoice_items
        WHERE company_id = $1 AND invoice_id = $2
        "#,
    )
    .bind(company_id)
    .bind(invoice_id)
    .fetch_one(&mut *conn)
    .await?;

    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        UPDATE invoices
        SET subtotal = $3,
            tax_total = $4,
            total = $3 + $4
        WHERE company_id = $1 AND invoice_id = $2
        RETURNING {INVOICE_COLUMNS}
        "#,
    ))
    .bind(company_id)
    .bind(invoice_id)
    .bind(subtotal)
    .bind(tax_total)
    .fetch_one(&mut *conn)
    .await?;

    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_numbers_are_zero_padded() {
        assert_eq!(format_invoice_number("INV", 1), "INV-000001");
        assert_eq!(format_invoice_number("ACME", 42), "ACME-000042");
        assert_eq!(format_invoice_number("INV", 1_234_567), "INV-1234567");
    }
}
