//! Dashboard aggregation queries.

use super::Database;
use chrono::NaiveDate;
use platform_core::error::AppError;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DashboardSummary {
    pub draft_count: i64,
    pub issued_count: i64,
    pub paid_count: i64,
    pub overdue_count: i64,
    pub outstanding_amount: Decimal,
    pub overdue_amount: Decimal,
    pub collected_amount: Decimal,
}

/// Revenue collected in one calendar month.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RevenuePoint {
    pub month: NaiveDate,
    pub collected: Decimal,
    pub payment_count: i64,
}

/// A client ranked by collected revenue.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopClient {
    pub client_id: Uuid,
    pub client_name: String,
    pub collected: Decimal,
    pub invoice_count: i64,
}

impl Database {
    /// Counts and balances across the company's invoices. Overdue is
    /// derived the same way the read path derives it: issued or partially
    /// paid, with a due date before today. The status counts partition, so
    /// an overdue invoice counts as overdue, not as issued.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn dashboard_summary(
        &self,
        company_id: Uuid,
        today: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let timer = Self::timer("dashboard_summary");

        let summary = sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'draft') AS draft_count,
                COUNT(*) FILTER (
                    WHERE status IN ('issued', 'partially_paid')
                      AND (due_date IS NULL OR due_date >= $2)
                ) AS issued_count,
                COUNT(*) FILTER (WHERE status = 'paid') AS paid_count,
                COUNT(*) FILTER (
                    WHERE status IN ('issued', 'partially_paid') AND due_date < $2
                ) AS overdue_count,
                COALESCE(SUM(amount_due) FILTER (
                    WHERE status IN ('issued', 'partially_paid')
                ), 0) AS outstanding_amount,
                COALESCE(SUM(amount_due) FILTER (
                    WHERE status IN ('issued', 'partially_paid') AND due_date < $2
                ), 0) AS overdue_amount,
                COALESCE(SUM(amount_paid) FILTER (WHERE status != 'void'), 0) AS collected_amount
            FROM invoices
            WHERE company_id = $1
            "#,
        )
        .bind(company_id)
        .bind(today)
        .fetch_one(self.pool())
        .await?;

        timer.observe_duration();

        Ok(summary)
    }

    /// Revenue collected per calendar month over a date range, bucketed by
    /// payment date. Months with no payments are absent from the result.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn revenue_by_month(
        &self,
        company_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RevenuePoint>, AppError> {
        let timer = Self::timer("revenue_by_month");

        let points = sqlx::query_as::<_, RevenuePoint>(
            r#"
            SELECT
                date_trunc('month', paid_date)::date AS month,
                COALESCE(SUM(amount), 0) AS collected,
                COUNT(*) AS payment_count
            FROM payments
            WHERE company_id = $1 AND paid_date >= $2 AND paid_date <= $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(company_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;

        timer.observe_duration();

        Ok(points)
    }

    /// Clients ranked by revenue collected in the range.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn top_clients(
        &self,
        company_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<TopClient>, AppError> {
        let timer = Self::timer("top_clients");

        let clients = sqlx::query_as::<_, TopClient>(
            r#"
            SELECT
                c.client_id,
                c.name AS client_name,
                COALESCE(SUM(p.amount), 0) AS collected,
                COUNT(DISTINCT p.invoice_id) AS invoice_count
            FROM payments p
            JOIN invoices i ON i.invoice_id = p.invoice_id
            JOIN clients c ON c.client_id = i.client_id
            WHERE p.company_id = $1 AND p.paid_date >= $2 AND p.paid_date <= $3
            GROUP BY c.client_id, c.name
            ORDER BY collected DESC
            LIMIT $4
            "#,
        )
        .bind(company_id)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        timer.observe_duration();

        Ok(clients)
    }
}
