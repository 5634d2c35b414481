//! Upload batch bookkeeping and chunked row inserts.

use super::Database;
use crate::models::{CreateClient, CreateProduct, RowError, UploadBatch, UploadEntity, UploadStatus};
use platform_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const BATCH_COLUMNS: &str = "batch_id, company_id, entity, filename, status, total_rows, \
     succeeded, failed, skipped, errors, started_utc, finished_utc";

/// Outcome of inserting a single uploaded row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    /// A row with the same natural key already exists.
    Skipped,
    Failed(String),
}

impl Database {
    /// Open an upload batch record in the `processing` state.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn create_upload_batch(
        &self,
        company_id: Uuid,
        entity: UploadEntity,
        filename: &str,
        total_rows: i32,
    ) -> Result<UploadBatch, AppError> {
        let batch = sqlx::query_as::<_, UploadBatch>(&format!(
            r#"
            INSERT INTO upload_batches (batch_id, company_id, entity, filename, status, total_rows)
            VALUES ($1, $2, $3, $4, 'processing', $5)
            RETURNING {BATCH_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(entity.as_str())
        .bind(filename)
        .bind(total_rows)
        .fetch_one(self.pool())
        .await?;

        Ok(batch)
    }

    /// Close an upload batch with its final counts and row errors.
    #[instrument(skip(self, errors), fields(batch_id = %batch_id))]
    pub async fn finish_upload_batch(
        &self,
        batch_id: Uuid,
        status: UploadStatus,
        succeeded: i32,
        failed: i32,
        skipped: i32,
        errors: &[RowError],
    ) -> Result<UploadBatch, AppError> {
        let errors_json = serde_json::to_value(errors)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode row errors: {}", e)))?;

        let batch = sqlx::query_as::<_, UploadBatch>(&format!(
            r#"
            UPDATE upload_batches
            SET status = $2, succeeded = $3, failed = $4, skipped = $5,
                errors = $6, finished_utc = NOW()
            WHERE batch_id = $1
            RETURNING {BATCH_COLUMNS}
            "#,
        ))
        .bind(batch_id)
        .bind(status.as_str())
        .bind(succeeded)
        .bind(failed)
        .bind(skipped)
        .bind(errors_json)
        .fetch_one(self.pool())
        .await?;

        info!(
            batch_id = %batch_id,
            status = status.as_str(),
            succeeded,
            failed,
            skipped,
            "Upload batch finished"
        );

        Ok(batch)
    }

    /// Get an upload batch by ID.
    #[instrument(skip(self), fields(company_id = %company_id, batch_id = %batch_id))]
    pub async fn get_upload_batch(
        &self,
        company_id: Uuid,
        batch_id: Uuid,
    ) -> Result<Option<UploadBatch>, AppError> {
        let batch = sqlx::query_as::<_, UploadBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM upload_batches WHERE company_id = $1 AND batch_id = $2",
        ))
        .bind(company_id)
        .bind(batch_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(batch)
    }

    /// Upload history for a company, newest first.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn list_upload_batches(
        &self,
        company_id: Uuid,
        page_size: i32,
    ) -> Result<Vec<UploadBatch>, AppError> {
        let limit = page_size.clamp(1, 100) as i64;

        let batches = sqlx::query_as::<_, UploadBatch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM upload_batches
            WHERE company_id = $1
            ORDER BY started_utc DESC
            LIMIT $2
            "#,
        ))
        .bind(company_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(batches)
    }

    /// Insert a chunk of uploaded client rows.
    ///
    /// The whole chunk goes in one transaction. If any statement fails the
    /// transaction is rolled back and each row is retried on its own, so one
    /// bad row does not take its neighbours down with it.
    #[instrument(skip(self, rows), fields(company_id = %company_id, rows = rows.len()))]
    pub async fn insert_clients_chunk(
        &self,
        company_id: Uuid,
        rows: &[CreateClient],
    ) -> Result<Vec<RowOutcome>, AppError> {
        let timer = Self::timer("insert_clients_chunk");

        let chunk_result = async {
            let mut tx = self.pool().begin().await?;
            let mut outcomes = Vec::with_capacity(rows.len());
            for row in rows {
                let result = insert_client_row(&mut *tx, company_id, row).await?;
                outcomes.push(result);
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(outcomes)
        }
        .await;

        let outcomes = match chunk_result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, "Client chunk insert failed, retrying row by row");
                let mut outcomes = Vec::with_capacity(rows.len());
                for row in rows {
                    let outcome = match insert_client_row(self.pool(), company_id, row).await {
                        Ok(outcome) => outcome,
                        Err(e) => RowOutcome::Failed(row_error_message(&e)),
                    };
                    outcomes.push(outcome);
                }
                outcomes
            }
        };

        timer.observe_duration();

        Ok(outcomes)
    }

    /// Insert a chunk of uploaded product rows. Same transaction semantics
    /// as [`Database::insert_clients_chunk`].
    #[instrument(skip(self, rows), fields(company_id = %company_id, rows = rows.len()))]
    pub async fn insert_products_chunk(
        &self,
        company_id: Uuid,
        rows: &[CreateProduct],
    ) -> Result<Vec<RowOutcome>, AppError> {
        let timer = Self::timer("insert_products_chunk");

        let chunk_result = async {
            let mut tx = self.pool().begin().await?;
            let mut outcomes = Vec::with_capacity(rows.len());
            for row in rows {
                let result = insert_product_row(&mut *tx, company_id, row).await?;
                outcomes.push(result);
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(outcomes)
        }
        .await;

        let outcomes = match chunk_result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, "Product chunk insert failed, retrying row by row");
                let mut outcomes = Vec::with_capacity(rows.len());
                for row in rows {
                    let outcome = match insert_product_row(self.pool(), company_id, row).await {
                        Ok(outcome) => outcome,
                        Err(e) => RowOutcome::Failed(row_error_message(&e)),
                    };
                    outcomes.push(outcome);
                }
                outcomes
            }
        };

        timer.observe_duration();

        Ok(outcomes)
    }
}

fn row_error_message(e: &sqlx::Error) -> String {
    match e {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

async fn insert_client_row<'e, E>(
    executor: E,
    company_id: Uuid,
    row: &CreateClient,
) -> Result<RowOutcome, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO clients (
            client_id, company_id, name, email, phone,
            billing_line1, billing_line2, billing_city, billing_state,
            billing_postal_code, billing_country, tax_number, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (company_id, lower(email)) WHERE email IS NOT NULL DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(&row.name)
    .bind(&row.email)
    .bind(&row.phone)
    .bind(&row.billing_line1)
    .bind(&row.billing_line2)
    .bind(&row.billing_city)
    .bind(&row.billing_state)
    .bind(&row.billing_postal_code)
    .bind(&row.billing_country)
    .bind(&row.tax_number)
    .bind(&row.notes)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        Ok(RowOutcome::Skipped)
    } else {
        Ok(RowOutcome::Inserted)
    }
}

async fn insert_product_row<'e, E>(
    executor: E,
    company_id: Uuid,
    row: &CreateProduct,
) -> Result<RowOutcome, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            product_id, company_id, name, sku, description, unit_price, currency, tax_rate
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (company_id, sku) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(&row.name)
    .bind(&row.sku)
    .bind(&row.description)
    .bind(row.unit_price)
    .bind(&row.currency)
    .bind(row.tax_rate)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        Ok(RowOutcome::Skipped)
    } else {
        Ok(RowOutcome::Inserted)
    }
}
