//! Client CRUD, tenant-scoped.

use super::Database;
use crate::models::{Client, CreateClient, ListClientsFilter, UpdateClient};
use platform_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl Database {
    /// Create a new client.
    #[instrument(skip(self, input), fields(company_id = %input.company_id))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = Self::timer("create_client");

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                client_id, company_id, name, email, phone,
                billing_line1, billing_line2, billing_city, billing_state,
                billing_postal_code, billing_country, tax_number, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING client_id, company_id, name, email, phone,
                billing_line1, billing_line2, billing_city, billing_state,
                billing_postal_code, billing_country, tax_number, notes,
                archived, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.billing_line1)
        .bind(&input.billing_line2)
        .bind(&input.billing_city)
        .bind(&input.billing_state)
        .bind(&input.billing_postal_code)
        .bind(&input.billing_country)
        .bind(&input.tax_number)
        .bind(&input.notes)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A client with this email already exists"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)),
        })?;

        timer.observe_duration();

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(company_id = %company_id, client_id = %client_id))]
    pub async fn get_client(
        &self,
        company_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let timer = Self::timer("get_client");

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, company_id, name, email, phone,
                billing_line1, billing_line2, billing_city, billing_state,
                billing_postal_code, billing_country, tax_number, notes,
                archived, created_utc, updated_utc
            FROM clients
            WHERE company_id = $1 AND client_id = $2
            "#,
        )
        .bind(company_id)
        .bind(client_id)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(client)
    }

    /// List clients for a company.
    #[instrument(skip(self, filter), fields(company_id = %company_id))]
    pub async fn list_clients(
        &self,
        company_id: Uuid,
        filter: &ListClientsFilter,
    ) -> Result<Vec<Client>, AppError> {
        let timer = Self::timer("list_clients");

        let limit = filter.page_size.clamp(1, 100) as i64;
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let clients = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Client>(
                r#"
                SELECT client_id, company_id, name, email, phone,
                    billing_line1, billing_line2, billing_city, billing_state,
                    billing_postal_code, billing_country, tax_number, notes,
                    archived, created_utc, updated_utc
                FROM clients
                WHERE company_id = $1
                  AND ($2::bool = TRUE OR archived = FALSE)
                  AND ($3::varchar IS NULL OR name ILIKE $3 OR email ILIKE $3)
                  AND client_id > $4
                ORDER BY client_id
                LIMIT $5
                "#,
            )
            .bind(company_id)
            .bind(filter.include_archived)
            .bind(&search)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, Client>(
                r#"
                SELECT client_id, company_id, name, email, phone,
                    billing_line1, billing_line2, billing_city, billing_state,
                    billing_postal_code, billing_country, tax_number, notes,
                    archived, created_utc, updated_utc
                FROM clients
                WHERE company_id = $1
                  AND ($2::bool = TRUE OR archived = FALSE)
                  AND ($3::varchar IS NULL OR name ILIKE $3 OR email ILIKE $3)
                ORDER BY client_id
                LIMIT $4
                "#,
            )
            .bind(company_id)
            .bind(filter.include_archived)
            .bind(&search)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Update a client.
    #[instrument(skip(self, input), fields(company_id = %company_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        company_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = Self::timer("update_client");

        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                billing_line1 = COALESCE($6, billing_line1),
                billing_line2 = COALESCE($7, billing_line2),
                billing_city = COALESCE($8, billing_city),
                billing_state = COALESCE($9, billing_state),
                billing_postal_code = COALESCE($10, billing_postal_code),
                billing_country = COALESCE($11, billing_country),
                tax_number = COALESCE($12, tax_number),
                notes = COALESCE($13, notes),
                archived = COALESCE($14, archived),
                updated_utc = NOW()
            WHERE company_id = $1 AND client_id = $2
            RETURNING client_id, company_id, name, email, phone,
                billing_line1, billing_line2, billing_city, billing_state,
                billing_postal_code, billing_country, tax_number, notes,
                archived, created_utc, updated_utc
            "#,
        )
        .bind(company_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.billing_line1)
        .bind(&input.billing_line2)
        .bind(&input.billing_city)
        .bind(&input.billing_state)
        .bind(&input.billing_postal_code)
        .bind(&input.billing_country)
        .bind(&input.tax_number)
        .bind(&input.notes)
        .bind(input.archived)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A client with this email already exists"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)),
        })?;

        timer.observe_duration();

        Ok(client)
    }

    /// Delete a client. Archives instead when invoices reference it.
    /// Returns true when the row was deleted, false when it was archived.
    #[instrument(skip(self), fields(company_id = %company_id, client_id = %client_id))]
    pub async fn delete_client(
        &self,
        company_id: Uuid,
        client_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = Self::timer("delete_client");

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM invoices WHERE company_id = $1 AND client_id = $2)",
        )
        .bind(company_id)
        .bind(client_id)
        .fetch_one(self.pool())
        .await?;

        let rows = if referenced {
            sqlx::query(
                "UPDATE clients SET archived = TRUE, updated_utc = NOW()
                 WHERE company_id = $1 AND client_id = $2",
            )
            .bind(company_id)
            .bind(client_id)
            .execute(self.pool())
            .await?
            .rows_affected()
        } else {
            sqlx::query("DELETE FROM clients WHERE company_id = $1 AND client_id = $2")
                .bind(company_id)
                .bind(client_id)
                .execute(self.pool())
                .await?
                .rows_affected()
        };

        timer.observe_duration();

        if rows == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }

        info!(client_id = %client_id, archived = referenced, "Client removed");

        Ok(!referenced)
    }
}
