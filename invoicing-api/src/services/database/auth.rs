//! Companies, users, refresh tokens, and device registrations.

use super::Database;
use crate::models::{Company, Device, UpdateCompany, User};
use chrono::{DateTime, Utc};
use platform_core::error::AppError;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use uuid::Uuid;

const COMPANY_COLUMNS: &str = "company_id, name, email, phone, address_line1, address_line2, \
     city, state, postal_code, country, tax_number, currency, invoice_prefix, created_utc, updated_utc";

const USER_COLUMNS: &str =
    "user_id, company_id, email, password_hash, full_name, role, created_utc";

/// Hash a refresh token for at-rest storage.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl Database {
    /// Create a company and its owner user in one transaction.
    #[instrument(skip(self, password_hash))]
    pub async fn register_company(
        &self,
        company_name: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
        currency: &str,
    ) -> Result<(Company, User), AppError> {
        let timer = Self::timer("register_company");

        let mut tx = self.pool().begin().await?;

        let company_id = Uuid::new_v4();
        let company = sqlx::query_as::<_, Company>(&format!(
            r#"
            INSERT INTO companies (company_id, name, email, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMPANY_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(company_name)
        .bind(email)
        .bind(currency)
        .fetch_one(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (user_id, company_id, email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4, $5, 'owner')
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("An account with this email already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)),
        })?;

        tx.commit().await?;

        timer.observe_duration();

        info!(company_id = %company.company_id, user_id = %user.user_id, "Company registered");

        Ok((company, user))
    }

    /// Look up a user by email (login).
    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let timer = Self::timer("get_user_by_email");

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)",
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(user)
    }

    /// Look up a user by id.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1",
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }

    /// Get a company by id.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE company_id = $1",
        ))
        .bind(company_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(company)
    }

    /// Update a company profile.
    #[instrument(skip(self, input), fields(company_id = %company_id))]
    pub async fn update_company(
        &self,
        company_id: Uuid,
        input: &UpdateCompany,
    ) -> Result<Option<Company>, AppError> {
        let timer = Self::timer("update_company");

        let company = sqlx::query_as::<_, Company>(&format!(
            r#"
            UPDATE companies
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                address_line1 = COALESCE($4, address_line1),
                address_line2 = COALESCE($5, address_line2),
                city = COALESCE($6, city),
                state = COALESCE($7, state),
                postal_code = COALESCE($8, postal_code),
                country = COALESCE($9, country),
                tax_number = COALESCE($10, tax_number),
                currency = COALESCE($11, currency),
                invoice_prefix = COALESCE($12, invoice_prefix),
                updated_utc = NOW()
            WHERE company_id = $1
            RETURNING {COMPANY_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.tax_number)
        .bind(&input.currency)
        .bind(&input.invoice_prefix)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(company)
    }

    // -------------------------------------------------------------------------
    // Refresh tokens
    // -------------------------------------------------------------------------

    /// Store a refresh token (hashed).
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn store_refresh_token(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        token: &str,
        expires_utc: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_id, user_id, token_hash, expires_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token_id)
        .bind(user_id)
        .bind(hash_refresh_token(token))
        .bind(expires_utc)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Consume a refresh token: revoke it if it is live and the hash
    /// matches. Returns the owning user id, or None when the token is
    /// unknown, expired, or already used.
    #[instrument(skip(self, token))]
    pub async fn consume_refresh_token(
        &self,
        token_id: Uuid,
        token: &str,
    ) -> Result<Option<Uuid>, AppError> {
        let timer = Self::timer("consume_refresh_token");

        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE refresh_tokens
            SET revoked_utc = NOW()
            WHERE token_id = $1
              AND token_hash = $2
              AND revoked_utc IS NULL
              AND expires_utc > NOW()
            RETURNING user_id
            "#,
        )
        .bind(token_id)
        .bind(hash_refresh_token(token))
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(user_id)
    }

    // -------------------------------------------------------------------------
    // Devices
    // -------------------------------------------------------------------------

    /// Register a device token for push notifications (idempotent per
    /// company/token pair).
    #[instrument(skip(self, token), fields(company_id = %company_id, user_id = %user_id))]
    pub async fn register_device(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        token: &str,
        platform: &str,
    ) -> Result<Device, AppError> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (device_id, company_id, user_id, token, platform)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (company_id, token)
            DO UPDATE SET user_id = EXCLUDED.user_id, platform = EXCLUDED.platform
            RETURNING device_id, company_id, user_id, token, platform, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(user_id)
        .bind(token)
        .bind(platform)
        .fetch_one(self.pool())
        .await?;

        Ok(device)
    }

    /// Device tokens registered for a company.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn list_devices(&self, company_id: Uuid) -> Result<Vec<Device>, AppError> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT device_id, company_id, user_id, token, platform, created_utc
            FROM devices
            WHERE company_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(company_id)
        .fetch_all(self.pool())
        .await?;

        Ok(devices)
    }
}
