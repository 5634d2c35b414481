//! Product CRUD, tenant-scoped.

use super::Database;
use crate::models::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
use platform_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl Database {
    /// Create a new product.
    #[instrument(skip(self, input), fields(company_id = %input.company_id))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = Self::timer("create_product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                product_id, company_id, name, sku, description, unit_price, currency, tax_rate
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING product_id, company_id, name, sku, description, unit_price, currency,
                tax_rate, archived, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(&input.currency)
        .bind(input.tax_rate)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A product with SKU '{}' already exists",
                    input.sku
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)),
        })?;

        timer.observe_duration();

        info!(product_id = %product.product_id, sku = %product.sku, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(company_id = %company_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        company_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let timer = Self::timer("get_product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, company_id, name, sku, description, unit_price, currency,
                tax_rate, archived, created_utc, updated_utc
            FROM products
            WHERE company_id = $1 AND product_id = $2
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products for a company.
    #[instrument(skip(self, filter), fields(company_id = %company_id))]
    pub async fn list_products(
        &self,
        company_id: Uuid,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = Self::timer("list_products");

        let limit = filter.page_size.clamp(1, 100) as i64;
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let products = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Product>(
                r#"
                SELECT product_id, company_id, name, sku, description, unit_price, currency,
                    tax_rate, archived, created_utc, updated_utc
                FROM products
                WHERE company_id = $1
                  AND ($2::bool = TRUE OR archived = FALSE)
                  AND ($3::varchar IS NULL OR name ILIKE $3 OR sku ILIKE $3)
                  AND product_id > $4
                ORDER BY product_id
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
            sqlx::query_as::<_, Product>(
                r#"
                SELECT product_id, company_id, name, sku, description, unit_price, currency,
                    tax_rate, archived, created_utc, updated_utc
                FROM products
                WHERE company_id = $1
                  AND ($2::bool = TRUE OR archived = FALSE)
                  AND ($3::varchar IS NULL OR name ILIKE $3 OR sku ILIKE $3)
                ORDER BY product_id
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
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product. SKU is immutable.
    #[instrument(skip(self, input), fields(company_id = %company_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = Self::timer("update_product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                unit_price = COALESCE($5, unit_price),
                currency = COALESCE($6, currency),
                tax_rate = COALESCE($7, tax_rate),
                archived = COALESCE($8, archived),
                updated_utc = NOW()
            WHERE company_id = $1 AND product_id = $2
            RETURNING product_id, company_id, name, sku, description, unit_price, currency,
                tax_rate, archived, created_utc, updated_utc
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(&input.currency)
        .bind(input.tax_rate)
        .bind(input.archived)
        .fetch_optional(self.pool())
        .await?;

        timer.observe_duration();

        Ok(product)
    }

    /// Delete a product. Archives instead when invoice items reference it.
    /// Returns true when the row was deleted, false when it was archived.
    #[instrument(skip(self), fields(company_id = %company_id, product_id = %product_id))]
    pub async fn delete_product(
        &self,
        company_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = Self::timer("delete_product");

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM invoice_items WHERE company_id = $1 AND product_id = $2)",
        )
        .bind(company_id)
        .bind(product_id)
        .fetch_one(self.pool())
        .await?;

        let rows = if referenced {
            sqlx::query(
                "UPDATE products SET archived = TRUE, updated_utc = NOW()
                 WHERE company_id = $1 AND product_id = $2",
            )
            .bind(company_id)
            .bind(product_id)
            .execute(self.pool())
            .await?
            .rows_affected()
        } else {
            sqlx::query("DELETE FROM products WHERE company_id = $1 AND product_id = $2")
                .bind(company_id)
                .bind(product_id)
                .execute(self.pool())
                .await?
                .rows_affected()
        };

        timer.observe_duration();

        if rows == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
        }

        info!(product_id = %product_id, archived = referenced, "Product removed");

        Ok(!referenced)
    }
}
