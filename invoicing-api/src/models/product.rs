//! Product (catalog item) model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A catalog item. SKU is unique per company.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub currency: String,
    pub tax_rate: Decimal,
    pub archived: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub company_id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub currency: String,
    pub tax_rate: Decimal,
}

/// Input for updating a product.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub archived: Option<bool>,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    pub search: Option<String>,
    pub include_archived: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
