//! Product catalog CRUD.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::products::{
    CreateProductRequest, DeleteProductResponse, ListProductsQuery, ProductListResponse,
    UpdateProductRequest,
};
use crate::middleware::CurrentUser;
use crate::models::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
use crate::startup::AppState;

const DEFAULT_PAGE_SIZE: i32 = 50;

fn validate_tax_rate(rate: Decimal) -> Result<(), AppError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate must be between 0 and 100"
        )));
    }
    Ok(())
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    req.validate()?;

    if req.unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unit price must not be negative"
        )));
    }
    let tax_rate = req.tax_rate.unwrap_or(Decimal::ZERO);
    validate_tax_rate(tax_rate)?;

    let company = state
        .db
        .get_company(current_user.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    let input = CreateProduct {
        company_id: current_user.company_id,
        name: req.name,
        sku: req.sku,
        description: req.description,
        unit_price: req.unit_price,
        currency: req
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or(company.currency),
        tax_rate,
    };

    let product = state.db.create_product(&input).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ProductListResponse>, AppError> {
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let filter = ListProductsFilter {
        search: query.search,
        include_archived: query.include_archived,
        page_size,
        page_token: query.page_token,
    };

    let products = state
        .db
        .list_products(current_user.company_id, &filter)
        .await?;

    let next_page_token = if products.len() as i32 == page_size.clamp(1, 100) {
        products.last().map(|p| p.product_id)
    } else {
        None
    };

    Ok(Json(ProductListResponse {
        products,
        next_page_token,
    }))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(current_user.company_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

/// PATCH /api/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    req.validate()?;

    if let Some(price) = req.unit_price {
        if price < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unit price must not be negative"
            )));
        }
    }
    if let Some(rate) = req.tax_rate {
        validate_tax_rate(rate)?;
    }

    let update = UpdateProduct {
        name: req.name,
        description: req.description,
        unit_price: req.unit_price,
        currency: req.currency.map(|c| c.to_uppercase()),
        tax_rate: req.tax_rate,
        archived: req.archived,
    };

    let product = state
        .db
        .update_product(current_user.company_id, product_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

/// DELETE /api/products/:id
///
/// Deletes the product, or archives it when invoice items reference it.
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<DeleteProductResponse>, AppError> {
    if state
        .db
        .get_product(current_user.company_id, product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
    }

    let deleted = state
        .db
        .delete_product(current_user.company_id, product_id)
        .await?;

    Ok(Json(DeleteProductResponse {
        deleted,
        archived: !deleted,
    }))
}
