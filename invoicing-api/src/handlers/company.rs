//! Company profile management.

use axum::extract::{Json, State};
use platform_core::error::AppError;
use validator::Validate;

use crate::dtos::auth::UpdateCompanyRequest;
use crate::middleware::CurrentUser;
use crate::models::{Company, UpdateCompany};
use crate::startup::AppState;

/// GET /api/company
pub async fn get_company(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Company>, AppError> {
    let company = state
        .db
        .get_company(current_user.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    Ok(Json(company))
}

/// PATCH /api/company
pub async fn update_company(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<Json<Company>, AppError> {
    req.validate()?;

    let update = UpdateCompany {
        name: req.name,
        phone: req.phone,
        address_line1: req.address_line1,
        address_line2: req.address_line2,
        city: req.city,
        state: req.state,
        postal_code: req.postal_code,
        country: req.country,
        tax_number: req.tax_number,
        currency: req.currency.map(|c| c.to_uppercase()),
        invoice_prefix: req.invoice_prefix,
    };

    let company = state
        .db
        .update_company(current_user.company_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    Ok(Json(company))
}
