//! Registration, login, and token refresh.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use platform_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::auth::{
    LoginRequest, MeResponse, RefreshRequest, RegisterRequest, RegisterResponse,
};
use crate::middleware::CurrentUser;
use crate::models::UpdateCompany;
use crate::services::jwt::TokenResponse;
use crate::startup::AppState;
use crate::utils::password::{hash_password, verify_password, Password};

/// POST /api/auth/register
///
/// Creates a company (tenant) with its owner account.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    req.validate()?;

    let password = Password::new(req.password);
    let password_hash = hash_password(&password)?;

    let currency = req.currency.as_deref().unwrap_or("EUR").to_uppercase();
    let full_name = req.name.clone().unwrap_or_else(|| req.email.clone());

    let (company, user) = state
        .db
        .register_company(
            &req.company_name,
            &req.email,
            &full_name,
            &password_hash,
            &currency,
        )
        .await?;

    if let Some(prefix) = req.invoice_prefix {
        state
            .db
            .update_company(
                company.company_id,
                &UpdateCompany {
                    invoice_prefix: Some(prefix),
                    ..Default::default()
                },
            )
            .await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.user_id.to_string(),
            company_id: company.company_id.to_string(),
            message: "Registration successful".to_string(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate()?;

    let user = state
        .db
        .get_user_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Invalid credentials")))?;

    let password = Password::new(req.password);
    verify_password(&password, &user.password_hash)
        .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid credentials")))?;

    issue_tokens(&state, user.user_id, user.company_id, &user.email).await
}

/// POST /api/auth/refresh
///
/// Rotates the refresh token: the presented token is revoked and a new
/// pair is issued. A replayed token gets a 401.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let claims = state
        .jwt
        .validate_refresh_token(&req.refresh_token)
        .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid refresh token")))?;

    let token_id = Uuid::parse_str(&claims.jti)
        .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid refresh token")))?;

    let user_id = state
        .db
        .consume_refresh_token(token_id, &req.refresh_token)
        .await?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Refresh token already used or expired")))?;

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("User no longer exists")))?;

    issue_tokens(&state, user.user_id, user.company_id, &user.email).await
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .db
        .get_user(current_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let company = state
        .db
        .get_company(current_user.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    Ok(Json(MeResponse { user, company }))
}

async fn issue_tokens(
    state: &AppState,
    user_id: Uuid,
    company_id: Uuid,
    email: &str,
) -> Result<Json<TokenResponse>, AppError> {
    let access_token = state.jwt.generate_access_token(user_id, company_id, email)?;

    let token_id = Uuid::new_v4();
    let refresh_token = state.jwt.generate_refresh_token(user_id, token_id)?;

    let expires_utc = Utc::now() + Duration::days(state.config.auth.refresh_token_expiry_days);
    state
        .db
        .store_refresh_token(token_id, user_id, &refresh_token, expires_utc)
        .await?;

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
    }))
}
