//! Bearer token authentication.
//!
//! Validates the access token once per request and stashes the claims in
//! request extensions. Handlers pull the caller out with [`CurrentUser`],
//! which also carries the tenant; every database call is scoped to
//! `current_user.company_id`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::{services::jwt::AccessTokenClaims, startup::AppState};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Middleware requiring a valid Bearer access token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => return Err(unauthorized("Missing or invalid Authorization header")),
    };

    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    let span = tracing::info_span!(
        "authenticated",
        user_id = %claims.sub,
        company_id = %claims.company_id,
    );

    req.extensions_mut().insert(claims);

    Ok(next.run(req).instrument(span).await)
}

/// The authenticated caller, with claims already parsed into IDs.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub email: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AccessTokenClaims>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Auth claims missing from request extensions".to_string(),
            }),
        ))?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| unauthorized("Malformed subject claim"))?;
        let company_id = Uuid::parse_str(&claims.company_id)
            .map_err(|_| unauthorized("Malformed tenant claim"))?;

        Ok(CurrentUser {
            user_id,
            company_id,
            email: claims.email.clone(),
        })
    }
}
