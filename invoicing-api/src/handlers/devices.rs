//! Push notification device registration.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use platform_core::error::AppError;
use validator::Validate;

use crate::dtos::devices::{DeviceListResponse, RegisterDeviceRequest};
use crate::middleware::CurrentUser;
use crate::models::Device;
use crate::startup::AppState;

/// POST /api/devices
///
/// Idempotent per company/token pair.
pub async fn register_device(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), AppError> {
    req.validate()?;

    let platform = req.platform.to_lowercase();
    if platform != "android" && platform != "ios" {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Platform must be android or ios"
        )));
    }

    let device = state
        .db
        .register_device(
            current_user.company_id,
            current_user.user_id,
            &req.token,
            &platform,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(device)))
}

/// GET /api/devices
pub async fn list_devices(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<DeviceListResponse>, AppError> {
    let devices = state.db.list_devices(current_user.company_id).await?;

    Ok(Json(DeviceListResponse { devices }))
}
