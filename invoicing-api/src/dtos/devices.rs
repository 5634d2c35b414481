use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Device;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceRequest {
    #[validate(length(min = 1, message = "Device token is required"))]
    pub token: String,

    /// "android" or "ios".
    #[validate(length(min = 1, message = "Platform is required"))]
    pub platform: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<Device>,
}
