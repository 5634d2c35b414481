//! Push notification device registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A device token registered for push notifications.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub device_id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub platform: String,
    pub created_utc: DateTime<Utc>,
}
