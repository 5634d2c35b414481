//! Bulk upload endpoints.

use axum::{
    extract::{Json, Multipart, Path, Query, State},
    http::StatusCode,
};
use platform_core::error::AppError;
use uuid::Uuid;

use crate::dtos::uploads::{ListUploadsQuery, UploadListResponse};
use crate::middleware::CurrentUser;
use crate::models::{UploadBatch, UploadEntity};
use crate::services::bulk::BulkUploadService;
use crate::startup::AppState;

fn parse_entity(entity: &str) -> Result<UploadEntity, AppError> {
    match entity {
        "clients" => Ok(UploadEntity::Clients),
        "products" => Ok(UploadEntity::Products),
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown upload entity: {}",
            other
        ))),
    }
}

/// POST /api/uploads/:entity/import
///
/// Multipart upload with a single `file` field holding the CSV or XLSX.
pub async fn upload(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entity): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadBatch>), AppError> {
    let entity = parse_entity(&entity)?;

    let mut filename = None;
    let mut bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read upload: {}", e)))?;
            bytes = Some(data);
        }
    }

    let filename =
        filename.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing file field")))?;
    let bytes =
        bytes.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing file field")))?;

    if bytes.len() > state.config.upload.max_file_bytes {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File exceeds the {} byte limit",
            state.config.upload.max_file_bytes
        )));
    }

    let service = BulkUploadService::new(state.db.clone(), state.config.upload.batch_size);
    let batch = service
        .process(current_user.company_id, entity, &filename, &bytes)
        .await?;

    Ok((StatusCode::CREATED, Json(batch)))
}

/// GET /api/uploads
pub async fn list_uploads(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListUploadsQuery>,
) -> Result<Json<UploadListResponse>, AppError> {
    let uploads = state
        .db
        .list_upload_batches(current_user.company_id, query.page_size.unwrap_or(50))
        .await?;

    Ok(Json(UploadListResponse { uploads }))
}

/// GET /api/uploads/:id
pub async fn get_upload(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<UploadBatch>, AppError> {
    let batch = state
        .db
        .get_upload_batch(current_user.company_id, batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Upload batch not found")))?;

    Ok(Json(batch))
}
