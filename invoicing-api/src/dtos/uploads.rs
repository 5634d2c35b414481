use serde::{Deserialize, Serialize};

use crate::models::UploadBatch;

#[derive(Debug, Deserialize)]
pub struct ListUploadsQuery {
    pub page_size: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UploadListResponse {
    pub uploads: Vec<UploadBatch>,
}
