//! Client CRUD.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use platform_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::clients::{
    ClientListResponse, CreateClientRequest, DeleteClientResponse, ListClientsQuery,
    UpdateClientRequest,
};
use crate::middleware::CurrentUser;
use crate::models::{Client, CreateClient, ListClientsFilter, UpdateClient};
use crate::startup::AppState;

const DEFAULT_PAGE_SIZE: i32 = 50;

/// POST /api/clients
pub async fn create_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    req.validate()?;

    let input = CreateClient {
        company_id: current_user.company_id,
        name: req.name,
        email: req.email,
        phone: req.phone,
        billing_line1: req.billing_line1,
        billing_line2: req.billing_line2,
        billing_city: req.billing_city,
        billing_state: req.billing_state,
        billing_postal_code: req.billing_postal_code,
        billing_country: req.billing_country,
        tax_number: req.tax_number,
        notes: req.notes,
    };

    let client = state.db.create_client(&input).await?;

    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /api/clients
pub async fn list_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<ClientListResponse>, AppError> {
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let filter = ListClientsFilter {
        search: query.search,
        include_archived: query.include_archived,
        page_size,
        page_token: query.page_token,
    };

    let clients = state.db.list_clients(current_user.company_id, &filter).await?;

    let next_page_token = if clients.len() as i32 == page_size.clamp(1, 100) {
        clients.last().map(|c| c.client_id)
    } else {
        None
    };

    Ok(Json(ClientListResponse {
        clients,
        next_page_token,
    }))
}

/// GET /api/clients/:id
pub async fn get_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = state
        .db
        .get_client(current_user.company_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

/// PATCH /api/clients/:id
pub async fn update_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    req.validate()?;

    let update = UpdateClient {
        name: req.name,
        email: req.email,
        phone: req.phone,
        billing_line1: req.billing_line1,
        billing_line2: req.billing_line2,
        billing_city: req.billing_city,
        billing_state: req.billing_state,
        billing_postal_code: req.billing_postal_code,
        billing_country: req.billing_country,
        tax_number: req.tax_number,
        notes: req.notes,
        archived: req.archived,
    };

    let client = state
        .db
        .update_client(current_user.company_id, client_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

/// DELETE /api/clients/:id
///
/// Deletes the client, or archives it when invoices reference it.
pub async fn delete_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<DeleteClientResponse>, AppError> {
    if state
        .db
        .get_client(current_user.company_id, client_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
    }

    let deleted = state
        .db
        .delete_client(current_user.company_id, client_id)
        .await?;

    Ok(Json(DeleteClientResponse {
        deleted,
        archived: !deleted,
    }))
}
