//! Invoice lifecycle handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use platform_core::error::AppError;
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::invoices::{
    CreateInvoiceRequest, InvoiceItemRequest, InvoiceListResponse, InvoiceResponse,
    IssueInvoiceRequest, ListInvoicesQuery, SendInvoiceResponse, UpdateInvoiceRequest,
};
use crate::dtos::payments::{PaymentListResponse, RecordPaymentRequest};
use crate::middleware::CurrentUser;
use crate::models::{
    CreateInvoice, CreateInvoiceItem, CreatePayment, Invoice, InvoiceStatus, ListInvoicesFilter,
    PaymentMethod, UpdateInvoice,
};
use crate::services::database::PaymentOutcome;
use crate::services::gateway::PaymentLinkCustomer;
use crate::services::mailer::InvoiceEmail;
use crate::services::metrics::{INVOICES_TOTAL, PAYMENTS_TOTAL};
use crate::services::{pdf, storage};
use crate::startup::AppState;

const DEFAULT_PAGE_SIZE: i32 = 50;

/// Resolve request line items against the product catalog. Product rows
/// supply price, tax rate, and description unless the request overrides
/// them; inline items must be self-contained.
async fn resolve_items(
    state: &AppState,
    company_id: Uuid,
    items: &[InvoiceItemRequest],
) -> Result<Vec<CreateInvoiceItem>, AppError> {
    let mut resolved = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Item quantity must be positive"
            )));
        }

        let (description, unit_price, tax_rate) = match item.product_id {
            Some(product_id) => {
                let product = state
                    .db
                    .get_product(company_id, product_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
                (
                    item.description.clone().unwrap_or(product.name),
                    item.unit_price.unwrap_or(product.unit_price),
                    item.tax_rate.unwrap_or(product.tax_rate),
                )
            }
            None => {
                let description = item.description.clone().ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Items without a product need a description"
                    ))
                })?;
                let unit_price = item.unit_price.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Items without a product need a unit price"
                    ))
                })?;
                (description, unit_price, item.tax_rate.unwrap_or(Decimal::ZERO))
            }
        };

        if unit_price < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unit price must not be negative"
            )));
        }
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Tax rate must be between 0 and 100"
            )));
        }

        resolved.push(CreateInvoiceItem {
            product_id: item.product_id,
            description,
            quantity: item.quantity,
            unit_price,
            tax_rate,
        });
    }

    Ok(resolved)
}

async fn invoice_response(
    state: &AppState,
    invoice: Invoice,
) -> Result<InvoiceResponse, AppError> {
    let items = state
        .db
        .get_invoice_items(invoice.company_id, invoice.invoice_id)
        .await?;
    Ok(InvoiceResponse::new(invoice, Some(items)))
}

/// POST /api/invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    req.validate()?;

    let company = state
        .db
        .get_company(current_user.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;

    let items = resolve_items(&state, current_user.company_id, &req.items).await?;

    let input = CreateInvoice {
        company_id: current_user.company_id,
        client_id: req.client_id,
        currency: req
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or(company.currency),
        due_date: req.due_date,
        notes: req.notes,
        items,
    };

    let invoice = state.db.create_invoice(&input).await?;

    INVOICES_TOTAL.with_label_values(&["created"]).inc();

    Ok((
        StatusCode::CREATED,
        Json(invoice_response(&state, invoice).await?),
    ))
}

/// GET /api/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Date range start must not be after its end"
            )));
        }
    }

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let (status, overdue_before) = match query.status {
        Some(InvoiceStatus::Overdue) => (None, Some(Utc::now().date_naive())),
        other => (other, None),
    };
    let filter = ListInvoicesFilter {
        status,
        overdue_before,
        client_id: query.client_id,
        start_date: query.from,
        end_date: query.to,
        page_size,
        page_token: query.page_token,
    };

    let invoices = state
        .db
        .list_invoices(current_user.company_id, &filter)
        .await?;

    let next_page_token = if invoices.len() as i32 == page_size.clamp(1, 100) {
        invoices.last().map(|i| i.invoice_id)
    } else {
        None
    };

    Ok(Json(InvoiceListResponse {
        invoices: invoices
            .into_iter()
            .map(|i| InvoiceResponse::new(i, None))
            .collect(),
        next_page_token,
    }))
}

/// GET /api/invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(current_user.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// PATCH /api/invoices/:id
pub async fn update_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    req.validate()?;

    let items = match &req.items {
        Some(items) => Some(resolve_items(&state, current_user.company_id, items).await?),
        None => None,
    };

    let update = UpdateInvoice {
        client_id: req.client_id,
        currency: req.currency.map(|c| c.to_uppercase()),
        due_date: req.due_date,
        notes: req.notes,
        items,
    };

    let invoice = state
        .db
        .update_invoice(current_user.company_id, invoice_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// DELETE /api/invoices/:id
pub async fn delete_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let invoice = state
        .db
        .get_invoice(current_user.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if invoice.status != "draft" {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Only draft invoices can be deleted"
        )));
    }

    state
        .db
        .delete_invoice(current_user.company_id, invoice_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/invoices/:id/issue
pub async fn issue_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<IssueInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let issue_date = req.issue_date.unwrap_or_else(|| Utc::now().date_naive());

    let invoice = state
        .db
        .issue_invoice(current_user.company_id, invoice_id, issue_date, req.due_date)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    INVOICES_TOTAL.with_label_values(&["issued"]).inc();

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// POST /api/invoices/:id/send
///
/// Renders the PDF, stores it, creates a payment link when the gateway is
/// configured, and emails the client. Gateway and email failures degrade:
/// the invoice stays issued and the response reports what happened.
pub async fn send_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<SendInvoiceResponse>, AppError> {
    let mut invoice = state
        .db
        .get_invoice(current_user.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if invoice.status != "issued" && invoice.status != "partially_paid" {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Only issued invoices can be sent"
        )));
    }

    let company = state
        .db
        .get_company(current_user.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company not found")))?;
    let client = state
        .db
        .get_client(current_user.company_id, invoice.client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;
    let items = state
        .db
        .get_invoice_items(current_user.company_id, invoice_id)
        .await?;

    // Render and store the PDF.
    let pdf_bytes = pdf::render_invoice_pdf(&company, &client, &invoice, &items)?;
    let pdf_key = storage::invoice_pdf_key(current_user.company_id, invoice_id);
    state.storage.upload(&pdf_key, pdf_bytes.clone()).await?;
    state
        .db
        .set_pdf_key(current_user.company_id, invoice_id, &pdf_key)
        .await?;
    invoice.pdf_key = Some(pdf_key);

    // Payment link, reused across repeated sends.
    let invoice_number = invoice
        .invoice_number
        .clone()
        .unwrap_or_else(|| invoice_id.to_string());

    if invoice.payment_link_url.is_none() && state.gateway.is_configured() {
        let customer = PaymentLinkCustomer {
            name: client.name.clone(),
            email: client.email.clone(),
        };
        match state
            .gateway
            .create_payment_link(
                invoice.amount_due,
                &invoice.currency,
                &format!("Invoice {}", invoice_number),
                Some(invoice_number.clone()),
                Some(customer),
            )
            .await
        {
            Ok(link) => {
                state
                    .db
                    .set_payment_link(current_user.company_id, invoice_id, &link.id, &link.short_url)
                    .await?;
                invoice.payment_link_id = Some(link.id);
                invoice.payment_link_url = Some(link.short_url);
            }
            Err(e) => {
                warn!(error = %e, "Payment link creation failed, sending without one");
            }
        }
    }

    // Email, best effort when the client has an address.
    let mut email_sent = false;
    if let Some(to) = client.email.clone() {
        let email = InvoiceEmail {
            to,
            client_name: client.name.clone(),
            invoice_number: invoice_number.clone(),
            total: invoice.total.to_string(),
            currency: invoice.currency.clone(),
            due_date: invoice.due_date.map(|d| d.to_string()),
            payment_link_url: invoice.payment_link_url.clone(),
            pdf: Some(pdf_bytes),
        };
        match state.mailer.send_invoice(email).await {
            Ok(sent) => email_sent = sent,
            Err(e) => warn!(error = %e, "Invoice email failed"),
        }
    }

    INVOICES_TOTAL.with_label_values(&["sent"]).inc();

    let payment_link_url = invoice.payment_link_url.clone();
    Ok(Json(SendInvoiceResponse {
        invoice: invoice_response(&state, invoice).await?,
        email_sent,
        payment_link_url,
    }))
}

/// POST /api/invoices/:id/void
pub async fn void_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .void_invoice(current_user.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    // Cancel any open payment link so the client cannot pay a void invoice.
    if let Some(link_id) = &invoice.payment_link_id {
        if let Err(e) = state.gateway.cancel_payment_link(link_id).await {
            warn!(error = %e, link_id = %link_id, "Payment link cancellation failed");
        }
    }

    INVOICES_TOTAL.with_label_values(&["voided"]).inc();

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// GET /api/invoices/:id/pdf
pub async fn download_pdf(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .get_invoice(current_user.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let pdf_key = invoice
        .pdf_key
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice has no stored PDF")))?;

    let bytes = state.storage.download(&pdf_key).await?;

    let filename = invoice
        .invoice_number
        .unwrap_or_else(|| invoice_id.to_string());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.pdf\"", filename),
            ),
        ],
        bytes,
    ))
}

/// POST /api/invoices/:id/payments
pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let input = CreatePayment {
        company_id: current_user.company_id,
        invoice_id,
        amount: req.amount,
        method: PaymentMethod::Manual,
        gateway_payment_id: None,
        reference: req.reference,
        paid_date: req.paid_date.unwrap_or_else(|| Utc::now().date_naive()),
    };

    match state.db.record_payment(&input).await? {
        PaymentOutcome::Applied(_) => {
            PAYMENTS_TOTAL.with_label_values(&["manual"]).inc();
        }
        // Manual payments carry no gateway id, so replay cannot happen.
        PaymentOutcome::Replayed => {}
    }

    let invoice = state
        .db
        .get_invoice(current_user.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    if invoice.status == "paid" {
        INVOICES_TOTAL.with_label_values(&["paid"]).inc();
    }

    Ok((
        StatusCode::CREATED,
        Json(invoice_response(&state, invoice).await?),
    ))
}

/// GET /api/invoices/:id/payments
pub async fn list_payments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<PaymentListResponse>, AppError> {
    if state
        .db
        .get_invoice(current_user.company_id, invoice_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    let payments = state
        .db
        .list_payments(current_user.company_id, invoice_id)
        .await?;

    Ok(Json(PaymentListResponse { payments }))
}
