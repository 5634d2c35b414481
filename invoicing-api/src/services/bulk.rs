//! Bulk upload pipeline for clients and products.
//!
//! A spreadsheet (CSV or XLSX) is parsed into raw rows, each row is
//! validated independently, valid rows are inserted in chunks, and the
//! whole run is recorded as an upload batch with per-row errors. One bad
//! row never blocks the rest of the file.

use crate::models::{
    CreateClient, CreateProduct, RowError, UploadBatch, UploadEntity, UploadStatus,
};
use crate::services::database::{Database, RowOutcome};
use crate::services::metrics::UPLOAD_ROWS_TOTAL;
use calamine::{Data, Reader, Xlsx};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{info, instrument};
use uuid::Uuid;

/// A parsed spreadsheet: lowercase headers plus data rows of equal width.
#[derive(Debug)]
pub struct ParsedSheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ParsedSheet {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// One raw cell lookup helper bound to a single data row.
struct RowView<'a> {
    sheet: &'a ParsedSheet,
    row: &'a [String],
}

impl RowView<'_> {
    fn get(&self, column: &str) -> Option<String> {
        let idx = self.sheet.column(column)?;
        let value = self.row.get(idx)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

pub struct BulkUploadService {
    db: Database,
    batch_size: usize,
}

impl BulkUploadService {
    pub fn new(db: Database, batch_size: usize) -> Self {
        Self { db, batch_size }
    }

    /// Run a full upload: parse, validate, insert in chunks, and record the
    /// batch. Returns the finished batch record.
    #[instrument(skip(self, bytes), fields(company_id = %company_id, entity = entity.as_str(), filename = filename))]
    pub async fn process(
        &self,
        company_id: Uuid,
        entity: UploadEntity,
        filename: &str,
        bytes: &[u8],
    ) -> Result<UploadBatch, AppError> {
        let sheet = parse_sheet(filename, bytes)?;
        let total_rows = sheet.rows.len() as i32;

        let batch = self
            .db
            .create_upload_batch(company_id, entity, filename, total_rows)
            .await?;

        let (succeeded, failed, skipped, errors) = match entity {
            UploadEntity::Clients => self.process_clients(company_id, &sheet).await?,
            UploadEntity::Products => self.process_products(company_id, &sheet).await?,
        };

        UPLOAD_ROWS_TOTAL
            .with_label_values(&[entity.as_str(), "succeeded"])
            .inc_by(succeeded as f64);
        UPLOAD_ROWS_TOTAL
            .with_label_values(&[entity.as_str(), "failed"])
            .inc_by(failed as f64);
        UPLOAD_ROWS_TOTAL
            .with_label_values(&[entity.as_str(), "skipped"])
            .inc_by(skipped as f64);

        let status = if succeeded == 0 && failed > 0 {
            UploadStatus::Failed
        } else {
            UploadStatus::Completed
        };

        let batch = self
            .db
            .finish_upload_batch(
                batch.batch_id,
                status,
                succeeded as i32,
                failed as i32,
                skipped as i32,
                &errors,
            )
            .await?;

        info!(
            batch_id = %batch.batch_id,
            total_rows,
            succeeded,
            failed,
            skipped,
            "Bulk upload processed"
        );

        Ok(batch)
    }

    async fn process_clients(
        &self,
        company_id: Uuid,
        sheet: &ParsedSheet,
    ) -> Result<(usize, usize, usize, Vec<RowError>), AppError> {
        let mut errors = Vec::new();
        let mut valid: Vec<(usize, CreateClient)> = Vec::new();
        let mut seen_emails = HashSet::new();
        let mut skipped = 0usize;

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_no = idx + 1;
            let view = RowView { sheet, row };
            match validate_client_row(company_id, &view) {
                Ok(client) => {
                    // First occurrence of an email wins within the file.
                    if let Some(email) = &client.email {
                        if !seen_emails.insert(email.to_lowercase()) {
                            skipped += 1;
                            continue;
                        }
                    }
                    valid.push((row_no, client));
                }
                Err(e) => errors.push(RowError {
                    row: row_no,
                    column: e.0,
                    message: e.1,
                }),
            }
        }

        let mut succeeded = 0usize;
        for chunk in valid.chunks(self.batch_size.max(1)) {
            let rows: Vec<CreateClient> = chunk.iter().map(|(_, c)| c.clone()).collect();
            let outcomes = self.db.insert_clients_chunk(company_id, &rows).await?;
            for ((row_no, _), outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    RowOutcome::Inserted => succeeded += 1,
                    RowOutcome::Skipped => skipped += 1,
                    RowOutcome::Failed(message) => errors.push(RowError {
                        row: *row_no,
                        column: None,
                        message,
                    }),
                }
            }
        }

        let failed = errors.len();
        errors.sort_by_key(|e| e.row);
        Ok((succeeded, failed, skipped, errors))
    }

    async fn process_products(
        &self,
        company_id: Uuid,
        sheet: &ParsedSheet,
    ) -> Result<(usize, usize, usize, Vec<RowError>), AppError> {
        let mut errors = Vec::new();
        let mut valid: Vec<(usize, CreateProduct)> = Vec::new();
        let mut seen_skus = HashSet::new();
        let mut skipped = 0usize;

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_no = idx + 1;
            let view = RowView { sheet, row };
            match validate_product_row(company_id, &view) {
                Ok(product) => {
                    if !seen_skus.insert(product.sku.clone()) {
                        skipped += 1;
                        continue;
                    }
                    valid.push((row_no, product));
                }
                Err(e) => errors.push(RowError {
                    row: row_no,
                    column: e.0,
                    message: e.1,
                }),
            }
        }

        let mut succeeded = 0usize;
        for chunk in valid.chunks(self.batch_size.max(1)) {
            let rows: Vec<CreateProduct> = chunk.iter().map(|(_, p)| p.clone()).collect();
            let outcomes = self.db.insert_products_chunk(company_id, &rows).await?;
            for ((row_no, _), outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    RowOutcome::Inserted => succeeded += 1,
                    RowOutcome::Skipped => skipped += 1,
                    RowOutcome::Failed(message) => errors.push(RowError {
                        row: *row_no,
                        column: None,
                        message,
                    }),
                }
            }
        }

        let failed = errors.len();
        errors.sort_by_key(|e| e.row);
        Ok((succeeded, failed, skipped, errors))
    }
}

/// Parse the uploaded file based on its extension.
pub fn parse_sheet(filename: &str, bytes: &[u8]) -> Result<ParsedSheet, AppError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        parse_csv(bytes)
    } else if lower.ends_with(".xlsx") {
        parse_xlsx(bytes)
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported file type, expected .csv or .xlsx"
        )))
    }
}

fn parse_csv(bytes: &[u8]) -> Result<ParsedSheet, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect::<Vec<_>>();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::BadRequest(anyhow::anyhow!("CSV file is empty")));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid CSV row: {}", e)))?;
        let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(ParsedSheet { headers, rows })
}

fn parse_xlsx(bytes: &[u8]) -> Result<ParsedSheet, AppError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid XLSX file: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("XLSX file has no sheets")))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read XLSX sheet: {}", e)))?;

    let mut iter = range.rows();
    let headers = iter
        .next()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("XLSX sheet is empty")))?
        .iter()
        .map(|c| cell_to_string(c).trim().to_lowercase())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for data_row in iter {
        let mut row: Vec<String> = data_row.iter().map(cell_to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(ParsedSheet { headers, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            // Excel stores integers as floats; avoid trailing ".0" noise.
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

type FieldError = (Option<String>, String);

fn validate_client_row(company_id: Uuid, view: &RowView<'_>) -> Result<CreateClient, FieldError> {
    let name = view
        .get("name")
        .ok_or((Some("name".to_string()), "Name is required".to_string()))?;

    let email = view.get("email");
    if let Some(email) = &email {
        if !email.contains('@') || email.len() > 320 {
            return Err((Some("email".to_string()), "Invalid email address".to_string()));
        }
    }

    Ok(CreateClient {
        company_id,
        name,
        email,
        phone: view.get("phone"),
        billing_line1: view.get("billing_line1"),
        billing_line2: view.get("billing_line2"),
        billing_city: view.get("billing_city"),
        billing_state: view.get("billing_state"),
        billing_postal_code: view.get("billing_postal_code"),
        billing_country: view.get("billing_country"),
        tax_number: view.get("tax_number"),
        notes: view.get("notes"),
    })
}

fn validate_product_row(company_id: Uuid, view: &RowView<'_>) -> Result<CreateProduct, FieldError> {
    let name = view
        .get("name")
        .ok_or((Some("name".to_string()), "Name is required".to_string()))?;
    let sku = view
        .get("sku")
        .ok_or((Some("sku".to_string()), "SKU is required".to_string()))?;

    let unit_price: Decimal = view
        .get("unit_price")
        .ok_or((
            Some("unit_price".to_string()),
            "Unit price is required".to_string(),
        ))?
        .parse()
        .map_err(|_| {
            (
                Some("unit_price".to_string()),
                "Unit price must be a number".to_string(),
            )
        })?;
    if unit_price < Decimal::ZERO {
        return Err((
            Some("unit_price".to_string()),
            "Unit price must not be negative".to_string(),
        ));
    }

    let tax_rate: Decimal = match view.get("tax_rate") {
        Some(raw) => raw.parse().map_err(|_| {
            (
                Some("tax_rate".to_string()),
                "Tax rate must be a number".to_string(),
            )
        })?,
        None => Decimal::ZERO,
    };
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err((
            Some("tax_rate".to_string()),
            "Tax rate must be between 0 and 100".to_string(),
        ));
    }

    let currency = view.get("currency").unwrap_or_else(|| "EUR".to_string());
    if currency.len() != 3 {
        return Err((
            Some("currency".to_string()),
            "Currency must be a 3-letter code".to_string(),
        ));
    }

    Ok(CreateProduct {
        company_id,
        name,
        sku,
        description: view.get("description"),
        unit_price,
        currency: currency.to_uppercase(),
        tax_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_of<'a>(sheet: &'a ParsedSheet, idx: usize) -> RowView<'a> {
        RowView {
            sheet,
            row: &sheet.rows[idx],
        }
    }

    #[test]
    fn parses_csv_with_headers() {
        let csv = b"name,email,phone\nAcme Ltd,billing@acme.test,555-0100\nBeta GmbH,,\n";
        let sheet = parse_csv(csv).unwrap();
        assert_eq!(sheet.headers, vec!["name", "email", "phone"]);
        assert_eq!(sheet.rows.len(), 2);

        let first = view_of(&sheet, 0);
        assert_eq!(first.get("name").as_deref(), Some("Acme Ltd"));
        assert_eq!(first.get("email").as_deref(), Some("billing@acme.test"));

        let second = view_of(&sheet, 1);
        assert_eq!(second.get("email"), None);
    }

    #[test]
    fn csv_headers_are_case_insensitive() {
        let csv = b"Name,EMAIL\nAcme,a@b.test\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        assert_eq!(row.get("name").as_deref(), Some("Acme"));
        assert_eq!(row.get("email").as_deref(), Some("a@b.test"));
    }

    #[test]
    fn short_csv_rows_are_padded() {
        let csv = b"name,email,phone\nAcme\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        assert_eq!(row.get("name").as_deref(), Some("Acme"));
        assert_eq!(row.get("phone"), None);
    }

    #[test]
    fn rejects_unknown_extensions() {
        let result = parse_sheet("data.pdf", b"whatever");
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn rejects_empty_csv() {
        let result = parse_sheet("clients.csv", b"");
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn header_only_csv_parses_to_zero_rows() {
        let sheet = parse_csv(b"name,email\n").unwrap();
        assert_eq!(sheet.headers, vec!["name", "email"]);
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn parses_xlsx_workbook() {
        let bytes = include_bytes!("../../tests/data/products.xlsx");
        let sheet = parse_sheet("products.xlsx", bytes).unwrap();
        assert_eq!(
            sheet.headers,
            vec!["name", "sku", "unit_price", "tax_rate", "currency", "description"]
        );
        assert_eq!(sheet.rows.len(), 2);

        let row = view_of(&sheet, 0);
        let product = validate_product_row(Uuid::new_v4(), &row).unwrap();
        assert_eq!(product.name, "Desk Lamp");
        assert_eq!(product.sku, "LAMP-1");
        assert_eq!(product.unit_price.to_string(), "49.9");
        assert_eq!(product.tax_rate.to_string(), "19");
    }

    #[test]
    fn rejects_malformed_xlsx() {
        let result = parse_sheet("products.xlsx", b"not a zip archive");
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn client_row_requires_name() {
        let csv = b"name,email\n,missing@name.test\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        let err = validate_client_row(Uuid::new_v4(), &row).unwrap_err();
        assert_eq!(err.0.as_deref(), Some("name"));
    }

    #[test]
    fn client_row_rejects_bad_email() {
        let csv = b"name,email\nAcme,not-an-email\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        let err = validate_client_row(Uuid::new_v4(), &row).unwrap_err();
        assert_eq!(err.0.as_deref(), Some("email"));
    }

    #[test]
    fn product_row_parses_amounts() {
        let csv = b"name,sku,unit_price,tax_rate,currency\nWidget,W-1,19.99,20,eur\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        let product = validate_product_row(Uuid::new_v4(), &row).unwrap();
        assert_eq!(product.unit_price.to_string(), "19.99");
        assert_eq!(product.tax_rate.to_string(), "20");
        assert_eq!(product.currency, "EUR");
    }

    #[test]
    fn product_row_rejects_negative_price() {
        let csv = b"name,sku,unit_price\nWidget,W-1,-5\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        let err = validate_product_row(Uuid::new_v4(), &row).unwrap_err();
        assert_eq!(err.0.as_deref(), Some("unit_price"));
    }

    #[test]
    fn product_row_defaults_tax_and_currency() {
        let csv = b"name,sku,unit_price\nWidget,W-1,10\n";
        let sheet = parse_csv(csv).unwrap();
        let row = view_of(&sheet, 0);
        let product = validate_product_row(Uuid::new_v4(), &row).unwrap();
        assert_eq!(product.tax_rate, Decimal::ZERO);
        assert_eq!(product.currency, "EUR");
    }
}
