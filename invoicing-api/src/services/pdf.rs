//! Invoice PDF rendering.
//!
//! Produces a single A4 page: company header, client billing block, line
//! item table, and totals. The layout is fixed.

use crate::models::{Client, Company, Invoice, InvoiceItem};
use platform_core::error::AppError;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;

pub fn render_invoice_pdf(
    company: &Company,
    client: &Client,
    invoice: &Invoice,
    items: &[InvoiceItem],
) -> Result<Vec<u8>, AppError> {
    let title = invoice
        .invoice_number
        .clone()
        .unwrap_or_else(|| "Draft invoice".to_string());

    let (doc, page, layer) = PdfDocument::new(
        &title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "content",
    );

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF font error: {}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF font error: {}", e)))?;

    let mut writer = PageWriter {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    // Header
    writer.text(&bold, 18.0, MARGIN_MM, &company.name);
    writer.advance(2.0);
    writer.text(&bold, 14.0, MARGIN_MM, &format!("Invoice {}", title));
    if let Some(date) = invoice.issue_date {
        writer.text(&font, 10.0, MARGIN_MM, &format!("Issued: {}", date));
    }
    if let Some(due) = invoice.due_date {
        writer.text(&font, 10.0, MARGIN_MM, &format!("Due: {}", due));
    }
    writer.advance(1.5);

    // Billing block
    writer.text(&bold, 10.0, MARGIN_MM, "Bill to:");
    writer.text(&font, 10.0, MARGIN_MM, &client.name);
    for line in [&client.billing_line1, &client.billing_line2].into_iter().flatten() {
        writer.text(&font, 10.0, MARGIN_MM, line);
    }
    let city_line = [
        client.billing_postal_code.as_deref(),
        client.billing_city.as_deref(),
        client.billing_country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");
    if !city_line.is_empty() {
        writer.text(&font, 10.0, MARGIN_MM, &city_line);
    }
    if let Some(tax_number) = &client.tax_number {
        writer.text(&font, 10.0, MARGIN_MM, &format!("Tax no: {}", tax_number));
    }
    writer.advance(2.0);

    // Line items
    writer.column(&bold, 10.0, MARGIN_MM, "Description");
    writer.column(&bold, 10.0, 110.0, "Qty");
    writer.column(&bold, 10.0, 130.0, "Unit");
    writer.column(&bold, 10.0, 155.0, "Tax %");
    writer.column(&bold, 10.0, 175.0, "Amount");
    writer.next_line();

    for item in items {
        writer.column(&font, 10.0, MARGIN_MM, &item.description);
        writer.column(&font, 10.0, 110.0, &item.quantity.to_string());
        writer.column(&font, 10.0, 130.0, &item.unit_price.to_string());
        writer.column(&font, 10.0, 155.0, &item.tax_rate.to_string());
        writer.column(&font, 10.0, 175.0, &item.line_total.to_string());
        writer.next_line();
    }

    writer.advance(1.5);

    // Totals
    writer.column(&font, 10.0, 130.0, "Subtotal");
    writer.column(&font, 10.0, 175.0, &invoice.subtotal.to_string());
    writer.next_line();
    writer.column(&font, 10.0, 130.0, "Tax");
    writer.column(&font, 10.0, 175.0, &invoice.tax_total.to_string());
    writer.next_line();
    writer.column(&bold, 12.0, 130.0, &format!("Total ({})", invoice.currency));
    writer.column(&bold, 12.0, 175.0, &invoice.total.to_string());
    writer.next_line();

    if let Some(notes) = &invoice.notes {
        writer.advance(2.0);
        writer.text(&font, 9.0, MARGIN_MM, notes);
    }

    doc.save_to_bytes()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF render failed: {}", e)))
}

/// Cursor that walks down the page one line at a time.
struct PageWriter {
    layer: PdfLayerReference,
    y: f32,
}

impl PageWriter {
    /// Write text at the left position and move to the next line.
    fn text(&mut self, font: &IndirectFontRef, size: f32, x: f32, text: &str) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.next_line();
    }

    /// Write text at a column position without advancing.
    fn column(&self, font: &IndirectFontRef, size: f32, x: f32, text: &str) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn next_line(&mut self) {
        self.y -= LINE_HEIGHT_MM;
    }

    fn advance(&mut self, lines: f32) {
        self.y -= LINE_HEIGHT_MM * lines;
    }
}
