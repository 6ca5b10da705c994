//! PDF invoices.
//!
//! Rendered on every request from the stored order; nothing is cached or
//! persisted. The only input that is not part of the order is the
//! "generated on" date, which is the render time.

use chrono::{DateTime, Datelike, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use thiserror::Error;

use urbanstride_core::{Order, OrderLine, format_usd};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 8.0;

/// Descriptions longer than this are cut and suffixed with `...`.
const DESCRIPTION_LIMIT: usize = 30;

/// X positions of the table columns.
const COLUMNS: [f32; 5] = [20.0, 70.0, 130.0, 155.0, 175.0];
const HEADINGS: [&str; 5] = ["Item", "Description", "Price ($)", "Quantity", "Line Total ($)"];

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("PDF error: {0}")]
    Pdf(#[from] printpdf::Error),
}

/// Render an order as a PDF document.
///
/// # Errors
///
/// Returns `InvoiceError::Pdf` if the document cannot be assembled.
pub fn render_invoice(order: &Order, generated_on: DateTime<Utc>) -> Result<Vec<u8>, InvoiceError> {
    let title = format!("Invoice {}", order.id);
    let (doc, page, layer) =
        PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut canvas = Canvas {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT - MARGIN,
    };

    canvas.text("UrbanStride", 24.0, MARGIN, &bold);
    canvas.advance(12.0);
    canvas.text("Order Invoice", 16.0, MARGIN, &bold);
    canvas.advance(12.0);

    let subtotal = format_usd(order.subtotal());
    for line in [
        format!("Order ID: {}", order.id),
        format!("Order Date: {}", generated_on.format("%Y-%m-%d")),
        format!("Subtotal: {subtotal}"),
        format!("Contact: {}", order.purchaser.name),
    ] {
        canvas.text(&line, 11.0, MARGIN, &regular);
        canvas.advance(ROW_HEIGHT);
    }
    canvas.advance(ROW_HEIGHT);

    canvas.row(&HEADINGS.map(str::to_string), &bold);
    canvas.advance(2.0);
    canvas.rule(&regular);

    for cells in invoice_rows(order) {
        if canvas.y < MARGIN + 2.0 * ROW_HEIGHT {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");
            canvas = Canvas {
                layer: doc.get_page(page).get_layer(layer),
                y: PAGE_HEIGHT - MARGIN,
            };
        }
        canvas.row(&cells, &regular);
    }

    canvas.rule(&regular);
    canvas.row(
        &[
            "Subtotal".to_string(),
            String::new(),
            String::new(),
            String::new(),
            subtotal.trim_start_matches('$').to_string(),
        ],
        &bold,
    );

    canvas.layer.use_text(
        format!(
            "\u{a9} {} UrbanStride. All rights reserved.",
            generated_on.year()
        ),
        9.0,
        Mm(MARGIN),
        Mm(MARGIN / 2.0),
        &regular,
    );

    Ok(doc.save_to_bytes()?)
}

/// Table cells for each order line.
fn invoice_rows(order: &Order) -> Vec<[String; 5]> {
    order.lines.iter().map(row_cells).collect()
}

fn row_cells(line: &OrderLine) -> [String; 5] {
    [
        line.product.title.clone(),
        truncate_description(&line.product.description),
        line.product.price.amount().to_string(),
        line.quantity.to_string(),
        format_usd(line.line_total()).trim_start_matches('$').to_string(),
    ]
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_LIMIT {
        let cut: String = description.chars().take(DESCRIPTION_LIMIT).collect();
        format!("{cut}...")
    } else {
        description.to_string()
    }
}

/// Current layer plus a cursor moving down the page.
struct Canvas {
    layer: PdfLayerReference,
    y: f32,
}

impl Canvas {
    fn text(&self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
    }

    fn row(&mut self, cells: &[String; 5], font: &IndirectFontRef) {
        for (cell, x) in cells.iter().zip(COLUMNS) {
            self.text(cell, 10.0, x, font);
        }
        self.advance(ROW_HEIGHT);
    }

    fn rule(&mut self, font: &IndirectFontRef) {
        self.text(&"_".repeat(95), 10.0, MARGIN, font);
        self.advance(ROW_HEIGHT);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use urbanstride_core::{OrderId, Price, ProductId, ProductSnapshot, Purchaser, UserId};

    fn order(lines: usize) -> Order {
        Order {
            id: OrderId::new(42),
            purchaser: Purchaser {
                id: UserId::new(7),
                name: "Ada Lovelace".to_string(),
            },
            lines: (0..lines)
                .map(|i| OrderLine {
                    quantity: 2,
                    product: ProductSnapshot {
                        id: ProductId::new(i32::try_from(i).unwrap() + 1),
                        title: format!("Trail Runner {i}"),
                        price: Price::parse("10").unwrap(),
                        description: "Lightweight trail shoe with a grippy outsole".to_string(),
                        image_url: "/product_images/a.png".to_string(),
                    },
                })
                .collect(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_truncate_description() {
        assert_eq!(truncate_description("short"), "short");
        let exact = "a".repeat(DESCRIPTION_LIMIT);
        assert_eq!(truncate_description(&exact), exact);
        let long = "Lightweight trail shoe with a grippy outsole";
        assert_eq!(truncate_description(long), "Lightweight trail shoe with a ...");
    }

    #[test]
    fn test_row_cells() {
        let order = order(1);
        let rows = invoice_rows(&order);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "Trail Runner 0");
        assert_eq!(rows[0][2], "10.00");
        assert_eq!(rows[0][3], "2");
        assert_eq!(rows[0][4], "20.00");
    }

    #[test]
    fn test_render_invoice_produces_pdf() {
        let generated_on = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let bytes = render_invoice(&order(3), generated_on).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_invoice_spans_pages() {
        let generated_on = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let bytes = render_invoice(&order(60), generated_on).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
