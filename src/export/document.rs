use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};

use super::ExportError;
use crate::filter::Totals;
use crate::models::{Invoice, format_amount, parse_amount};

/// Longest description printed before it is cut with an ellipsis.
pub const DESCRIPTION_BUDGET: usize = 40;
const CLIENT_BUDGET: usize = 28;
const SALES_PERSON_BUDGET: usize = 16;

pub const FIRST_PAGE_ROWS: usize = 22;
pub const PAGE_ROWS: usize = 28;

// A4 landscape
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 10.0;
const ROW_HEIGHT: f32 = 6.0;

pub const COLUMNS: [(&str, f32); 8] = [
    ("Invoice No.", 10.0),
    ("Date", 36.0),
    ("Client", 60.0),
    ("Description", 112.0),
    ("Sub-Total", 188.0),
    ("VAT", 212.0),
    ("Total", 234.0),
    ("Sales Person", 258.0),
];

pub type BodyRow = [String; 8];

/// Everything printed in the report, split into pages.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub title: String,
    pub summary: Vec<String>,
    pub pages: Vec<Vec<BodyRow>>,
}

impl DocumentLayout {
    pub fn build(invoices: &[&Invoice], generated_on: NaiveDate) -> Self {
        let totals = Totals::from_invoices(invoices);
        let summary = vec![
            format!("Generated: {}", generated_on.format("%Y-%m-%d")),
            format!("Total invoices: {}", totals.count),
            format!("Total amount: AED {}", totals.total_display()),
        ];

        let rows: Vec<BodyRow> = invoices.iter().map(|invoice| body_row(invoice)).collect();

        let mut pages = Vec::new();
        let mut remaining = rows.as_slice();
        let mut capacity = FIRST_PAGE_ROWS;
        loop {
            let take = remaining.len().min(capacity);
            pages.push(remaining[..take].to_vec());
            remaining = &remaining[take..];
            capacity = PAGE_ROWS;
            if remaining.is_empty() {
                break;
            }
        }

        Self {
            title: "Invoice Report".to_string(),
            summary,
            pages,
        }
    }

    pub fn body_rows(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

fn body_row(invoice: &Invoice) -> BodyRow {
    [
        invoice.invoice_no.clone(),
        invoice.date().to_string(),
        truncate(&invoice.client, CLIENT_BUDGET),
        truncate(&invoice.description, DESCRIPTION_BUDGET),
        format_amount(parse_amount(&invoice.subtotal)),
        format_amount(parse_amount(&invoice.vat_amount)),
        format_amount(parse_amount(&invoice.total_amount)),
        truncate(&invoice.sales_person, SALES_PERSON_BUDGET),
    ]
}

/// Cut `text` to at most `budget` characters, marking the cut with "...".
pub fn truncate(text: &str, budget: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let kept: String = text.chars().take(budget.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

fn rule(layer: &PdfLayerReference, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(MARGIN), Mm(y)), false),
            (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn table_header(layer: &PdfLayerReference, bold: &IndirectFontRef, y: f32) {
    for (title, x) in COLUMNS {
        layer.use_text(title, 9.0, Mm(x), Mm(y), bold);
    }
    rule(layer, y - 2.0);
}

fn pdf_error(err: impl std::fmt::Display) -> ExportError {
    ExportError::Pdf(err.to_string())
}

pub fn render_document(layout: &DocumentLayout) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(layout.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    let page_count = layout.pages.len();
    for (index, rows) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Page {}", index + 1));
            doc.get_page(page).get_layer(layer)
        };

        let mut y = PAGE_HEIGHT - 15.0;
        if index == 0 {
            layer.use_text(layout.title.as_str(), 18.0, Mm(MARGIN), Mm(y), &bold);
            y -= 8.0;
            for line in &layout.summary {
                layer.use_text(line.as_str(), 10.0, Mm(MARGIN), Mm(y), &font);
                y -= 5.5;
            }
            y -= 4.0;
        }

        table_header(&layer, &bold, y);
        y -= ROW_HEIGHT + 1.0;

        for row in rows {
            for ((_, x), value) in COLUMNS.iter().zip(row.iter()) {
                layer.use_text(value.as_str(), 8.5, Mm(*x), Mm(y), &font);
            }
            y -= ROW_HEIGHT;
        }

        layer.use_text(
            format!("Page {} of {}", index + 1, page_count),
            8.0,
            Mm(PAGE_WIDTH - 35.0),
            Mm(MARGIN - 2.0),
            &font,
        );
    }

    doc.save_to_bytes().map_err(pdf_error)
}
