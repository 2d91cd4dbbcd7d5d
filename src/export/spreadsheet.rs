use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::models::{Invoice, parse_amount};

pub const HEADERS: [&str; 12] = [
    "Invoice No.",
    "Invoice Date",
    "Client",
    "Client TRN",
    "Description",
    "Sub-Total",
    "Rebate",
    "Sub-Total After Rebate",
    "VAT Amount",
    "Total Amount",
    "Sales Person",
    "Year",
];

const COLUMN_WIDTHS: [f64; 12] = [14.0, 13.0, 30.0, 18.0, 48.0, 14.0, 12.0, 22.0, 13.0, 15.0, 18.0, 8.0];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Amount(f64),
}

/// One row per invoice, in `HEADERS` order.
pub fn spreadsheet_rows(invoices: &[&Invoice]) -> Vec<Vec<Cell>> {
    invoices
        .iter()
        .map(|invoice| {
            vec![
                Cell::Text(invoice.invoice_no.clone()),
                Cell::Text(invoice.date().to_string()),
                Cell::Text(invoice.client.clone()),
                Cell::Text(invoice.client_trn.clone()),
                Cell::Text(invoice.description.clone()),
                Cell::Amount(parse_amount(&invoice.subtotal)),
                Cell::Amount(parse_amount(&invoice.rebate)),
                Cell::Amount(parse_amount(&invoice.subtotal_after_rebate)),
                Cell::Amount(parse_amount(&invoice.vat_amount)),
                Cell::Amount(parse_amount(&invoice.total_amount)),
                Cell::Text(invoice.sales_person.clone()),
                Cell::Text(invoice.year.clone()),
            ]
        })
        .collect()
}

pub fn build_workbook(invoices: &[&Invoice]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let money_format = Format::new().set_num_format("#,##0.00");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Invoices")?;

    for (col, (title, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header_format)?;
        worksheet.set_column_width(col, width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (index, cells) in spreadsheet_rows(invoices).into_iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in cells.into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => worksheet.write_string(row, col, text)?,
                Cell::Amount(amount) => worksheet.write_number_with_format(row, col, amount, &money_format)?,
            };
        }
    }

    Ok(workbook)
}

pub fn spreadsheet_bytes(invoices: &[&Invoice]) -> Result<Vec<u8>, XlsxError> {
    build_workbook(invoices)?.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(no: &str, total: &str) -> Invoice {
        Invoice {
            client: "Blue Dune".to_string(),
            invoice_no: no.to_string(),
            invoice_date: "2024-04-02 00:00:00".to_string(),
            total_amount: total.to_string(),
            vat_amount: "n/a".to_string(),
            ..Invoice::default()
        }
    }

    #[test]
    fn one_data_row_per_invoice() {
        let invoices: Vec<Invoice> = (0..7).map(|n| invoice(&format!("24-01{:02}", n), "5")).collect();
        let refs: Vec<&Invoice> = invoices.iter().collect();

        let rows = spreadsheet_rows(&refs);
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|row| row.len() == HEADERS.len()));
    }

    #[test]
    fn amounts_are_numeric_and_dates_trimmed() {
        let inv = invoice("24-0200", "1,050.25");
        let rows = spreadsheet_rows(&[&inv]);

        assert_eq!(rows[0][1], Cell::Text("2024-04-02".to_string()));
        assert_eq!(rows[0][8], Cell::Amount(0.0));
        assert_eq!(rows[0][9], Cell::Amount(1050.25));
    }

    #[test]
    fn empty_selection_still_produces_a_workbook() {
        assert!(spreadsheet_rows(&[]).is_empty());
        let bytes = spreadsheet_bytes(&[]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
