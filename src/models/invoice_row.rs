use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use super::invoice::{Invoice, date_part, format_amount, parse_amount};

/// An `invoices` table row. Column names follow the storage schema.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub client: String,
    pub invoice_no: String,
    pub invoice_date: DateTime<Utc>,
    pub client_trn: Option<String>,
    pub description: String,
    pub invoice_subtotal: f64,
    pub rebate: f64,
    pub invoice_subtotal_after_rebate: f64,
    pub vat_amount: f64,
    pub total_invoice_amount: f64,
    pub sales_person: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid invoice date `{0}`, expected YYYY-MM-DD")]
pub struct InvalidDate(pub String);

impl InvoiceRow {
    /// Translate a display record into storage naming and types.
    pub fn from_invoice(id: Uuid, invoice: &Invoice) -> Result<Self, InvalidDate> {
        let date = NaiveDate::parse_from_str(date_part(&invoice.invoice_date), "%Y-%m-%d")
            .map_err(|_| InvalidDate(invoice.invoice_date.clone()))?;

        Ok(Self {
            id,
            client: invoice.client.trim().to_string(),
            invoice_no: invoice.invoice_no.trim().to_string(),
            invoice_date: midnight_utc(date),
            client_trn: Some(invoice.client_trn.trim().to_string()).filter(|trn| !trn.is_empty()),
            description: invoice.description.clone(),
            invoice_subtotal: parse_amount(&invoice.subtotal),
            rebate: parse_amount(&invoice.rebate),
            invoice_subtotal_after_rebate: parse_amount(&invoice.subtotal_after_rebate),
            vat_amount: parse_amount(&invoice.vat_amount),
            total_invoice_amount: parse_amount(&invoice.total_amount),
            sales_person: Some(invoice.sales_person.trim().to_string()),
            year: Some(invoice.year.trim().to_string()),
        })
    }
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: Some(row.id),
            client: row.client,
            invoice_no: row.invoice_no,
            invoice_date: row.invoice_date.format("%Y-%m-%d").to_string(),
            client_trn: row.client_trn.unwrap_or_default(),
            description: row.description,
            subtotal: format_amount(row.invoice_subtotal),
            rebate: format_amount(row.rebate),
            subtotal_after_rebate: format_amount(row.invoice_subtotal_after_rebate),
            vat_amount: format_amount(row.vat_amount),
            total_amount: format_amount(row.total_invoice_amount),
            sales_person: row.sales_person.unwrap_or_default(),
            year: row.year.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Invoice {
        Invoice {
            id: None,
            client: " Gulf Print LLC ".to_string(),
            invoice_no: "24-0102".to_string(),
            invoice_date: "2024-05-20 00:00:00".to_string(),
            client_trn: "  ".to_string(),
            description: "Brochures".to_string(),
            subtotal: "2,000".to_string(),
            rebate: "".to_string(),
            subtotal_after_rebate: "2000".to_string(),
            vat_amount: "100".to_string(),
            total_amount: "2100".to_string(),
            sales_person: "Omar".to_string(),
            year: "2024".to_string(),
        }
    }

    #[test]
    fn translates_display_fields_to_storage_columns() {
        let id = Uuid::new_v4();
        let row = InvoiceRow::from_invoice(id, &sample()).unwrap();

        assert_eq!(row.id, id);
        assert_eq!(row.client, "Gulf Print LLC");
        assert_eq!(row.client_trn, None);
        assert_eq!(row.invoice_subtotal, 2000.0);
        assert_eq!(row.rebate, 0.0);
        assert_eq!(row.total_invoice_amount, 2100.0);
        assert_eq!(row.invoice_date.format("%Y-%m-%d").to_string(), "2024-05-20");
    }

    #[test]
    fn rejects_unparseable_date() {
        let mut invoice = sample();
        invoice.invoice_date = "20/05/2024".to_string();
        assert!(InvoiceRow::from_invoice(Uuid::new_v4(), &invoice).is_err());
    }

    #[test]
    fn storage_row_formats_back_to_display_strings() {
        let id = Uuid::new_v4();
        let invoice: Invoice = InvoiceRow::from_invoice(id, &sample()).unwrap().into();

        assert_eq!(invoice.id, Some(id));
        assert_eq!(invoice.invoice_date, "2024-05-20");
        assert_eq!(invoice.subtotal, "2000.00");
        assert_eq!(invoice.rebate, "0.00");
        assert_eq!(invoice.client_trn, "");
    }
}
