mod invoice;
mod invoice_row;

pub use invoice::{Invoice, date_part, format_amount, next_invoice_no, parse_amount};
pub use invoice_row::{InvalidDate, InvoiceRow, midnight_utc};
