pub mod app;
pub mod components;
pub mod invoice_form;
pub mod invoices;

pub use app::{AppState, run_app};
