//! Spreadsheet and PDF exports of the filtered invoice list.

pub mod document;
pub mod spreadsheet;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::models::Invoice;

pub use document::DocumentLayout;
pub use spreadsheet::spreadsheet_rows;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("could not write export: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// `invoices_YYYY-MM-DD.<ext>`
    pub fn file_name(self, on: NaiveDate) -> String {
        format!("invoices_{}.{}", on.format("%Y-%m-%d"), self.extension())
    }
}

/// Write the given invoices into `dir` and return the path of the new file.
pub fn export(
    format: ExportFormat,
    invoices: &[&Invoice],
    dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format.file_name(today));

    let bytes = match format {
        ExportFormat::Xlsx => spreadsheet::spreadsheet_bytes(invoices)?,
        ExportFormat::Pdf => document::render_document(&DocumentLayout::build(invoices, today))?,
    };
    fs::write(&path, bytes)?;

    info!(path = %path.display(), count = invoices.len(), "export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoices() -> Vec<Invoice> {
        (1..=3)
            .map(|n| Invoice {
                client: "Acme Trading".to_string(),
                invoice_no: format!("24-000{}", n),
                invoice_date: "2024-02-01".to_string(),
                description: "Stickers".to_string(),
                total_amount: "10".to_string(),
                ..Invoice::default()
            })
            .collect()
    }

    #[test]
    fn file_names_carry_the_export_date() {
        let day = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        assert_eq!(ExportFormat::Xlsx.file_name(day), "invoices_2024-09-03.xlsx");
        assert_eq!(ExportFormat::Pdf.file_name(day), "invoices_2024-09-03.pdf");
    }

    #[test]
    fn writes_both_formats_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        let invoices = invoices();
        let refs: Vec<&Invoice> = invoices.iter().collect();

        let xlsx = export(ExportFormat::Xlsx, &refs, dir.path(), day).unwrap();
        let pdf = export(ExportFormat::Pdf, &refs, dir.path(), day).unwrap();

        assert!(fs::read(&xlsx).unwrap().starts_with(b"PK"));
        assert!(fs::read(&pdf).unwrap().starts_with(b"%PDF"));
        assert_eq!(pdf.file_name().unwrap(), "invoices_2024-09-03.pdf");
    }
}
