//! One-shot maintenance: import a legacy JSON dump, wipe the table.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::db::{InvoiceStore, StoreError};
use crate::models::Invoice;

pub const BATCH_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("could not read dump: {0}")]
    Io(#[from] std::io::Error),
    #[error("dump is not a JSON array of invoices: {0}")]
    Json(#[from] serde_json::Error),
    #[error("insert failed after {inserted} invoices: {source}")]
    Store { inserted: usize, source: StoreError },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingFields(Vec<&'static str>),
    DuplicateInvoiceNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub index: usize,
    pub invoice_no: String,
    pub reason: SkipReason,
}

/// Records ready for insertion plus what was dropped or patched on the way.
#[derive(Debug, Default)]
pub struct Prepared {
    pub invoices: Vec<Invoice>,
    pub skipped: Vec<Skipped>,
    pub defaulted_dates: usize,
}

#[derive(Debug, Default, PartialEq)]
pub struct MigrationReport {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub defaulted_dates: usize,
}

pub fn read_dump(path: &Path) -> Result<Vec<Invoice>, MigrationError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Date formats seen in exported sheets, most common first.
pub fn parse_source_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    // Last resort: the leading "Y-M-D" token with loose digits, e.g. "2024-3-7 9:00".
    let mut parts = value.split_whitespace().next()?.split('-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn missing_fields(invoice: &Invoice) -> Vec<&'static str> {
    [
        ("client", &invoice.client),
        ("invoice number", &invoice.invoice_no),
        ("description", &invoice.description),
        ("date", &invoice.invoice_date),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect()
}

/// Drop incomplete or repeated records and normalise dates.
///
/// An unparseable date is replaced with `now` instead of failing the batch.
pub fn prepare(records: Vec<Invoice>, now: DateTime<Utc>) -> Prepared {
    let mut prepared = Prepared::default();
    let mut seen = HashSet::new();

    for (index, mut invoice) in records.into_iter().enumerate() {
        let missing = missing_fields(&invoice);
        if !missing.is_empty() {
            warn!(index, invoice_no = %invoice.invoice_no, ?missing, "skipping incomplete record");
            prepared.skipped.push(Skipped {
                index,
                invoice_no: invoice.invoice_no,
                reason: SkipReason::MissingFields(missing),
            });
            continue;
        }

        if !seen.insert(invoice.invoice_no.trim().to_string()) {
            warn!(index, invoice_no = %invoice.invoice_no, "skipping repeated invoice number");
            prepared.skipped.push(Skipped {
                index,
                invoice_no: invoice.invoice_no,
                reason: SkipReason::DuplicateInvoiceNumber,
            });
            continue;
        }

        let date = match parse_source_date(&invoice.invoice_date) {
            Some(date) => date,
            None => {
                warn!(
                    invoice_no = %invoice.invoice_no,
                    date = %invoice.invoice_date,
                    "invalid invoice date, using current date"
                );
                prepared.defaulted_dates += 1;
                now.date_naive()
            }
        };
        invoice.invoice_date = date.format("%Y-%m-%d").to_string();
        prepared.invoices.push(invoice);
    }

    prepared
}

/// Insert a dump in batches of [`BATCH_SIZE`]. A failing batch stops the run;
/// earlier batches stay committed.
pub async fn migrate(
    store: &dyn InvoiceStore,
    records: Vec<Invoice>,
    now: DateTime<Utc>,
) -> Result<MigrationReport, MigrationError> {
    let total = records.len();
    let prepared = prepare(records, now);
    info!(total, ready = prepared.invoices.len(), "migrating invoices");

    let mut inserted = 0;
    for batch in prepared.invoices.chunks(BATCH_SIZE) {
        let count = store
            .insert_batch(batch)
            .await
            .map_err(|source| MigrationError::Store { inserted, source })?;
        inserted += count;
        info!("migrated {}/{} invoices", inserted, prepared.invoices.len());
    }

    Ok(MigrationReport {
        total,
        inserted,
        skipped: prepared.skipped.len(),
        defaulted_dates: prepared.defaulted_dates,
    })
}

/// Delete every invoice.
pub async fn reset(store: &dyn InvoiceStore) -> Result<u64, StoreError> {
    let deleted = store.delete_all().await?;
    info!(deleted, "all invoices deleted");
    Ok(deleted)
}
