use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InvoiceStore, StoreError, to_row};
use crate::models::{Invoice, InvoiceRow};

/// Process-local store with the same constraints as the `invoices` table.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<InvoiceRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn number_taken(rows: &[InvoiceRow], invoice_no: &str, except: Option<Uuid>) -> bool {
    rows.iter()
        .any(|row| row.invoice_no == invoice_no && Some(row.id) != except)
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn fetch_all(&self) -> Result<Vec<Invoice>, StoreError> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by(|a, b| b.invoice_date.cmp(&a.invoice_date));
        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    async fn insert(&self, invoice: &Invoice) -> Result<Uuid, StoreError> {
        let row = to_row(Uuid::new_v4(), invoice)?;
        let mut rows = self.rows.write().await;

        if number_taken(&rows, &row.invoice_no, None) {
            return Err(StoreError::DuplicateInvoiceNumber(row.invoice_no));
        }

        let id = row.id;
        rows.push(row);
        Ok(id)
    }

    async fn update(&self, id: Uuid, invoice: &Invoice) -> Result<(), StoreError> {
        let row = to_row(id, invoice)?;
        let mut rows = self.rows.write().await;

        if number_taken(&rows, &row.invoice_no, Some(id)) {
            return Err(StoreError::DuplicateInvoiceNumber(row.invoice_no));
        }

        let slot = rows
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        *slot = row;
        Ok(())
    }

    async fn update_by_invoice_no(&self, invoice_no: &str, invoice: &Invoice) -> Result<Uuid, StoreError> {
        let invoice_no = invoice_no.trim();
        let id = self
            .rows
            .read()
            .await
            .iter()
            .find(|row| row.invoice_no == invoice_no)
            .map(|row| row.id)
            .ok_or_else(|| StoreError::NotFound(invoice_no.to_string()))?;

        self.update(id, invoice).await?;
        Ok(id)
    }

    async fn insert_batch(&self, invoices: &[Invoice]) -> Result<usize, StoreError> {
        let batch = invoices
            .iter()
            .map(|invoice| to_row(Uuid::new_v4(), invoice))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = self.rows.write().await;
        for (i, row) in batch.iter().enumerate() {
            let repeated_in_batch = batch[..i].iter().any(|earlier| earlier.invoice_no == row.invoice_no);
            if repeated_in_batch || number_taken(&rows, &row.invoice_no, None) {
                return Err(StoreError::DuplicateInvoiceNumber(row.invoice_no.clone()));
            }
        }

        let count = batch.len();
        rows.extend(batch);
        Ok(count)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let count = rows.len() as u64;
        rows.clear();
        Ok(count)
    }
}
