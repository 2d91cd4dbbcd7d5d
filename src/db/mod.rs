mod memory;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{InvalidDate, Invoice, InvoiceRow};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invoice number `{0}` already exists")]
    DuplicateInvoiceNumber(String),
    #[error("invoice `{0}` not found")]
    NotFound(String),
    #[error("invoice number is required")]
    MissingInvoiceNumber,
    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Remote invoice table.
///
/// Callers work with display records; implementations translate to and from
/// [`InvoiceRow`] at this boundary.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Every invoice, newest date first.
    async fn fetch_all(&self) -> Result<Vec<Invoice>, StoreError>;

    /// Insert one invoice and return its new id.
    async fn insert(&self, invoice: &Invoice) -> Result<Uuid, StoreError>;

    /// Overwrite every field of the invoice with the given id.
    async fn update(&self, id: Uuid, invoice: &Invoice) -> Result<(), StoreError>;

    /// Overwrite the single invoice carrying `invoice_no`. Returns its id.
    async fn update_by_invoice_no(&self, invoice_no: &str, invoice: &Invoice) -> Result<Uuid, StoreError>;

    /// Insert all invoices or none of them.
    async fn insert_batch(&self, invoices: &[Invoice]) -> Result<usize, StoreError>;

    /// Remove every invoice. Returns the number of rows deleted.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

pub(crate) fn to_row(id: Uuid, invoice: &Invoice) -> Result<InvoiceRow, StoreError> {
    if invoice.invoice_no.trim().is_empty() {
        return Err(StoreError::MissingInvoiceNumber);
    }
    Ok(InvoiceRow::from_invoice(id, invoice)?)
}

/// Postgres-backed store
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!().run(&pool).await?;
        info!("database ready");

        Ok(Self { pool })
    }

    async fn id_for_invoice_no(&self, invoice_no: &str) -> Result<Uuid, StoreError> {
        let invoice_no = invoice_no.trim();
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM invoices WHERE invoice_no = $1")
            .bind(invoice_no)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(invoice_no.to_string()))
    }
}

const INSERT_INVOICE: &str = r#"
    INSERT INTO invoices (
        id, client, invoice_no, invoice_date, client_trn, description,
        invoice_subtotal, rebate, invoice_subtotal_after_rebate, vat_amount,
        total_invoice_amount, sales_person, year
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
"#;

const UPDATE_INVOICE: &str = r#"
    UPDATE invoices
    SET client = $2, invoice_no = $3, invoice_date = $4, client_trn = $5,
        description = $6, invoice_subtotal = $7, rebate = $8,
        invoice_subtotal_after_rebate = $9, vat_amount = $10,
        total_invoice_amount = $11, sales_person = $12, year = $13,
        updated_at = now()
    WHERE id = $1
"#;

// Bind order matches the placeholders of INSERT_INVOICE and UPDATE_INVOICE.
fn bind_row<'q>(query: Query<'q, Postgres, PgArguments>, row: &'q InvoiceRow) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(row.id)
        .bind(&row.client)
        .bind(&row.invoice_no)
        .bind(row.invoice_date)
        .bind(&row.client_trn)
        .bind(&row.description)
        .bind(row.invoice_subtotal)
        .bind(row.rebate)
        .bind(row.invoice_subtotal_after_rebate)
        .bind(row.vat_amount)
        .bind(row.total_invoice_amount)
        .bind(&row.sales_person)
        .bind(&row.year)
}

fn write_error(err: sqlx::Error, invoice_no: &str) -> StoreError {
    let duplicate = err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());
    if duplicate {
        StoreError::DuplicateInvoiceNumber(invoice_no.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl InvoiceStore for Database {
    async fn fetch_all(&self) -> Result<Vec<Invoice>, StoreError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id, client, invoice_no, invoice_date, client_trn, description,
                invoice_subtotal, rebate, invoice_subtotal_after_rebate, vat_amount,
                total_invoice_amount, sales_person, year
            FROM invoices
            ORDER BY invoice_date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "fetched invoices");
        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    async fn insert(&self, invoice: &Invoice) -> Result<Uuid, StoreError> {
        let row = to_row(Uuid::new_v4(), invoice)?;

        bind_row(sqlx::query(INSERT_INVOICE), &row)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, &row.invoice_no))?;

        info!(invoice_no = %row.invoice_no, id = %row.id, "invoice created");
        Ok(row.id)
    }

    async fn update(&self, id: Uuid, invoice: &Invoice) -> Result<(), StoreError> {
        let row = to_row(id, invoice)?;

        let result = bind_row(sqlx::query(UPDATE_INVOICE), &row)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, &row.invoice_no))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        info!(invoice_no = %row.invoice_no, %id, "invoice updated");
        Ok(())
    }

    async fn update_by_invoice_no(&self, invoice_no: &str, invoice: &Invoice) -> Result<Uuid, StoreError> {
        let id = self.id_for_invoice_no(invoice_no).await?;
        self.update(id, invoice).await?;
        Ok(id)
    }

    async fn insert_batch(&self, invoices: &[Invoice]) -> Result<usize, StoreError> {
        let rows = invoices
            .iter()
            .map(|invoice| to_row(Uuid::new_v4(), invoice))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        for row in &rows {
            bind_row(sqlx::query(INSERT_INVOICE), row)
                .execute(&mut *tx)
                .await
                .map_err(|e| write_error(e, &row.invoice_no))?;
        }
        tx.commit().await?;

        Ok(rows.len())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM invoices").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
