//! Postgres store against a live database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test --test database -- --ignored`.
//! Every test uses its own invoice-number series, so the suite can share a
//! scratch database with other data.

use invoice_tracker::db::{Database, InvoiceStore, StoreError};
use invoice_tracker::models::Invoice;
use uuid::Uuid;

async fn connect() -> Database {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
    Database::connect(&url).await.unwrap()
}

fn series() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

fn invoice(no: &str) -> Invoice {
    Invoice {
        client: "Acme Trading".to_string(),
        invoice_no: no.to_string(),
        invoice_date: "2024-05-17".to_string(),
        client_trn: "100234567800003".to_string(),
        description: "Shopfront lightbox".to_string(),
        subtotal: "4000".to_string(),
        rebate: "0".to_string(),
        subtotal_after_rebate: "4000".to_string(),
        vat_amount: "200".to_string(),
        total_amount: "4200".to_string(),
        sales_person: "Mira".to_string(),
        year: "2024".to_string(),
        ..Invoice::default()
    }
}

async fn find(db: &Database, no: &str) -> Option<Invoice> {
    db.fetch_all().await.unwrap().into_iter().find(|i| i.invoice_no == no)
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn update_writes_every_column_in_place() {
    let db = connect().await;
    let no = format!("{}-0001", series());
    let id = db.insert(&invoice(&no)).await.unwrap();

    let edited = Invoice {
        client: "Blue Dune".to_string(),
        invoice_date: "2024-06-02".to_string(),
        client_trn: String::new(),
        description: "Vehicle wrap".to_string(),
        subtotal: "1,000".to_string(),
        rebate: "50".to_string(),
        subtotal_after_rebate: "950".to_string(),
        vat_amount: "47.5".to_string(),
        total_amount: "997.5".to_string(),
        sales_person: "Omar".to_string(),
        year: "2024".to_string(),
        ..invoice(&no)
    };
    db.update(id, &edited).await.unwrap();

    let saved = find(&db, &no).await.unwrap();
    assert_eq!(saved.id, Some(id));
    assert_eq!(saved.client, "Blue Dune");
    assert_eq!(saved.date(), "2024-06-02");
    assert_eq!(saved.client_trn, "");
    assert_eq!(saved.description, "Vehicle wrap");
    assert_eq!(saved.subtotal, "1000.00");
    assert_eq!(saved.rebate, "50.00");
    assert_eq!(saved.subtotal_after_rebate, "950.00");
    assert_eq!(saved.vat_amount, "47.50");
    assert_eq!(saved.total_amount, "997.50");
    assert_eq!(saved.sales_person, "Omar");

    let by_number = db
        .update_by_invoice_no(&format!(" {} ", no), &invoice(&no))
        .await
        .unwrap();
    assert_eq!(by_number, id);
    assert_eq!(find(&db, &no).await.unwrap().total_amount, "4200.00");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn unique_violations_become_duplicate_numbers() {
    let db = connect().await;
    let prefix = series();
    let first = format!("{}-0001", prefix);
    let second = format!("{}-0002", prefix);
    db.insert(&invoice(&first)).await.unwrap();
    let id = db.insert(&invoice(&second)).await.unwrap();

    let err = db.insert(&invoice(&first)).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateInvoiceNumber(ref no) if *no == first));

    let err = db.update(id, &invoice(&first)).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateInvoiceNumber(ref no) if *no == first));
    assert!(find(&db, &second).await.is_some());

    let err = db.update(Uuid::new_v4(), &invoice(&format!("{}-0003", prefix))).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn failed_batch_rolls_back() {
    let db = connect().await;
    let prefix = series();
    let batch: Vec<Invoice> = ["0001", "0002", "0001"]
        .iter()
        .map(|n| invoice(&format!("{}-{}", prefix, n)))
        .collect();

    let err = db.insert_batch(&batch).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateInvoiceNumber(_)));
    assert!(find(&db, &format!("{}-0001", prefix)).await.is_none());
    assert!(find(&db, &format!("{}-0002", prefix)).await.is_none());

    assert_eq!(db.insert_batch(&batch[..2]).await.unwrap(), 2);
    assert!(find(&db, &format!("{}-0002", prefix)).await.is_some());
}
