//! CSV sales export integration tests.

mod common;

use common::{invoice_payload, receipt_payload, try_spawn_app};

#[tokio::test]
async fn export_receipts_as_csv() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    app.post("/receipts", &receipt_payload(&name)).await;
    app.post("/receipts", &receipt_payload(&name)).await;

    let response = app.get("/export/sales?document_type=receipts").await;
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/csv"))
        .unwrap_or(false));

    let body = response.text().await.expect("Failed to read body");
    let lines: Vec<&str> = body.trim_end().lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "seller,country,transaction_time,currency,net_price,total_tax,gross_price"
    );
    assert!(lines[1].contains(&name));
    assert!(lines[1].contains("Poland"));
    assert!(lines[1].contains("PLN"));
    // Gross 100.00 with 7.97 tax extracted
    assert!(lines[1].ends_with("92.03,7.97,100.00"));
}

#[tokio::test]
async fn export_invoices_as_csv() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    app.post("/invoices", &invoice_payload(&name)).await;

    let response = app.get("/export/sales?document_type=invoices").await;
    assert_eq!(response.status(), 200);

    let body = response.text().await.expect("Failed to read body");
    let lines: Vec<&str> = body.trim_end().lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("EUR"));
    assert!(lines[1].ends_with("71.88,16.54,88.42"));
}

#[tokio::test]
async fn export_requires_a_document_type() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let response = app.get("/export/sales").await;
    assert_eq!(response.status(), 400);
}
