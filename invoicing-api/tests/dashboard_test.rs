mod common;

use common::TestApp;
use serde_json::{json, Value};

fn amount(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or_else(|| panic!("expected a decimal amount, got {}", value))
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn summary_counts_by_effective_status() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let client_id = client["client_id"].as_str().unwrap();

    // One draft, one open, one overdue, one paid. Each totals 238.00.
    app.create_invoice(&account, client_id).await;

    let open = app.create_invoice(&account, client_id).await;
    app.issue_invoice(&account, open["invoice_id"].as_str().unwrap())
        .await;

    let overdue = app.create_invoice(&account, client_id).await;
    let overdue_id = overdue["invoice_id"].as_str().unwrap();
    let response = app
        .post(
            &format!("/api/invoices/{}/issue", overdue_id),
            Some(&account.access_token),
            &json!({ "issue_date": "2020-01-01", "due_date": "2020-01-31" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let paid = app.create_invoice(&account, client_id).await;
    let paid_id = paid["invoice_id"].as_str().unwrap();
    app.issue_invoice(&account, paid_id).await;
    let response = app
        .post(
            &format!("/api/invoices/{}/payments", paid_id),
            Some(&account.access_token),
            &json!({ "amount": "238.00" }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .get("/api/dashboard/summary", Some(&account.access_token))
        .await;
    assert_eq!(response.status(), 200);
    let summary: Value = response.json().await.unwrap();

    assert_eq!(summary["draft_count"], 1);
    assert_eq!(summary["issued_count"], 1);
    assert_eq!(summary["overdue_count"], 1);
    assert_eq!(summary["paid_count"], 1);
    // Outstanding covers both open invoices, overdue only the late one.
    assert_eq!(amount(&summary["outstanding_amount"]), 476.0);
    assert_eq!(amount(&summary["overdue_amount"]), 238.0);
    assert_eq!(amount(&summary["collected_amount"]), 238.0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn revenue_buckets_payments_by_month() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let client_id = client["client_id"].as_str().unwrap();

    // Two payments in one month, one in another.
    for (paid_date, invoice_amount) in [
        ("2026-01-10", "100.00"),
        ("2026-01-20", "138.00"),
        ("2026-02-05", "238.00"),
    ] {
        let invoice = app.create_invoice(&account, client_id).await;
        let invoice_id = invoice["invoice_id"].as_str().unwrap();
        app.issue_invoice(&account, invoice_id).await;
        let response = app
            .post(
                &format!("/api/invoices/{}/payments", invoice_id),
                Some(&account.access_token),
                &json!({ "amount": invoice_amount, "paid_date": paid_date }),
            )
            .await;
        assert_eq!(response.status(), 201);
    }

    let response = app
        .get(
            "/api/dashboard/revenue?from=2026-01-01&to=2026-03-01",
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let revenue: Value = response.json().await.unwrap();

    let months = revenue["months"].as_array().unwrap();
    assert_eq!(months.len(), 2);
    assert_eq!(months[0]["month"], "2026-01-01");
    assert_eq!(amount(&months[0]["collected"]), 238.0);
    assert_eq!(months[0]["payment_count"], 2);
    assert_eq!(months[1]["month"], "2026-02-01");
    assert_eq!(amount(&months[1]["collected"]), 238.0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn top_clients_are_ranked_by_collected_amount() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    for (name, payment) in [("Big Spender", "238.00"), ("Small Fry", "50.00")] {
        let client = app.create_client(&account, name).await;
        let invoice = app
            .create_invoice(&account, client["client_id"].as_str().unwrap())
            .await;
        let invoice_id = invoice["invoice_id"].as_str().unwrap();
        app.issue_invoice(&account, invoice_id).await;
        let response = app
            .post(
                &format!("/api/invoices/{}/payments", invoice_id),
                Some(&account.access_token),
                &json!({ "amount": payment }),
            )
            .await;
        assert_eq!(response.status(), 201);
    }

    let response = app
        .get(
            "/api/dashboard/top-clients?limit=10",
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    let clients = body["clients"].as_array().unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0]["client_name"], "Big Spender");
    assert_eq!(amount(&clients[0]["collected"]), 238.0);
    assert_eq!(clients[1]["client_name"], "Small Fry");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn dashboard_is_tenant_scoped() {
    let app = TestApp::spawn().await;
    let alice = app.register_account().await;
    let bob = app.register_account().await;

    let client = app.create_client(&alice, "Alice Client").await;
    let invoice = app
        .create_invoice(&alice, client["client_id"].as_str().unwrap())
        .await;
    app.issue_invoice(&alice, invoice["invoice_id"].as_str().unwrap())
        .await;

    let response = app
        .get("/api/dashboard/summary", Some(&bob.access_token))
        .await;
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["issued_count"], 0);
    assert_eq!(amount(&summary["outstanding_amount"]), 0.0);

    // Inverted ranges are rejected.
    let response = app
        .get(
            "/api/dashboard/revenue?from=2026-03-01&to=2026-01-01",
            Some(&alice.access_token),
        )
        .await;
    assert_eq!(response.status(), 400);
}
