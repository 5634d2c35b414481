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
async fn draft_invoice_computes_totals_server_side() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;

    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;

    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["effective_status"], "draft");
    assert!(invoice["invoice_number"].is_null());
    // 2 x 100.00 at 19% tax.
    assert_eq!(amount(&invoice["subtotal"]), 200.0);
    assert_eq!(amount(&invoice["tax_total"]), 38.0);
    assert_eq!(amount(&invoice["total"]), 238.0);
    assert_eq!(amount(&invoice["amount_paid"]), 0.0);

    let items = invoice["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "Consulting");
    assert_eq!(amount(&items[0]["line_total"]), 238.0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn issuing_assigns_gapless_sequential_numbers() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let client_id = client["client_id"].as_str().unwrap();

    let first = app.create_invoice(&account, client_id).await;
    let second = app.create_invoice(&account, client_id).await;

    let issued = app
        .issue_invoice(&account, first["invoice_id"].as_str().unwrap())
        .await;
    assert_eq!(issued["invoice_number"], "ACM-000001");
    assert_eq!(issued["status"], "issued");
    assert_eq!(amount(&issued["amount_due"]), 238.0);

    let issued = app
        .issue_invoice(&account, second["invoice_id"].as_str().unwrap())
        .await;
    assert_eq!(issued["invoice_number"], "ACM-000002");

    // A second company starts its own sequence.
    let other = app.register_account().await;
    let other_client = app.create_client(&other, "Other Client").await;
    let invoice = app
        .create_invoice(&other, other_client["client_id"].as_str().unwrap())
        .await;
    let issued = app
        .issue_invoice(&other, invoice["invoice_id"].as_str().unwrap())
        .await;
    assert_eq!(issued["invoice_number"], "ACM-000001");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn issued_invoices_are_immutable() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    app.issue_invoice(&account, invoice_id).await;

    let response = app
        .patch(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
            &json!({ "notes": "too late" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .delete(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Re-issuing is rejected too.
    let response = app
        .post(
            &format!("/api/invoices/{}/issue", invoice_id),
            Some(&account.access_token),
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn draft_invoice_can_be_updated_and_deleted() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    // Replacing the items recomputes the totals.
    let response = app
        .patch(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
            &json!({
                "notes": "updated",
                "items": [{
                    "description": "Support",
                    "quantity": "1",
                    "unit_price": "50.00",
                    "tax_rate": "0"
                }]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["notes"], "updated");
    assert_eq!(amount(&updated["total"]), 50.0);
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);

    let response = app
        .delete(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .get(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn manual_payments_drive_the_status_machine() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    app.issue_invoice(&account, invoice_id).await;

    // Payments against drafts were already rejected at issue time; now pay
    // in two installments.
    let response = app
        .post(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
            &json!({ "amount": "100.00", "reference": "bank transfer" }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "partially_paid");
    assert_eq!(amount(&body["amount_paid"]), 100.0);
    assert_eq!(amount(&body["amount_due"]), 138.0);

    // Overpaying the remainder is rejected.
    let response = app
        .post(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
            &json!({ "amount": "500.00" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
            &json!({ "amount": "138.00" }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "paid");
    assert_eq!(amount(&body["amount_due"]), 0.0);

    // Paid invoices accept no further payments.
    let response = app
        .post(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
            &json!({ "amount": "1.00" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .get(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let listing: Value = response.json().await.unwrap();
    assert_eq!(listing["payments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn voiding_clears_the_balance() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();
    app.issue_invoice(&account, invoice_id).await;

    let response = app
        .post(
            &format!("/api/invoices/{}/void", invoice_id),
            Some(&account.access_token),
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "void");
    assert_eq!(amount(&body["amount_due"]), 0.0);

    // Void invoices accept no payments.
    let response = app
        .post(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
            &json!({ "amount": "10.00" }),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn overdue_is_derived_at_read_time() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    // Issue with a due date in the past.
    let response = app
        .post(
            &format!("/api/invoices/{}/issue", invoice_id),
            Some(&account.access_token),
            &json!({ "issue_date": "2020-01-01", "due_date": "2020-01-31" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "issued");
    assert_eq!(body["effective_status"], "overdue");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn send_stores_a_downloadable_pdf() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let invoice = app
        .create_invoice(&account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    // Drafts cannot be sent.
    let response = app
        .post(
            &format!("/api/invoices/{}/send", invoice_id),
            Some(&account.access_token),
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.issue_invoice(&account, invoice_id).await;

    let response = app
        .post(
            &format!("/api/invoices/{}/send", invoice_id),
            Some(&account.access_token),
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    // SMTP and the gateway are disabled in tests.
    assert_eq!(body["email_sent"], false);
    assert!(body["payment_link_url"].is_null());

    let response = app
        .get(
            &format!("/api/invoices/{}/pdf", invoice_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn invoice_listing_filters_by_status() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let client_id = client["client_id"].as_str().unwrap();

    let draft = app.create_invoice(&account, client_id).await;
    let to_issue = app.create_invoice(&account, client_id).await;
    app.issue_invoice(&account, to_issue["invoice_id"].as_str().unwrap())
        .await;

    let response = app
        .get("/api/invoices?status=draft", Some(&account.access_token))
        .await;
    let listing: Value = response.json().await.unwrap();
    let invoices = listing["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["invoice_id"], draft["invoice_id"]);

    let response = app
        .get("/api/invoices?status=issued", Some(&account.access_token))
        .await;
    let listing: Value = response.json().await.unwrap();
    assert_eq!(listing["invoices"].as_array().unwrap().len(), 1);

    // Inverted date ranges are rejected.
    let response = app
        .get(
            "/api/invoices?from=2026-02-01&to=2026-01-01",
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn invoice_listing_filters_by_overdue() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let client = app.create_client(&account, "Globex").await;
    let client_id = client["client_id"].as_str().unwrap();

    // One invoice long past due, one due far in the future.
    let past_due = app.create_invoice(&account, client_id).await;
    let response = app
        .post(
            &format!("/api/invoices/{}/issue", past_due["invoice_id"].as_str().unwrap()),
            Some(&account.access_token),
            &json!({ "issue_date": "2020-01-01", "due_date": "2020-01-31" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let current = app.create_invoice(&account, client_id).await;
    app.issue_invoice(&account, current["invoice_id"].as_str().unwrap())
        .await;

    let response = app
        .get("/api/invoices?status=overdue", Some(&account.access_token))
        .await;
    assert_eq!(response.status(), 200);
    let listing: Value = response.json().await.unwrap();
    let invoices = listing["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["invoice_id"], past_due["invoice_id"]);
    assert_eq!(invoices[0]["effective_status"], "overdue");
}
