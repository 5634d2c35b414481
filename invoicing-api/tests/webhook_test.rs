mod common;

use common::{sign_webhook, TestApp, TestAccount};
use serde_json::{json, Value};
use uuid::Uuid;

const SIGNATURE_HEADER: &str = "x-gateway-signature";

async fn post_webhook(app: &TestApp, body: &str, signature: &str) -> reqwest::Response {
    app.client
        .post(format!("{}/api/webhooks/gateway", app.address))
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("Failed to execute request")
}

fn paid_event(link_id: &str, payment_id: &str, amount_minor: u64) -> String {
    json!({
        "event": "payment_link.paid",
        "created_at": 1764590400,
        "payload": {
            "payment_link": {
                "entity": { "id": link_id, "status": "paid" }
            },
            "payment": {
                "entity": {
                    "id": payment_id,
                    "amount": amount_minor,
                    "currency": "EUR",
                    "status": "captured",
                    "method": "card",
                    "created_at": 1764590400
                }
            }
        }
    })
    .to_string()
}

/// Create and issue an invoice, then attach a payment link to it the way
/// a successful send would.
async fn issued_invoice_with_link(
    app: &TestApp,
    account: &TestAccount,
    link_id: &str,
) -> Uuid {
    let client = app.create_client(account, "Webhook Client").await;
    let invoice = app
        .create_invoice(account, client["client_id"].as_str().unwrap())
        .await;
    let invoice_id = common::parse_uuid(&invoice["invoice_id"]);
    app.issue_invoice(account, &invoice_id.to_string()).await;

    app.state
        .db
        .set_payment_link(
            account.company_id,
            invoice_id,
            link_id,
            &format!("https://pay.example.com/{}", link_id),
        )
        .await
        .expect("Failed to attach payment link");

    invoice_id
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn paid_webhook_settles_the_invoice() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let link_id = format!("plink_{}", Uuid::new_v4().simple());
    let invoice_id = issued_invoice_with_link(&app, &account, &link_id).await;

    // Full amount: 238.00 EUR in minor units.
    let body = paid_event(&link_id, "pay_settle_1", 23800);
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "applied");

    let response = app
        .get(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
        )
        .await;
    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["status"], "paid");
    assert_eq!(invoice["amount_due"].as_str().unwrap().parse::<f64>().unwrap(), 0.0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn replayed_webhook_is_acknowledged_once() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let link_id = format!("plink_{}", Uuid::new_v4().simple());
    let invoice_id = issued_invoice_with_link(&app, &account, &link_id).await;

    let body = paid_event(&link_id, "pay_replay_1", 23800);
    let signature = sign_webhook(&body);

    let response = post_webhook(&app, &body, &signature).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "applied");

    // The gateway retries; the payment must not apply twice.
    let response = post_webhook(&app, &body, &signature).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "replayed");

    let response = app
        .get(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
        )
        .await;
    let listing: Value = response.json().await.unwrap();
    assert_eq!(listing["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn partial_gateway_payment_marks_partially_paid() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let link_id = format!("plink_{}", Uuid::new_v4().simple());
    let invoice_id = issued_invoice_with_link(&app, &account, &link_id).await;

    let body = paid_event(&link_id, "pay_partial_1", 10000);
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);

    let response = app
        .get(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
        )
        .await;
    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["status"], "partially_paid");
    assert_eq!(
        invoice["amount_paid"].as_str().unwrap().parse::<f64>().unwrap(),
        100.0
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn event_for_settled_invoice_is_acknowledged() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let link_id = format!("plink_{}", Uuid::new_v4().simple());
    let invoice_id = issued_invoice_with_link(&app, &account, &link_id).await;

    let body = paid_event(&link_id, "pay_settle_first", 23800);
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);

    // A second, distinct gateway payment for an invoice that is already
    // paid: acknowledge and drop it, the gateway retries anything else.
    let body = paid_event(&link_id, "pay_settle_second", 23800);
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "ignored");

    let response = app
        .get(
            &format!("/api/invoices/{}/payments", invoice_id),
            Some(&account.access_token),
        )
        .await;
    let listing: Value = response.json().await.unwrap();
    assert_eq!(listing["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn event_for_voided_invoice_is_acknowledged() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;
    let link_id = format!("plink_{}", Uuid::new_v4().simple());
    let invoice_id = issued_invoice_with_link(&app, &account, &link_id).await;

    let response = app
        .post(
            &format!("/api/invoices/{}/void", invoice_id),
            Some(&account.access_token),
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = paid_event(&link_id, "pay_after_void", 23800);
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "ignored");

    let response = app
        .get(
            &format!("/api/invoices/{}", invoice_id),
            Some(&account.access_token),
        )
        .await;
    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["status"], "void");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn bad_or_missing_signature_is_rejected() {
    let app = TestApp::spawn().await;
    let body = paid_event("plink_unknown", "pay_bad_sig", 100);

    let response = post_webhook(&app, &body, "deadbeef").await;
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .post(format!("{}/api/webhooks/gateway", app.address))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn unknown_links_and_other_events_are_ignored() {
    let app = TestApp::spawn().await;

    // A link no invoice carries: acknowledge so the gateway stops retrying.
    let body = paid_event("plink_nobody_knows", "pay_orphan_1", 100);
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "ignored");

    // An event type we do not handle.
    let body = json!({
        "event": "payment_link.expired",
        "created_at": 1764590400,
        "payload": {}
    })
    .to_string();
    let response = post_webhook(&app, &body, &sign_webhook(&body)).await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["status"], "ignored");
}
