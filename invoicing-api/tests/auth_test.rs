mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn register_and_login_round_trip() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let response = app.get("/api/auth/me", Some(&account.access_token)).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], account.email.as_str());
    assert_eq!(body["user"]["role"], "owner");
    assert_eq!(body["company"]["name"], "Acme GmbH");
    assert_eq!(body["company"]["invoice_prefix"], "ACM");
    assert_eq!(body["company"]["currency"], "EUR");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn duplicate_email_is_rejected() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let response = app
        .post(
            "/api/auth/register",
            None,
            &json!({
                "company_name": "Second Company",
                "email": account.email,
                "password": "another password"
            }),
        )
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let response = app
        .post(
            "/api/auth/login",
            None,
            &json!({ "email": account.email, "password": "wrong password" }),
        )
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .post(
            "/api/auth/login",
            None,
            &json!({ "email": "nobody@example.com", "password": "whatever!" }),
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn short_password_fails_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/api/auth/register",
            None,
            &json!({
                "company_name": "Acme",
                "email": "short@example.com",
                "password": "short"
            }),
        )
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn refresh_token_rotates() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let response = app
        .post(
            "/api/auth/refresh",
            None,
            &json!({ "refresh_token": account.refresh_token }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let tokens: Value = response.json().await.unwrap();
    let new_access = tokens["access_token"].as_str().unwrap();
    let new_refresh = tokens["refresh_token"].as_str().unwrap();
    assert_ne!(new_refresh, account.refresh_token);

    // The new access token works.
    let response = app.get("/api/auth/me", Some(new_access)).await;
    assert_eq!(response.status(), 200);

    // The consumed refresh token is dead.
    let response = app
        .post(
            "/api/auth/refresh",
            None,
            &json!({ "refresh_token": account.refresh_token }),
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn company_profile_can_be_updated() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let response = app
        .patch(
            "/api/company",
            Some(&account.access_token),
            &json!({
                "invoice_prefix": "RG",
                "city": "Munich",
                "tax_number": "DE123456789"
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["invoice_prefix"], "RG");
    assert_eq!(body["city"], "Munich");
    assert_eq!(body["tax_number"], "DE123456789");
    // Untouched fields survive a partial update.
    assert_eq!(body["name"], "Acme GmbH");
}
