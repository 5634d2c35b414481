mod common;

use common::TestApp;

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "invoicing-api");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn readiness_and_metrics_work() {
    let app = TestApp::spawn().await;

    let response = app.get("/ready", None).await;
    assert_eq!(response.status(), 200);

    let response = app.get("/metrics", None).await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("invoicing_db_query_duration_seconds"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn protected_routes_reject_missing_token() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/clients", None).await;
    assert_eq!(response.status(), 401);

    let response = app.get("/api/clients", Some("not-a-jwt")).await;
    assert_eq!(response.status(), 401);
}
