mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn client_crud_round_trip() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let created = app.create_client(&account, "Globex Corp").await;
    let client_id = created["client_id"].as_str().unwrap();
    assert_eq!(created["name"], "Globex Corp");
    assert_eq!(created["archived"], false);

    let response = app
        .get(
            &format!("/api/clients/{}", client_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .patch(
            &format!("/api/clients/{}", client_id),
            Some(&account.access_token),
            &json!({ "phone": "+49 30 1234567", "notes": "Net 30" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["phone"], "+49 30 1234567");
    assert_eq!(updated["name"], "Globex Corp");

    let response = app
        .delete(
            &format!("/api/clients/{}", client_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], true);
    assert_eq!(body["archived"], false);

    let response = app
        .get(
            &format!("/api/clients/{}", client_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn referenced_client_is_archived_not_deleted() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    let client = app.create_client(&account, "Initech").await;
    let client_id = client["client_id"].as_str().unwrap();
    app.create_invoice(&account, client_id).await;

    let response = app
        .delete(
            &format!("/api/clients/{}", client_id),
            Some(&account.access_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], false);
    assert_eq!(body["archived"], true);

    // Archived clients drop out of the default listing.
    let response = app.get("/api/clients", Some(&account.access_token)).await;
    let listing: Value = response.json().await.unwrap();
    assert!(listing["clients"]
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["client_id"] != client_id));

    let response = app
        .get(
            "/api/clients?include_archived=true",
            Some(&account.access_token),
        )
        .await;
    let listing: Value = response.json().await.unwrap();
    assert!(listing["clients"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["client_id"] == client_id));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn clients_are_tenant_scoped() {
    let app = TestApp::spawn().await;
    let alice = app.register_account().await;
    let bob = app.register_account().await;

    let client = app.create_client(&alice, "Alice's Client").await;
    let client_id = client["client_id"].as_str().unwrap();

    // Bob cannot see or touch Alice's client.
    let response = app
        .get(&format!("/api/clients/{}", client_id), Some(&bob.access_token))
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .delete(&format!("/api/clients/{}", client_id), Some(&bob.access_token))
        .await;
    assert_eq!(response.status(), 404);

    let response = app.get("/api/clients", Some(&bob.access_token)).await;
    let listing: Value = response.json().await.unwrap();
    assert!(listing["clients"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn client_listing_paginates_with_cursor() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    for i in 0..5 {
        app.create_client(&account, &format!("Client {}", i)).await;
    }

    let response = app
        .get("/api/clients?page_size=2", Some(&account.access_token))
        .await;
    let first: Value = response.json().await.unwrap();
    assert_eq!(first["clients"].as_array().unwrap().len(), 2);
    let cursor = first["next_page_token"].as_str().unwrap().to_string();

    let response = app
        .get(
            &format!("/api/clients?page_size=2&page_token={}", cursor),
            Some(&account.access_token),
        )
        .await;
    let second: Value = response.json().await.unwrap();
    assert_eq!(second["clients"].as_array().unwrap().len(), 2);

    // No overlap between pages.
    let first_ids: Vec<&str> = first["clients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["client_id"].as_str().unwrap())
        .collect();
    for client in second["clients"].as_array().unwrap() {
        assert!(!first_ids.contains(&client["client_id"].as_str().unwrap()));
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (set INVOICING_TEST_DATABASE_URL)"]
async fn client_search_matches_name() {
    let app = TestApp::spawn().await;
    let account = app.register_account().await;

    app.create_client(&account, "Stark Industries").await;
    app.create_client(&account, "Wayne Enterprises").await;

    let response = app
        .get("/api/clients?search=stark", Some(&account.access_token))
        .await;
    let listing: Value = response.json().await.unwrap();
    let clients = listing["clients"].as_array().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["name"], "Stark Industries");
}
