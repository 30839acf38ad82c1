//! Company CRUD integration tests for sales-service.

mod common;

use common::{company_payload, try_spawn_app};
use serde_json::json;

#[tokio::test]
async fn create_company_returns_created() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.company_name();
    let response = app.post("/companies", &company_payload(&name)).await;
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.expect("invalid JSON");
    assert_eq!(body["name"], name);
    assert_eq!(body["nip_number"], "1234567890");
    assert_eq!(body["company_address"]["city"], "TestCity");
}

#[tokio::test]
async fn duplicate_company_name_conflicts() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    let response = app.post("/companies", &company_payload(&name)).await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn invalid_nip_is_rejected() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let mut payload = company_payload(&app.company_name());
    payload["nip_number"] = json!("123");
    let response = app.post("/companies", &payload).await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn get_company_returns_created_company() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    let response = app.get(&format!("/companies/{}", name)).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("invalid JSON");
    assert_eq!(body["name"], name);
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let response = app.get("/companies/DoesNotExist").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn update_company_changes_nip_and_address() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    let response = app
        .patch(
            &format!("/companies/{}", name),
            &json!({
                "nip_number": "9876543210",
                "company_address": {
                    "street": "Newstreet",
                    "building_number": "7",
                    "post_code": "54-321",
                    "city": "NewCity",
                    "country": "Poland"
                }
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("invalid JSON");
    assert_eq!(body["nip_number"], "9876543210");
    assert_eq!(body["company_address"]["street"], "Newstreet");
    // name stays fixed
    assert_eq!(body["name"], name);
}

#[tokio::test]
async fn company_with_documents_cannot_be_deleted() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    let response = app.post("/receipts", &common::receipt_payload(&name)).await;
    assert_eq!(response.status(), 201);

    let response = app.delete(&format!("/companies/{}", name)).await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn owners_cannot_see_each_others_companies() {
    let Some(app) = try_spawn_app().await else {
        return;
    };
    let Some(other) = try_spawn_app().await else {
        return;
    };

    let name = app.create_company().await;
    let response = other.get(&format!("/companies/{}", name)).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let Some(app) = try_spawn_app().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/companies", app.address))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
}
