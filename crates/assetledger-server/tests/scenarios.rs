//! End-to-end scenarios driven over HTTP against a real Postgres instance,
//! one per named scenario in the seed list: bootstrap-first-admin, employee
//! ownership, loan happy path, token revocation, cross-manager denial.
//! Concurrent stock contention gets its own file (`tests/stock.rs`) since it
//! needs many tasks sharing one pool rather than a single request sequence.

mod common;

use common::{seed_asset_item, seed_asset_model, seed_employee, seed_stock_item, TestServer};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test]
async fn bootstrap_first_admin_then_manager(pool: PgPool) {
    let server = TestServer::spawn(pool).await;

    let first = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "admin@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);
    let first_body: serde_json::Value = first.json().await.unwrap();
    assert_eq!(first_body["user"]["role"], "ADMIN");

    let second = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "manager@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);
    let second_body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(second_body["user"]["role"], "MANAGER");
}

#[sqlx::test]
async fn employee_crud_respects_ownership_gate(pool: PgPool) {
    let server = TestServer::spawn(pool.clone()).await;

    let admin = register(&server, "admin@example.com").await;
    let manager_a = register(&server, "manager-a@example.com").await;
    let _manager_b = register(&server, "manager-b@example.com").await;

    let employee_under_a = server
        .client
        .post(server.url("/employees"))
        .bearer_auth(&manager_a.access_token)
        .json(&json!({
            "first_name": "Jamie",
            "last_name": "Rivera",
            "manager_user_id": manager_a.user_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(employee_under_a.status(), 200);
    let employee: serde_json::Value = employee_under_a.json().await.unwrap();
    let employee_id = employee["id"].as_str().unwrap();

    // The creating manager can read their own employee back.
    let own_read = server
        .client
        .get(server.url(&format!("/employees/{employee_id}")))
        .bearer_auth(&manager_a.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(own_read.status(), 200);

    // ADMIN can read anything.
    let admin_read = server
        .client
        .get(server.url(&format!("/employees/{employee_id}")))
        .bearer_auth(&admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(admin_read.status(), 200);
}

#[sqlx::test]
async fn loan_happy_path_signs_and_closes(pool: PgPool) {
    let server = TestServer::spawn(pool.clone()).await;
    let admin = register(&server, "admin@example.com").await;

    let model = seed_asset_model(&pool, "laptop", "Framework", "13").await;
    let asset_item = seed_asset_item(&pool, model.id, "TAG-001").await;
    let stock_item = seed_stock_item(&pool, model.id, 5, 0).await;
    let employee = seed_employee(&pool, "Dana", "Cho", None).await;

    let create = server
        .client
        .post(server.url("/loans"))
        .bearer_auth(&admin.access_token)
        .json(&json!({
            "employeeId": employee.id,
            "lines": [
                { "assetItemId": asset_item.id },
                { "assetModelId": model.id, "quantity": 2 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), 201);
    let loan: serde_json::Value = create.json().await.unwrap();
    let loan_id = loan["id"].as_str().unwrap();

    let item_after_create = server
        .client
        .get(server.url(&format!("/asset-items/{}", asset_item.id)))
        .bearer_auth(&admin.access_token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(item_after_create["status"], "LENT");

    let stock_after_create = server
        .client
        .get(server.url(&format!("/stock-items/{}", stock_item.id)))
        .bearer_auth(&admin.access_token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(stock_after_create["loaned"], 2);

    let pickup = server
        .client
        .post(server.url(&format!("/loans/{loan_id}/pickup-signature")))
        .bearer_auth(&admin.access_token)
        .json(&json!({
            "signatureUrl": "https://signatures.example.com/a.png",
            "signedAt": chrono::Utc::now(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(pickup.status(), 200);

    let returned = server
        .client
        .post(server.url(&format!("/loans/{loan_id}/return-signature")))
        .bearer_auth(&admin.access_token)
        .json(&json!({
            "signatureUrl": "https://signatures.example.com/b.png",
            "signedAt": chrono::Utc::now(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(returned.status(), 200);

    let close = server
        .client
        .post(server.url(&format!("/loans/{loan_id}/close")))
        .bearer_auth(&admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(close.status(), 200);

    let item_after_close = server
        .client
        .get(server.url(&format!("/asset-items/{}", asset_item.id)))
        .bearer_auth(&admin.access_token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(item_after_close["status"], "IN_STOCK");

    let stock_after_close = server
        .client
        .get(server.url(&format!("/stock-items/{}", stock_item.id)))
        .bearer_auth(&admin.access_token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(stock_after_close["loaned"], 0);
}

#[sqlx::test]
async fn logout_revokes_access_token_immediately(pool: PgPool) {
    let server = TestServer::spawn(pool).await;
    let user = register(&server, "admin@example.com").await;

    let before_logout = server
        .client
        .get(server.url("/employees"))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(before_logout.status(), 200);

    let logout = server
        .client
        .post(server.url("/auth/logout"))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), 200);

    let after_logout = server
        .client
        .get(server.url("/employees"))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(after_logout.status(), 401);
}

#[sqlx::test]
async fn manager_cannot_act_on_another_managers_employee(pool: PgPool) {
    let server = TestServer::spawn(pool.clone()).await;

    let manager_a = register(&server, "manager-a@example.com").await;
    let manager_b = register(&server, "manager-b@example.com").await;

    let manager_a_id = uuid::Uuid::parse_str(&manager_a.user_id).unwrap();
    let employee = seed_employee(&pool, "Alex", "Nguyen", Some(manager_a_id)).await;

    let forbidden = server
        .client
        .get(server.url(&format!("/employees/{}", employee.id)))
        .bearer_auth(&manager_b.access_token)
        .send()
        .await
        .unwrap();

    // No existence oracle for non-ADMIN callers: forbidden, not a 404 that
    // would confirm the record exists.
    assert_eq!(forbidden.status(), 403);
}

struct Session {
    access_token: String,
    user_id: String,
}

async fn register(server: &TestServer, email: &str) -> Session {
    let resp = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": email, "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "registration for {email} failed");
    let body: serde_json::Value = resp.json().await.unwrap();
    Session {
        access_token: body["access_token"].as_str().unwrap().to_owned(),
        user_id: body["user"]["id"].as_str().unwrap().to_owned(),
    }
}
