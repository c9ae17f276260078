//! Integration tests for login, the current user and administration.

mod common;

use common::{spawn_app, unique, ADMIN_PASSWORD, USER_PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn login_rejects_wrong_password() {
    let app = spawn_app().await;

    let res = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "username": "nobody-here", "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let token = app.create_cashier(None).await;
    let me: Value = app.get(&token, "/auth/me").await.json().await.unwrap();
    let username = me["user"]["username"].as_str().unwrap().to_string();

    let res = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "username": username, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn me_reports_scope_of_assigned_user() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let token = app.create_cashier(Some(pos_id)).await;

    let res = app.get(&token, "/auth/me").await;
    assert_eq!(res.status(), 200);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["user"]["is_staff"], false);
    assert_eq!(me["point_of_sale"]["pos_id"], pos_id);
    assert_eq!(me["scope"]["kind"], "point_of_sale");
    assert_eq!(me["scope"]["point_of_sale_id"], pos_id);
    assert!(me["user"].get("password_hash").is_none());

    let admin: Value = app.get(&app.admin_token, "/auth/me").await.json().await.unwrap();
    assert_eq!(admin["scope"]["kind"], "all");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn admin_endpoints_are_staff_only() {
    let app = spawn_app().await;

    let token = app.create_cashier(None).await;

    let res = app.get(&token, "/users").await;
    assert_eq!(res.status(), 403);

    let res = app
        .post_json(
            &token,
            "/users",
            json!({ "username": unique("x"), "password": USER_PASSWORD }),
        )
        .await;
    assert_eq!(res.status(), 403);

    let res = app
        .post_json(&token, "/points-of-sale", json!({ "name": unique("PDV") }))
        .await;
    assert_eq!(res.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn create_user_validates_password_length() {
    let app = spawn_app().await;

    let res = app
        .post_json(
            &app.admin_token,
            "/users",
            json!({ "username": unique("short"), "password": "123" }),
        )
        .await;
    assert_eq!(res.status(), 422);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn duplicate_username_is_a_conflict() {
    let app = spawn_app().await;

    let username = unique("dup");
    let body = json!({ "username": username, "password": USER_PASSWORD });
    let res = app.post_json(&app.admin_token, "/users", body.clone()).await;
    assert_eq!(res.status(), 201);
    let res = app.post_json(&app.admin_token, "/users", body).await;
    assert_eq!(res.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn reassigning_point_of_sale_replaces_previous_one() {
    let app = spawn_app().await;

    let first = app.create_point_of_sale(&unique("PDV")).await;
    let second = app.create_point_of_sale(&unique("PDV")).await;

    let res = app
        .post_json(
            &app.admin_token,
            "/users",
            json!({ "username": unique("caja"), "password": USER_PASSWORD }),
        )
        .await;
    let user: Value = res.json().await.unwrap();
    let user_id = user["user_id"].as_i64().unwrap();
    let path = format!("/users/{}/point-of-sale", user_id);

    for pos_id in [first, second] {
        let res = app
            .put_json(&app.admin_token, &path, json!({ "point_of_sale_id": pos_id }))
            .await;
        assert_eq!(res.status(), 200);
    }

    let users: Value = app.get(&app.admin_token, "/users").await.json().await.unwrap();
    let listed = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["user_id"] == user_id)
        .unwrap();
    assert_eq!(listed["pos_id"], second);

    let res = app.delete(&app.admin_token, &path).await;
    assert_eq!(res.status(), 204);
    let res = app.delete(&app.admin_token, &path).await;
    assert_eq!(res.status(), 404);

    let res = app
        .put_json(&app.admin_token, &path, json!({ "point_of_sale_id": 999_999_999 }))
        .await;
    assert_eq!(res.status(), 404);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn non_staff_only_see_their_own_point_of_sale() {
    let app = spawn_app().await;

    let own = app.create_point_of_sale(&unique("PDV")).await;
    app.create_point_of_sale(&unique("PDV")).await;
    let token = app.create_cashier(Some(own)).await;

    let list: Value = app.get(&token, "/points-of-sale").await.json().await.unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["pos_id"], own);
}
