mod common;

use serde_json::{json, Value};

async fn post_admin(app: &common::TestApp, token: &str, body: Value) -> (u16, Value) {
    let resp = app
        .client
        .post(app.url("/admins"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn plain_admin_cannot_manage_admins() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;

    let (status, _) = post_admin(
        &app,
        &token,
        json!({ "email": "new@artisans.test", "role": "admin", "password": "secret_123", "confirm": true }),
    )
    .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn super_admin_adds_an_admin_who_can_sign_in() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "root@artisans.test", "super-admin").await;

    let request = json!({
        "email": "new@artisans.test",
        "role": "admin",
        "password": common::PASSWORD,
    });
    let (status, body) = post_admin(&app, &token, request.clone()).await;
    assert_eq!(status, 428);
    assert_eq!(body["error"], "Grant admin access to new@artisans.test?");

    let mut confirmed = request;
    confirmed["confirm"] = json!(true);
    let (status, body) = post_admin(&app, &token, confirmed.clone()).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["invalidated"], json!(["admins"]));

    let new_token = common::login(&app, "new@artisans.test").await;
    let (status, body) = common::get_json(&app, "/auth/me", &new_token).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["role"], "admin");

    let (status, _) = post_admin(&app, &token, confirmed).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn unknown_email_without_password_is_rejected() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "root@artisans.test", "super-admin").await;

    let (status, _) = post_admin(
        &app,
        &token,
        json!({ "email": "ghost@artisans.test", "role": "admin", "confirm": true }),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post_admin(
        &app,
        &token,
        json!({ "email": "not-an-email", "role": "admin", "password": "secret_123", "confirm": true }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn promote_then_remove_admin() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "root@artisans.test", "super-admin").await;
    let other = common::create_admin(&app, "ops@artisans.test", "admin").await;

    let resp = app
        .client
        .put(app.url(&format!("/admins/{other}/role")))
        .bearer_auth(&token)
        .json(&json!({ "role": "super-admin", "confirm": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Admin promoted.");

    let resp = app
        .client
        .delete(app.url(&format!("/admins/{other}?confirm=true")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (_, body) = common::get_json(&app, "/views/admins", &token).await;
    let emails: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["email"].as_str())
        .collect();
    assert_eq!(emails, ["root@artisans.test"]);
}

#[tokio::test]
async fn super_admin_cannot_target_themselves() {
    let app = common::spawn_app().await;
    let (id, token) = common::admin_token(&app, "root@artisans.test", "super-admin").await;

    let resp = app
        .client
        .put(app.url(&format!("/admins/{id}/role")))
        .bearer_auth(&token)
        .json(&json!({ "role": "admin", "confirm": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .delete(app.url(&format!("/admins/{id}?confirm=true")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
