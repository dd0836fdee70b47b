mod common;

use artisans_admin::store::{
    Direction, DocumentStore, StoreQuery, AUDIT_LOGS, POSTS, REPORTS, USERS,
};
use serde_json::{json, Value};
use std::time::Duration;

async fn send(
    app: &common::TestApp,
    method: reqwest::Method,
    path: &str,
    token: &str,
    body: Option<Value>,
) -> (u16, Value) {
    let mut req = app.client.request(method, app.url(path)).bearer_auth(token);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn seed_customers(app: &common::TestApp, n: i64) {
    for i in 0..n {
        common::seed(
            app,
            USERS,
            &format!("c{i}"),
            json!({ "name": format!("Customer {i}"), "email": format!("c{i}@mail.test"), "role": "customer" }),
            i,
        )
        .await;
    }
}

async fn seed_report(app: &common::TestApp, report_id: &str, post_id: &str) {
    common::seed(
        app,
        POSTS,
        post_id,
        json!({ "artistName": "Weaver", "category": "Weaving", "description": "Rug", "status": "active" }),
        5,
    )
    .await;
    common::seed(
        app,
        REPORTS,
        report_id,
        json!({ "postId": post_id, "reporterId": "c0", "reason": "Stolen design", "status": "pending" }),
        1,
    )
    .await;
}

async fn audit_actions(app: &common::TestApp) -> Vec<String> {
    app.store
        .query(&StoreQuery::collection(AUDIT_LOGS).order_by("timestamp", Direction::Asc))
        .await
        .unwrap()
        .iter()
        .filter_map(|doc| doc.str_field("action").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn delete_user_needs_confirmation() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_customers(&app, 1).await;

    let (status, body) = send(&app, reqwest::Method::DELETE, "/users/c0", &token, None).await;
    assert_eq!(status, 428);
    assert_eq!(body["error"], "Delete user \"Customer 0\"? This cannot be undone.");
    assert!(app.store.get(USERS, "c0").await.unwrap().is_some());

    let (status, body) = send(
        &app,
        reqwest::Method::DELETE,
        "/users/c0?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "User deleted successfully!");
    assert!(app.store.get(USERS, "c0").await.unwrap().is_none());
    assert_eq!(audit_actions(&app).await, ["delete_user"]);
}

#[tokio::test]
async fn deleting_a_missing_user_is_not_found() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;

    let (status, _) = send(
        &app,
        reqwest::Method::DELETE,
        "/users/nobody?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn mutation_restarts_affected_views() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_customers(&app, 7).await;

    common::get_json(&app, "/views/customers", &token).await;
    let (_, body) = common::get_json(&app, "/views/customers?nav=next", &token).await;
    assert_eq!(body["data"]["page"], 2);

    let (_, body) = send(
        &app,
        reqwest::Method::DELETE,
        "/users/c1?confirm=true",
        &token,
        None,
    )
    .await;
    let invalidated: Vec<&str> = body["data"]["invalidated"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(invalidated, ["customers", "all-users", "artists", "overview"]);

    let (_, body) = common::get_json(&app, "/views/customers?nav=reload", &token).await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["navigation"], "first");
    assert_eq!(body["data"]["items"][1]["id"], "c2");
}

#[tokio::test]
async fn suspend_then_activate_user() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_customers(&app, 1).await;

    let (status, body) = send(
        &app,
        reqwest::Method::PUT,
        "/users/c0/status",
        &token,
        Some(json!({ "status": "suspended", "confirm": true })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "User suspended.");

    let (status, _) = send(
        &app,
        reqwest::Method::PUT,
        "/users/c0/status",
        &token,
        Some(json!({ "status": "suspended", "confirm": true })),
    )
    .await;
    assert_eq!(status, 409);

    let (status, _) = send(
        &app,
        reqwest::Method::PUT,
        "/users/c0/status",
        &token,
        Some(json!({ "status": "active" })),
    )
    .await;
    assert_eq!(status, 428);
}

#[tokio::test]
async fn delete_post_with_confirmation() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_report(&app, "r0", "p0").await;

    let (status, body) = send(&app, reqwest::Method::DELETE, "/posts/p0", &token, None).await;
    assert_eq!(status, 428);
    assert_eq!(body["error"], "Delete this post? This cannot be undone.");

    let (status, body) = send(
        &app,
        reqwest::Method::DELETE,
        "/posts/p0?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Post deleted successfully!");
}

#[tokio::test]
async fn approve_report_removes_the_post_and_clears_pending() {
    let app = common::spawn_app().await;
    seed_report(&app, "r0", "p0").await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;

    let (_, body) = common::get_json(&app, "/reports/pending-count", &token).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["live"], true);

    let (status, body) = send(&app, reqwest::Method::PUT, "/reports/r0/approve", &token, None).await;
    assert_eq!(status, 428);
    assert_eq!(body["error"], "This will remove the reported post. Continue?");

    let (status, body) = send(
        &app,
        reqwest::Method::PUT,
        "/reports/r0/approve?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Report approved. Post removed.");

    let post = app.store.get(POSTS, "p0").await.unwrap().unwrap();
    assert_eq!(post.str_field("status"), Some("removed"));
    let report = app.store.get(REPORTS, "r0").await.unwrap().unwrap();
    assert_eq!(report.str_field("status"), Some("reviewed"));

    let mut count = Value::Null;
    for _ in 0..50 {
        let (_, body) = common::get_json(&app, "/reports/pending-count", &token).await;
        count = body["data"]["count"].clone();
        if count == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(count, 0);

    let (status, _) = send(
        &app,
        reqwest::Method::PUT,
        "/reports/r0/reject?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn reject_report_leaves_the_post() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_report(&app, "r0", "p0").await;

    let (status, body) = send(
        &app,
        reqwest::Method::PUT,
        "/reports/r0/reject?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Report rejected.");

    let post = app.store.get(POSTS, "p0").await.unwrap().unwrap();
    assert_eq!(post.str_field("status"), Some("active"));
}

#[tokio::test]
async fn approve_reports_partial_failure() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_report(&app, "r0", "p0").await;
    app.memory.fail_writes_to(REPORTS);

    let (status, _) = send(
        &app,
        reqwest::Method::PUT,
        "/reports/r0/approve?confirm=true",
        &token,
        None,
    )
    .await;
    assert_eq!(status, 500);

    let post = app.store.get(POSTS, "p0").await.unwrap().unwrap();
    assert_eq!(post.str_field("status"), Some("removed"));
    assert_eq!(audit_actions(&app).await, ["approve_report"]);
    app.memory.restore_writes_to(REPORTS);
}
