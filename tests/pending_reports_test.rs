mod common;

use artisans_admin::store::{DocumentStore, REPORTS};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn seed_report(app: &common::TestApp, id: &str) {
    common::seed(
        app,
        REPORTS,
        id,
        json!({ "postId": "p0", "reporterId": "c0", "reason": "Stolen design", "status": "pending" }),
        1,
    )
    .await;
}

/// Next count pushed on the stream, skipping control frames.
async fn next_count(stream: &mut Stream) -> u64 {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("Timed out waiting for a count")
            .expect("Stream ended")
            .expect("Stream error");
        if let Message::Text(text) = msg {
            let body: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(body["type"], "pending_reports");
            return body["count"].as_u64().unwrap();
        }
    }
}

#[tokio::test]
async fn stream_pushes_the_initial_count_and_updates() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;
    seed_report(&app, "r0").await;

    let (mut stream, _) = connect_async(app.pending_reports_url(&token)).await.unwrap();
    assert_eq!(next_count(&mut stream).await, 1);

    seed_report(&app, "r1").await;
    assert_eq!(next_count(&mut stream).await, 2);

    app.store
        .update(
            REPORTS,
            "r0",
            json!({ "status": "rejected" }).as_object().unwrap().clone(),
        )
        .await
        .unwrap();
    assert_eq!(next_count(&mut stream).await, 1);
}

#[tokio::test]
async fn stream_closes_on_logout() {
    let app = common::spawn_app().await;
    let (_, token) = common::admin_token(&app, "ops@artisans.test", "admin").await;

    let (mut stream, _) = connect_async(app.pending_reports_url(&token)).await.unwrap();
    assert_eq!(next_count(&mut stream).await, 0);

    let resp = app
        .client
        .post(app.url("/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "stream stayed open after logout");
}

#[tokio::test]
async fn stream_rejects_a_bad_token() {
    let app = common::spawn_app().await;

    assert!(connect_async(app.pending_reports_url("not-a-token")).await.is_err());
}
