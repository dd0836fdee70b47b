use crate::error::AppError;
use crate::middleware::auth::authorize;
use crate::services::dashboard::SessionRegistry;
use crate::services::identity::SharedIdentityProvider;
use crate::store::SharedStore;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::watch;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub fn count_message(count: u64) -> String {
    serde_json::json!({ "type": "pending_reports", "count": count }).to_string()
}

/// Live pending-report count for the admin owning `token`. The stream ends
/// when the dashboard session is released.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(store): Extension<SharedStore>,
    Extension(identities): Extension<SharedIdentityProvider>,
    Extension(sessions): Extension<SessionRegistry>,
) -> Result<impl IntoResponse, AppError> {
    let admin = authorize(&query.token, &store, &identities, &sessions).await?;
    let session = sessions
        .get_or_start(&admin.session_id, &admin.id, admin.expires_at)
        .await;
    let receiver = session
        .lock()
        .await
        .pending_receiver()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("pending report count unavailable")))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, admin.email, receiver)))
}

async fn handle_socket(socket: WebSocket, email: String, mut counts: watch::Receiver<u64>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    tracing::info!("Pending report stream opened for {}", email);

    let send_task = tokio::spawn(async move {
        let initial = *counts.borrow_and_update();
        if ws_sender
            .send(Message::Text(count_message(initial).into()))
            .await
            .is_err()
        {
            return;
        }
        while counts.changed().await.is_ok() {
            let count = *counts.borrow_and_update();
            if ws_sender
                .send(Message::Text(count_message(count).into()))
                .await
                .is_err()
            {
                break;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    tracing::info!("Pending report stream closed for {}", email);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_the_count() {
        let parsed: serde_json::Value = serde_json::from_str(&count_message(4)).unwrap();
        assert_eq!(parsed["type"], "pending_reports");
        assert_eq!(parsed["count"], 4);
    }
}
