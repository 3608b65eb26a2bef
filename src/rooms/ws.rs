use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State, WebSocketUpgrade}, extract::ws::{Message as WsMessage, WebSocket}, http::StatusCode, response::{IntoResponse, Response}};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, AppState, augment::{AugmentKind, DerivedText}, session, store::Store};

use super::session::RoomSession;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientOp {
    Send { text: String },
    Augment { message_id: Uuid, kind: AugmentKind },
}

/// Room socket: members only. The client sends ops, the server pushes the
/// session's whole merged message list on every change.
#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<Uuid>,
    State(store): State<Store>,
    State(provider): State<Arc<dyn DerivedText>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(principal) = session::principal(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let Some(room) = store.room(room_id).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    if !store.is_member(room_id, &principal.id).await? {
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let room_session = RoomSession::open(store, provider, principal, room).await?;
    Ok(ws.on_upgrade(async move |socket| serve_session(socket, room_session).await))
}

async fn serve_session(socket: WebSocket, room_session: RoomSession) {
    let (mut sender, mut receiver) = socket.split();
    let mut view = room_session.messages();

    let push_task = tokio::spawn(async move {
        loop {
            let payload = serde_json::to_string(&*view.borrow_and_update()).unwrap_or_default();
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
            if view.changed().await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = receiver.next().await {
        let Ok(op) = serde_json::from_slice::<ClientOp>(&frame.into_data()) else {
            continue;
        };
        match op {
            ClientOp::Send { text } => {
                if let Err(err) = room_session.send(&text).await {
                    tracing::debug!(error = %err, "send rejected");
                }
            }
            ClientOp::Augment { message_id, kind } => room_session.augment(message_id, kind),
        }
    }

    push_task.abort();
    // dropping the session releases its feed and augmentation slots
}
