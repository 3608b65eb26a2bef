use axum::{Json, debug_handler, extract::{State, WebSocketUpgrade}, extract::ws::Message as WsMessage, http::StatusCode, response::{IntoResponse, Response}};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;

use crate::{AppResult, session, store::Store};

use super::directory::RoomDirectory;

/// One-shot snapshot of the caller's rooms.
#[debug_handler]
pub(crate) async fn rooms(
    State(store): State<Store>,
    session: Session,
) -> AppResult<Response> {
    let Some(principal) = session::principal(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let rooms = store.rooms_for_member(&principal.id).await?;
    Ok(Json(rooms).into_response())
}

/// Live room list: a whole snapshot as JSON on every directory change.
#[debug_handler]
pub(crate) async fn rooms_ws(
    State(store): State<Store>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(principal) = session::principal(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let mut feed = RoomDirectory::new(store).list_rooms(&principal.id);
    Ok(ws.on_upgrade(async move |socket| {
        let (mut sender, mut receiver) = socket.split();

        let push_task = tokio::spawn(async move {
            while let Ok(Some(rooms)) = feed.next().await {
                let payload = serde_json::to_string(&rooms).unwrap_or_default();
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        });

        // drain the client side so a close shows up, then stop pushing
        while let Some(Ok(_)) = receiver.next().await {}
        push_task.abort();
    }))
}
