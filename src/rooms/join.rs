use axum::{Json, debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppResult, session, store::Store};

use super::directory::RoomDirectory;

#[derive(Debug, Deserialize)]
pub(crate) struct JoinRoomBody {
    name: String,
}

#[debug_handler]
pub(crate) async fn join_room(
    State(store): State<Store>,
    session: Session,
    Json(JoinRoomBody { name }): Json<JoinRoomBody>,
) -> AppResult<Response> {
    let Some(principal) = session::principal(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let room = RoomDirectory::new(store).join_room(&principal.id, &name).await?;
    Ok(Json(room).into_response())
}
