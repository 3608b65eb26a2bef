use axum::{Json, debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppResult, session, store::Store};

use super::directory::RoomDirectory;

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomBody {
    name: String,
}

/// Create a room, or come back with a suffixed candidate name for the
/// caller to confirm when the requested one is taken.
#[debug_handler]
pub(crate) async fn new_room(
    State(store): State<Store>,
    session: Session,
    Json(NewRoomBody { name }): Json<NewRoomBody>,
) -> AppResult<Response> {
    let Some(principal) = session::principal(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let outcome = RoomDirectory::new(store).create_room(&principal.id, &name).await?;
    Ok(Json(outcome).into_response())
}
