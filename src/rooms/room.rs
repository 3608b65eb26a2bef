use axum::{Json, debug_handler, extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, session, store::Store};

use super::directory::RoomDirectory;

/// Room details, members included.
#[debug_handler]
pub(crate) async fn room(
    State(store): State<Store>,
    session: Session,
    Path(room_id): Path<Uuid>,
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

    Ok(Json(room).into_response())
}

#[debug_handler]
pub(crate) async fn delete_room(
    State(store): State<Store>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(principal) = session::principal(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    RoomDirectory::new(store).delete_room(&principal.id, room_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
