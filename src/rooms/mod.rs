mod directory;
mod join;
mod list;
mod msg;
mod new;
mod room;
mod session;
mod ws;

pub use directory::{CreateOutcome, RoomDirectory, RoomFeed};
pub use msg::{MessageFeed, MessageStream};
pub use session::RoomSession;

use axum::{Router, routing::{get, post}};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::rooms))
        .route("/ws", get(list::rooms_ws))
        .route("/new", post(new::new_room))
        .route("/join", post(join::join_room))
        .route("/{id}", get(room::room).delete(room::delete_room))
        .route("/{id}/ws", get(ws::room_ws))
}
