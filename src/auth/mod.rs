mod clients;
mod lockin;
mod login;
mod logout;

pub use clients::{ClientProvider, Clients};

use axum::{Json, Router, debug_handler, http::StatusCode, response::{IntoResponse, Response}, routing::get};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{AppResult, AppState};

/// The signed-in identity as the identity provider reports it. Read-only
/// here; messages snapshot the display fields at send time, so later
/// profile edits leave old messages as they were.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub verified: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
        .route("/whoami", get(whoami))
}

#[debug_handler]
pub(crate) async fn whoami(session: Session) -> AppResult<Response> {
    match crate::session::principal(&session).await? {
        Some(principal) => Ok(Json(principal).into_response()),
        None => Ok(StatusCode::UNAUTHORIZED.into_response()),
    }
}
