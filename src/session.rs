use tower_sessions::Session;

use crate::AppResult;
use crate::auth::Principal;

pub const PRINCIPAL: &str = "principal";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

pub async fn principal(session: &Session) -> AppResult<Option<Principal>> {
    Ok(session.get::<Principal>(PRINCIPAL).await?)
}
