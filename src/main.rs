use std::sync::Arc;

use axum::Router;
use blimp::{AppState, augment::{DerivedText, GeminiClient}, auth, rooms, store::Store};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blimp=debug,info")),
        )
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    let store = Store::open(dotenv::var("DATABASE_URL").unwrap().as_str())
        .await
        .unwrap();
    let clients = auth::Clients::from_file(
        &dotenv::var("CLIENT_SECRET_PATH").unwrap_or_else(|_| "client_secret.json".to_owned()),
    )
    .unwrap();
    let provider: Arc<dyn DerivedText> =
        Arc::new(GeminiClient::new(dotenv::var("GEMINI_API_KEY").unwrap()));

    let app_state = AppState {
        store,
        clients,
        provider,
    };

    let app = Router::new()
        .merge(auth::router())
        .nest("/r", rooms::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
