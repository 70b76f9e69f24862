//! Router configuration.

use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::dev_login::dev_router;
use crate::saml_handlers;
use crate::state::AppState;

/// Creates the application router.
///
/// The dev login routes are merged only when enabled in the configuration.
pub fn create_router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/auth/{provider}/login", get(saml_handlers::login))
        .route("/auth/{provider}/login/callback", post(saml_handlers::login_callback))
        .route("/auth/{provider}/logout", get(saml_handlers::logout))
        .route("/auth/{provider}/logout/callback", get(saml_handlers::logout_callback))
        .route("/auth/{provider}/metadata", get(saml_handlers::metadata));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .merge(auth);

    if state.config.dev_login_enabled {
        tracing::warn!("dev login routes enabled");
        app = app.merge(dev_router());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
