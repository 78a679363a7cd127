use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::server::rest::{handlers, logging_middleware::request_logging_middleware, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/search", post(handlers::search::search))
        .route("/status", get(handlers::status::status));

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
