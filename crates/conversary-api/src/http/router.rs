//! Axum router configuration with middleware.
//!
//! All routes are under `/api/`.
//! Middleware: CORS, tracing.
//!
//! A built frontend is served from `[server].web_dir` (or
//! `CONVERSARY_WEB_DIR`). API routes take priority; unknown paths fall
//! through to the SPA's `index.html` for client-side routing. If the
//! directory does not exist, only the API is served.

use std::path::PathBuf;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use conversary_infra::config::resolve_path;

use crate::http::handlers;
use crate::state::AppState;

pub const WEB_DIR_ENV: &str = "CONVERSARY_WEB_DIR";

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let web_dir = web_dir(&state);

    let api_routes = Router::new()
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations)
                .post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/{date}",
            get(handlers::conversation::list_conversations_for_date),
        )
        .route("/summaries", post(handlers::summary::create_summary))
        .route("/summaries/{date}", get(handlers::summary::get_summary))
        .route("/health", get(handlers::health::health));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(web_dir) = web_dir.filter(|dir| dir.is_dir()) {
        let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(web_dir.join("index.html")));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %web_dir.display(), "SPA static file serving enabled");
    }

    router
}

fn web_dir(state: &AppState) -> Option<PathBuf> {
    std::env::var_os(WEB_DIR_ENV)
        .map(PathBuf::from)
        .or_else(|| state.config.server.web_dir.clone())
        .map(|dir| resolve_path(&state.data_dir, &dir))
}
