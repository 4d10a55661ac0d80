use axum::{Json, Router, extract::DefaultBodyLimit, routing::get};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    AppState,
    handler::{
        admin::admin_handler, auth::auth_handler, content::content_handler, media::media_handler,
    },
    media::LOCAL_PREFIX,
    models::ContentKind,
};

/// Largest accepted request body, sized for video uploads
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "message": "Server is running",
    }))
}

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_handler(app_state.clone()))
        .nest("/news", content_handler(app_state.clone(), ContentKind::Article))
        .nest("/trending", content_handler(app_state.clone(), ContentKind::Trending))
        .nest("/videos", content_handler(app_state.clone(), ContentKind::Video))
        .nest("/admin", admin_handler(app_state.clone()))
        .nest("/media", media_handler(app_state.clone()));

    Router::new()
        .nest("/api", api_route)
        .nest_service(LOCAL_PREFIX, ServeDir::new(&app_state.env.upload_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(app_state.ip_extraction.clone().into_extension()),
        )
        .with_state(app_state)
}
