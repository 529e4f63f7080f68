//! Static file server for the generated site

use std::path::Path;

use axum::Router;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Create the development server router serving `destination`.
///
/// Directory requests fall back to their `index.html`.
pub fn create_router(destination: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(destination).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}
