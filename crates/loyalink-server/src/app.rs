use crate::state::AppState;
use crate::{logging, web};
use axum::middleware;
use axum::Router;
use std::path::Path;
use tower_http::services::ServeDir;

pub fn build_http_app(state: AppState) -> Router {
    let static_dir = Path::new(&state.config.http.static_dir);
    let styles = ServeDir::new(static_dir.join("styles"));
    let fonts = ServeDir::new(static_dir.join("fonts"));

    web::routes()
        .with_state(state)
        .nest_service("/styles", styles)
        .nest_service("/fonts", fonts)
        .layer(middleware::from_fn(logging::request_logging))
}
