mod hook;
mod pic;
mod sub;

pub use hook::Webhook;

use axum::{
    Router,
    http::StatusCode,
    routing::{MethodFilter, get, on, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{AppState, config::Settings};

pub fn router(state: AppState, settings: &Settings) -> Router {
    let mut app = Router::new()
        .route("/hook/{hook_id}", post(hook::receive))
        .route("/sub/{secret}", get(sub::stream));

    if settings.fetch_user_pic {
        // `get` would also answer HEAD; pictures are GET only.
        let picture = on(MethodFilter::GET, pic::picture).fallback(not_found);
        app = app.route("/pic/{handle}", picture);
    }
    if settings.enable_map {
        app = app.fallback_service(ServeDir::new(&settings.static_dir));
    }
    if settings.allow_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
