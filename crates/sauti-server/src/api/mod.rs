//! HTTP routes

mod audio;
mod health;

use axum::http::HeaderName;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use audio::{DURATION_HEADER, SAMPLE_RATE_HEADER};

/// Create the main API router.
pub fn create_router(state: AppState, cors_enabled: bool) -> Router {
    let router = Router::new()
        .route("/generate/audio", get(audio::generate_audio))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([
                    HeaderName::from_static(SAMPLE_RATE_HEADER),
                    HeaderName::from_static(DURATION_HEADER),
                ]),
        )
    } else {
        router
    };

    router.with_state(state)
}
