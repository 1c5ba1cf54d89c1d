// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::attempts, state::AppState, utils::identity::identity_middleware};

/// Assembles the main application router.
///
/// * Mounts the attempt lifecycle routes behind the identity middleware.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Every attempt route requires a verified caller identity.
    let attempt_routes = Router::new()
        .route("/exams/{exam_id}/attempts", post(attempts::start_attempt))
        .route("/attempts/{attempt_id}/submit", post(attempts::submit_attempt))
        .route("/attempts/{attempt_id}/result", get(attempts::get_attempt_result))
        .layer(middleware::from_fn(identity_middleware));

    Router::new()
        .nest("/api", attempt_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
