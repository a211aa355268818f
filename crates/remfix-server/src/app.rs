use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth, routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS for the ping beacon (the storefront
///    pages fire it cross-origin; browsers need CORS headers).
///
/// Admin routes are wrapped in the bearer-token middleware; everything else
/// is public.
pub fn build_app(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/api/admin/analytics/stats", get(routes::stats::get_stats))
        .route(
            "/api/admin/analytics/dashboard",
            get(routes::dashboard::get_dashboard),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/analytics/ping", post(routes::ping::ping))
        .route("/api/webhooks/remonline", post(routes::webhook::remonline))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
