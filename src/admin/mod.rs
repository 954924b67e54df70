pub mod handlers;
pub mod auth;

use axum::{
    routing::{get, post},
    Router,
    middleware,
};
use crate::http::server::AppState;
use self::handlers::*;
use self::auth::demo_secret_middleware;

/// Secret-gated routes: failure simulation and inspection.
pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/simulate", post(simulate))
        .route("/admin/status", get(get_status))
        .route("/admin/limiter", get(get_limiter))
        .route_layer(middleware::from_fn_with_state(state, demo_secret_middleware))
}
