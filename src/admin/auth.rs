use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::http::request::X_DEMO_SECRET;
use crate::http::response::error_response;
use crate::http::server::AppState;

/// Require the configured demo secret in `X-Demo-Secret`.
pub async fn demo_secret_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let config = state.config.load_full();

    let provided = request
        .headers()
        .get(X_DEMO_SECRET)
        .and_then(|h| h.to_str().ok());

    if provided == Some(config.admin.demo_secret.as_str()) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected admin request: bad demo secret");
    error_response(StatusCode::FORBIDDEN, "forbidden")
}
