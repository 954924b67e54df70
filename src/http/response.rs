//! Response bodies.
//!
//! Outcomes are part of the ordinary result: each maps to a status code and
//! a small JSON body, never to an error path.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::journal::Outcome;

pub fn login_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Success => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Outcome::Failure => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials", "status": "fail" })),
        )
            .into_response(),
        Outcome::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many attempts" })),
        )
            .into_response(),
    }
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_login_status_codes() {
        let ok = login_response(Outcome::Success);
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["status"], "ok");

        let fail = login_response(Outcome::Failure);
        assert_eq!(fail.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(fail).await["error"], "Invalid credentials");

        let limited = login_response(Outcome::RateLimited);
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(limited).await["error"], "Too many attempts");
    }

    #[tokio::test]
    async fn test_error_response() {
        let response = error_response(StatusCode::FORBIDDEN, "forbidden");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await, json!({ "error": "forbidden" }));
    }
}
