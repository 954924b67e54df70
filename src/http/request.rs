//! Request inspection.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Derive the source identity (X-Forwarded-For or peer address)
//! - Extract the client agent for the journal context
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - X-Forwarded-For is only honoured when configured
//! - Missing or unreadable headers fall back, never reject

use axum::http::{header, HeaderMap, HeaderValue, Request};
use std::net::SocketAddr;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_DEMO_SECRET: &str = "x-demo-secret";

/// Assigns a fresh UUID v4 to every request lacking an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Source identity of a request.
///
/// With `trust_forwarded_for`, the first non-empty entry of X-Forwarded-For
/// wins; otherwise (or when absent) the peer IP is used.
pub fn client_source(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').map(str::trim).find(|s| !s.is_empty()));
        if let Some(source) = forwarded {
            return source.to_string();
        }
    }
    peer.ip().to_string()
}

/// The `User-Agent` header, or `-`.
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("-")
        .to_string()
}
