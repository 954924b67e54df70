//! Public endpoints: login, event polling, health.

use axum::{
    extract::{rejection::FormRejection, ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Form, Json,
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::gate::Credential;
use crate::http::request::{client_source, user_agent};
use crate::http::response::{error_response, login_response};
use crate::http::server::AppState;
use crate::journal::EventRecord;

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /login`.
///
/// An unreadable form is still an attempt: it runs through the gate with
/// empty fields and is journaled as a failure. The attempt itself runs on the
/// blocking pool since the authenticator may block.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable login form");
            LoginForm::default()
        }
    };

    let trust_forwarded_for = state.config.load().listener.trust_forwarded_for;
    let source = client_source(&headers, peer, trust_forwarded_for);
    let agent = user_agent(&headers);
    let credential = Credential::from(form.password);

    let gate = state.gate.clone();
    let now = state.clock.now();
    let attempt = tokio::task::spawn_blocking(move || {
        gate.attempt(&source, &form.username, &credential, &agent, now)
    });

    match attempt.await {
        Ok(outcome) => login_response(outcome),
        Err(e) => {
            tracing::error!(error = %e, "Login attempt task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// `GET /api/events[?limit=N]`, oldest first.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<EventRecord>> {
    let journal = state.gate.journal();
    Json(match query.limit {
        Some(limit) => journal.recent(limit),
        None => journal.snapshot(),
    })
}

pub async fn health() -> &'static str {
    "ok"
}
