use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::response::error_response;
use crate::http::server::AppState;

pub const DEFAULT_SIMULATED_COUNT: usize = 50;
pub const DEFAULT_SIMULATED_SOURCE: &str = "10.10.10.10";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub journal: JournalStatus,
    pub limiter: LimiterStatus,
    pub users: usize,
}

#[derive(Serialize)]
pub struct JournalStatus {
    pub len: usize,
    pub capacity: usize,
    pub total_appended: u64,
}

#[derive(Serialize)]
pub struct LimiterStatus {
    pub tracked_sources: usize,
    pub window_secs: i64,
    pub threshold: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceStatus>,
}

#[derive(Serialize)]
pub struct SourceStatus {
    pub ip: String,
    pub failures: usize,
    pub admitted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    pub count: Option<usize>,
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimiterQuery {
    pub ip: Option<String>,
}

/// `POST /simulate?count=&ip=`: seed synthetic failures.
pub async fn simulate(
    State(state): State<AppState>,
    Query(query): Query<SimulateQuery>,
) -> Response {
    let max = state.config.load().admin.max_simulated;
    let count = query.count.unwrap_or(DEFAULT_SIMULATED_COUNT);
    if count > max {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("count must be at most {max}"),
        );
    }

    let source = query
        .ip
        .unwrap_or_else(|| DEFAULT_SIMULATED_SOURCE.to_string());
    let generated = state.gate.inject_failures(&source, count, state.clock.now());

    Json(json!({ "ok": true, "generated": generated })).into_response()
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let journal = state.gate.journal();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        journal: JournalStatus {
            len: journal.len(),
            capacity: journal.capacity(),
            total_appended: journal.total_appended(),
        },
        limiter: limiter_status(&state, None),
        users: state.authenticator.user_count(),
    })
}

/// `GET /admin/limiter[?ip=]`.
pub async fn get_limiter(
    State(state): State<AppState>,
    Query(query): Query<LimiterQuery>,
) -> Json<LimiterStatus> {
    Json(limiter_status(&state, query.ip))
}

fn limiter_status(state: &AppState, source: Option<String>) -> LimiterStatus {
    let limiter = state.gate.limiter();
    let policy = limiter.policy();
    let now = state.clock.now();

    let source = source.map(|ip| SourceStatus {
        failures: limiter.failure_count(&ip, now),
        admitted: limiter.admit(&ip, now),
        ip,
    });

    LimiterStatus {
        tracked_sources: limiter.tracked_sources(),
        window_secs: policy.window().num_seconds(),
        threshold: policy.threshold(),
        source,
    }
}
