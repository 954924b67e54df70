//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the gate and its leaf components from configuration
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Spawn the limiter sweeper and the config reloader
//! - Serve until the shutdown broadcast fires

use arc_swap::ArcSwap;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::GateConfig;
use crate::gate::{AuthGate, Clock, SimulationProfile, StaticAuthenticator, SystemClock};
use crate::http::handlers;
use crate::http::request::MakeRequestUuidV4;
use crate::journal::EventJournal;
use crate::security::{LimitPolicy, LimiterSweeper, PolicyError, RateLimiter};

/// Error type for server construction and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0:?}")]
    InvalidConfig(Vec<ValidationError>),

    #[error("invalid rate limit policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub authenticator: Arc<StaticAuthenticator>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ArcSwap<GateConfig>>,
}

impl AppState {
    /// Apply a reloaded configuration to the running gate.
    ///
    /// Limiter policy, users, simulation profile, and admin settings swap in
    /// place. Journal capacity and the bind address need a restart.
    pub fn apply_config(&self, new: GateConfig) {
        let policy = match LimitPolicy::from_config(&new.rate_limit) {
            Ok(policy) => policy,
            Err(e) => {
                tracing::error!(error = %e, "Rejected reloaded configuration");
                return;
            }
        };

        let current = self.config.load_full();
        if new.journal.capacity != current.journal.capacity {
            tracing::warn!(
                current = current.journal.capacity,
                requested = new.journal.capacity,
                "Journal capacity change requires a restart; ignoring"
            );
        }
        if new.listener.bind_address != current.listener.bind_address {
            tracing::warn!(
                current = %current.listener.bind_address,
                requested = %new.listener.bind_address,
                "Bind address change requires a restart; ignoring"
            );
        }

        self.gate.limiter().set_policy(policy);
        self.authenticator.replace_users(new.users.clone());
        self.gate.set_simulation(SimulationProfile::from_config(&new.admin));

        tracing::info!(
            window_secs = new.rate_limit.window_secs,
            threshold = new.rate_limit.threshold,
            "Configuration reloaded"
        );
        self.config.store(Arc::new(new));
    }
}

/// HTTP server for the authentication gate.
pub struct GateServer {
    router: Router,
    state: AppState,
}

impl GateServer {
    /// Create a new server reading time from the system clock.
    pub fn new(config: GateConfig) -> Result<Self, ServerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new server with an explicit time source.
    pub fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ServerError::InvalidConfig)?;

        let policy = LimitPolicy::from_config(&config.rate_limit)?;
        let journal = Arc::new(EventJournal::new(config.journal.capacity));
        let limiter = Arc::new(RateLimiter::new(policy));
        let authenticator = Arc::new(StaticAuthenticator::new(config.users.clone()));
        let gate = Arc::new(
            AuthGate::new(journal, limiter, authenticator.clone())
                .with_simulation(SimulationProfile::from_config(&config.admin)),
        );

        let state = AppState {
            gate,
            authenticator,
            clock,
            config: Arc::new(ArcSwap::from_pointee(config.clone())),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        Router::new()
            .route("/login", post(handlers::login))
            .route("/api/events", get(handlers::list_events))
            .route("/health", get(handlers::health))
            .merge(setup_admin_router(state.clone()))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            )
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Validated configs arriving on `config_updates` are applied live. The
    /// server, sweeper, and reloader all stop when `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let sweep_interval = self.state.config.load().rate_limit.sweep_interval_secs;
        let sweeper = LimiterSweeper::new(
            self.state.gate.limiter().clone(),
            self.state.clock.clone(),
            Duration::from_secs(sweep_interval),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => reload_state.apply_config(config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
