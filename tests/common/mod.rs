//! Shared utilities for integration and load testing.

use auth_gate::config::GateConfig;
use auth_gate::gate::ManualClock;
use auth_gate::http::GateServer;
use auth_gate::lifecycle::Shutdown;
use chrono::{TimeZone, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A gate running on an ephemeral port with a hand-driven clock.
pub struct TestGate {
    pub addr: SocketAddr,
    pub clock: Arc<ManualClock>,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub config_tx: mpsc::UnboundedSender<GateConfig>,
}

impl TestGate {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gate on 127.0.0.1:0 and wait until it answers `/health`.
pub async fn start_gate(config: GateConfig) -> TestGate {
    let clock = Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    ));
    let server = GateServer::with_clock(config, clock.clone()).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    TestGate {
        addr,
        clock,
        shutdown,
        config_tx,
    }
}

/// Default config with a small threshold so limits trip quickly.
pub fn config_with_threshold(threshold: usize) -> GateConfig {
    let mut config = GateConfig::default();
    config.rate_limit.threshold = threshold;
    config
}
