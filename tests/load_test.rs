//! Load testing for the gate.

use gate_sdk::GateClient;
use std::time::Instant;

mod common;

#[tokio::test]
async fn test_concurrent_logins_bounded_journal() {
    let mut config = common::config_with_threshold(1000);
    config.journal.capacity = 100;
    let gate = common::start_gate(config).await;

    let concurrency = 20;
    let requests_per_task: u32 = 25;
    let total_requests = concurrency * requests_per_task;

    let start = Instant::now();
    let mut handles = Vec::new();
    for task in 0..concurrency {
        let client = GateClient::new(&gate.url())
            .with_forwarded_for(&format!("10.1.0.{task}"))
            .with_user_agent("load-test");
        handles.push(tokio::spawn(async move {
            let mut ok = 0;
            for i in 0..requests_per_task {
                let password = if i % 2 == 0 { "alice123" } else { "wrong" };
                if client.login("alice", password).await.unwrap().is_success() {
                    ok += 1;
                }
            }
            ok
        }));
    }

    let mut successes = 0;
    for handle in handles {
        successes += handle.await.unwrap();
    }
    let duration = start.elapsed();
    println!(
        "{} logins in {:?} ({:.0} req/s)",
        total_requests,
        duration,
        total_requests as f64 / duration.as_secs_f64()
    );

    assert_eq!(successes, concurrency * requests_per_task.div_ceil(2));

    let status = GateClient::new(&gate.url()).status("changeme").await.unwrap();
    assert_eq!(status["journal"]["len"], 100);
    assert_eq!(status["journal"]["capacity"], 100);
    assert_eq!(status["journal"]["total_appended"], total_requests as u64);

    let events = GateClient::new(&gate.url()).events(None).await.unwrap();
    assert_eq!(events.len(), 100);
    assert!(events.iter().all(|e| e.ua == "load-test"));
}

#[tokio::test]
async fn test_concurrent_failures_single_source_never_exceed_threshold() {
    let gate = common::start_gate(common::config_with_threshold(10)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = GateClient::new(&gate.url()).with_forwarded_for("203.0.113.77");
        handles.push(tokio::spawn(async move {
            let mut statuses = Vec::new();
            for _ in 0..5 {
                statuses.push(client.login("bob", "wrong").await.unwrap().status);
            }
            statuses
        }));
    }

    let mut failures = 0;
    let mut limited = 0;
    for handle in handles {
        for status in handle.await.unwrap() {
            match status.as_u16() {
                401 => failures += 1,
                429 => limited += 1,
                other => panic!("unexpected status {other}"),
            }
        }
    }

    assert_eq!(failures, 10);
    assert_eq!(limited, 30);

    let events = GateClient::new(&gate.url()).events(None).await.unwrap();
    assert_eq!(events.len(), 40);
}
