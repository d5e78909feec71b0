//! Concurrency behavior: parallel polling and the per-cycle guard

use std::sync::Arc;
use std::time::{Duration, Instant};

use minepulse::app::App;
use minepulse::config::Config;
use minepulse::updates::OutboundMessage;
use pretty_assertions::assert_eq;

use crate::helpers::{single_java_config, spawn_silent_fixture, spawn_status_fixture};

fn multi_server_config(ports: &[u16]) -> Config {
    let servers: Vec<String> = ports
        .iter()
        .enumerate()
        .map(|(i, port)| {
            format!(
                r#"{{ "name": "Fixture {i}", "host": "127.0.0.1", "port": {port}, "family": "java" }}"#
            )
        })
        .collect();
    let json = format!(
        r#"{{
            "servers": [{}],
            "rates": {{ "ping_interval_millis": 100, "connect_timeout_millis": 500 }},
            "storage": {{ "backend": "none" }}
        }}"#,
        servers.join(",")
    );
    serde_json::from_str(&json).unwrap()
}

#[tokio::test]
async fn servers_are_polled_in_parallel_not_sequentially() {
    // Eight endpoints that each burn the whole 500ms budget. Polled
    // sequentially the cycle would need about 4s.
    let mut ports = Vec::new();
    for _ in 0..8 {
        ports.push(spawn_silent_fixture().await);
    }

    let app = App::new(multi_server_config(&ports)).await.unwrap();
    let mut rx = app.subscribe();

    let started = Instant::now();
    app.run_cycle().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let batch: OutboundMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    let OutboundMessage::UpdateServers { updates, .. } = batch else {
        panic!("expected an update batch");
    };
    assert_eq!(updates.len(), 8);
}

#[tokio::test]
async fn batch_preserves_registration_order() {
    let slow = spawn_silent_fixture().await;
    let fast = spawn_status_fixture(r#"{"players":{"online":3}}"#).await;

    // slow endpoint first: its result must still land in slot 0
    let app = App::new(multi_server_config(&[slow, fast])).await.unwrap();
    let mut rx = app.subscribe();

    app.run_cycle().await.unwrap();

    let batch: OutboundMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    let OutboundMessage::UpdateServers { updates, .. } = batch else {
        panic!("expected an update batch");
    };
    assert_eq!(updates[0].player_count, None);
    assert_eq!(updates[1].player_count, Some(3));
}

#[tokio::test]
async fn concurrent_cycle_attempt_is_dropped_without_side_effects() {
    let port = spawn_silent_fixture().await;
    let app = Arc::new(
        App::new(single_java_config(port, r#"{ "backend": "none" }"#))
            .await
            .unwrap(),
    );
    let mut rx = app.subscribe();

    // First cycle blocks on the silent endpoint for its 500ms budget; the
    // second attempt starts midway through and must be dropped.
    let first = {
        let app = app.clone();
        tokio::spawn(async move { app.run_cycle().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = app.run_cycle().await.unwrap();

    assert!(!second);
    assert!(first.await.unwrap());

    // exactly one batch: the dropped attempt published nothing
    assert!(rx.recv().await.is_ok());
    assert!(rx.try_recv().is_err());
}
