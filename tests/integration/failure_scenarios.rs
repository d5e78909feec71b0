//! Cycles against unreachable and unresponsive endpoints

use minepulse::app::App;
use minepulse::registry::FAILURE_RESET_THRESHOLD;
use minepulse::updates::OutboundMessage;
use pretty_assertions::assert_eq;
use tokio::sync::broadcast::Receiver;

use crate::helpers::{refused_port, single_java_config, spawn_silent_fixture};

async fn next_batch(rx: &mut Receiver<String>) -> Vec<minepulse::updates::UpdatePayload> {
    let message: OutboundMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    match message {
        OutboundMessage::UpdateServers { updates, .. } => updates,
        other => panic!("expected an update batch, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_endpoint_produces_error_diff() {
    let port = refused_port().await;
    let app = App::new(single_java_config(port, r#"{ "backend": "none" }"#))
        .await
        .unwrap();
    let mut rx = app.subscribe();

    app.run_cycle().await.unwrap();

    let updates = next_batch(&mut rx).await;
    assert_eq!(updates[0].player_count, None);
    let error = updates[0].error.as_ref().unwrap();
    assert!(!error.message.is_empty());
    // viewer-facing messages stay short
    assert!(error.message.chars().count() <= 31);
}

#[tokio::test]
async fn silent_endpoint_times_out_within_budget() {
    let port = spawn_silent_fixture().await;
    let app = App::new(single_java_config(port, r#"{ "backend": "none" }"#))
        .await
        .unwrap();
    let mut rx = app.subscribe();

    let started = std::time::Instant::now();
    app.run_cycle().await.unwrap();
    // 500ms connect budget plus scheduling slack
    assert!(started.elapsed() < std::time::Duration::from_secs(2));

    let updates = next_batch(&mut rx).await;
    assert_eq!(updates[0].error.as_ref().unwrap().message, "timed out");
}

#[tokio::test]
async fn sustained_failures_reset_displayed_count_to_zero() {
    let port = refused_port().await;
    let app = App::new(single_java_config(port, r#"{ "backend": "none" }"#))
        .await
        .unwrap();
    let mut rx = app.subscribe();

    for cycle in 1..FAILURE_RESET_THRESHOLD {
        app.run_cycle().await.unwrap();
        let updates = next_batch(&mut rx).await;
        assert_eq!(
            updates[0].player_count, None,
            "cycle {cycle} should still report null"
        );
    }

    app.run_cycle().await.unwrap();
    let updates = next_batch(&mut rx).await;
    assert_eq!(updates[0].player_count, Some(0));
}
