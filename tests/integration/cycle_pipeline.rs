//! End-to-end cycle tests against an in-process Java status server

use minepulse::app::App;
use minepulse::updates::OutboundMessage;
use pretty_assertions::assert_eq;

use crate::helpers::{single_java_config, spawn_status_fixture};

const STATUS: &str = r#"{"players":{"online":7},"version":{"name":"1.8.9","protocol":47}}"#;

#[tokio::test]
async fn cycle_polls_fixture_and_broadcasts_batch() {
    let port = spawn_status_fixture(STATUS).await;
    let app = App::new(single_java_config(port, r#"{ "backend": "none" }"#))
        .await
        .unwrap();
    let mut rx = app.subscribe();

    assert!(app.run_cycle().await.unwrap());

    let batch: OutboundMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    let OutboundMessage::UpdateServers { updates, .. } = batch else {
        panic!("expected an update batch");
    };
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].player_count, Some(7));
    assert_eq!(updates[0].error, None);
    // the fixture echoed the first probe-table protocol id (47): index 0
    // joins the compatibility set
    assert_eq!(updates[0].versions, Some(vec![0]));
}

#[tokio::test]
async fn synthesized_snapshot_reflects_completed_cycles() {
    let port = spawn_status_fixture(STATUS).await;
    let app = App::new(single_java_config(port, r#"{ "backend": "none" }"#))
        .await
        .unwrap();

    app.run_cycle().await.unwrap();
    app.run_cycle().await.unwrap();

    let init: OutboundMessage = serde_json::from_str(&app.init_message().await.unwrap()).unwrap();
    let OutboundMessage::Init {
        timestamp_points,
        servers,
        config,
    } = init
    else {
        panic!("expected an init snapshot");
    };

    assert_eq!(timestamp_points.len(), 2);
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].player_count, Some(7));
    assert_eq!(
        servers[0].player_count_history,
        Some(vec![Some(7), Some(7)])
    );
    assert_eq!(servers[0].error, None);
    assert!(!config.java_versions.is_empty());
}

#[tokio::test]
async fn subscriber_config_carries_server_metadata() {
    let port = spawn_status_fixture(STATUS).await;
    let app = App::new(single_java_config(port, r#"{ "backend": "none" }"#))
        .await
        .unwrap();

    let init: OutboundMessage = serde_json::from_str(&app.init_message().await.unwrap()).unwrap();
    let OutboundMessage::Init { config, .. } = init else {
        panic!("expected an init snapshot");
    };

    assert_eq!(config.servers[0].name, "Fixture");
    assert_eq!(config.servers[0].host, "127.0.0.1");
    // derived chart color when none is configured
    assert!(config.servers[0].color.starts_with('#'));
    assert!(!config.is_graph_visible);
}
